//! Configuration loading
//!
//! Hierarchical configuration using figment: programmatic defaults,
//! an optional chartsnap.yaml, then CHARTSNAP_* environment variable
//! overrides, validated after merging.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};

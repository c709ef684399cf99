//! Domain layer for the Chartsnap conversion coordinator
//!
//! This module contains core business logic and domain models.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{CoordinationError, SampleError};

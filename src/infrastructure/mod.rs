//! Infrastructure layer module
//!
//! Cross-cutting concerns that sit below the application layer,
//! currently configuration loading and validation.

pub mod config;

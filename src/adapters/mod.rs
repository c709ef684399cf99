//! Adapters for external systems and protocols.

pub mod agent;
pub mod http;
pub mod renderer;
pub mod transform;

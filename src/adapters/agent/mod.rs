//! Renderer host side of the loopback protocol.

pub mod client;
pub mod host_agent;

pub use client::{AgentError, CoordinatorClient};
pub use host_agent::{HostAgent, HostAgentConfig};

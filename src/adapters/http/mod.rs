//! HTTP surface the coordinator exposes to renderer hosts.

pub mod coordination_server;

pub use coordination_server::{
    BoundCoordinationServer, CoordinationServer, CoordinationServerConfig,
};

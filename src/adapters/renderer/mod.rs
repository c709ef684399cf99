//! Renderer implementations behind the [`Renderer`] port.
//!
//! [`Renderer`]: crate::domain::ports::Renderer

pub mod mock;

pub use mock::{MockFrame, MockRenderer, MockScript};

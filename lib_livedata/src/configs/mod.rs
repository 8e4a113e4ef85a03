//! Layered endpoint configuration.

pub mod endpoint;

pub use endpoint::{EndpointConfig, ResolvedEndpoint};

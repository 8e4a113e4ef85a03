//! Transports: HTTP for queries/mutations, WebSocket for subscriptions.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "realtime")]
pub mod socket;

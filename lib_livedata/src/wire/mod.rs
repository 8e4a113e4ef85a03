//! Wire-level types shared by the HTTP and WebSocket transports.

pub mod envelope;
pub mod page;
pub mod record;

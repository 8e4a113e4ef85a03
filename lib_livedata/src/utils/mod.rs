//! General helpers: retry/backoff schedule and idempotency tokens.

pub mod backoff;
pub mod idempotency;

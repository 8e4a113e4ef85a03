//! The three data accessors: paginated queries, idempotent mutations,
//! and real-time subscriptions.

#[cfg(feature = "http")]
pub mod mutate;
#[cfg(feature = "http")]
pub mod query;
#[cfg(feature = "realtime")]
pub mod subscribe;

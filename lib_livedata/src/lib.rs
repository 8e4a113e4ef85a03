//! # lib_livedata
//!
//! Client-side data access for a multi-tenant business backend: paginated
//! collection queries, idempotent mutations, and real-time change
//! subscriptions, backed by a local optimistic cache.
//!
//! Modules are folder-gated by feature so lean consumers only pull the
//! dependencies they need:
//!
//! * `http`     - HTTP transport plus the query/mutation accessors.
//! * `realtime` - WebSocket transport plus the subscription accessor.
//! * `configs`  - layered endpoint configuration (flags < env < file).
//!
//! The wire types, error taxonomy, cache, and retry utilities are always
//! available.

// Declare the modules to re-export
pub mod auth;
pub mod cache;
pub mod errors;
pub mod utils;
pub mod wire;

#[cfg(feature = "configs")]
pub mod configs;

#[cfg(any(feature = "http", feature = "realtime"))]
pub mod transport;

#[cfg(any(feature = "http", feature = "realtime"))]
pub mod access;

// Re-export the common surface
pub use auth::Credential;
pub use cache::store::{CacheState, CacheView, MutationTicket, RecordCache};
pub use errors::{ApiError, FieldError};
pub use utils::backoff::RetryPolicy;
pub use utils::idempotency::IdempotencyToken;
pub use wire::page::{Cursor, Direction, Edge, Filter, FilterOp, Page, PageInfo, PageRequest, Sort};
pub use wire::record::{ChangeEvent, ChangeKind, Record};

#[cfg(feature = "http")]
pub use access::mutate::MutationSpec;
#[cfg(feature = "http")]
pub use access::query::{Pager, QuerySpec};
#[cfg(feature = "realtime")]
pub use access::subscribe::Subscription;
#[cfg(feature = "http")]
pub use transport::http::ApiClient;

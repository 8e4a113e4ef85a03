//! Client-side record cache with optimistic entries.

pub mod store;

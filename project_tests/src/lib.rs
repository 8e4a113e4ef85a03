//! Test support for the livedata workspace: an in-process mock backend
//! implementing the query/mutation/subscription wire contract.

pub mod mock_backend;

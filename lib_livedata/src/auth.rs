//! Credential attached to every request: a bearer token plus the tenant
//! the caller is scoped to. The library never interprets the token.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for the Authorization header. `None` means anonymous,
    /// which the backend will reject for protected collections.
    pub bearer: Option<String>,
    /// Tenant identifier, sent as the `X-Tenant-Id` header and as the
    /// subscription connection parameter.
    pub tenant: String,
}

impl Credential {
    pub fn new(tenant: impl Into<String>, bearer: Option<String>) -> Self {
        Self {
            bearer,
            tenant: tenant.into(),
        }
    }
}

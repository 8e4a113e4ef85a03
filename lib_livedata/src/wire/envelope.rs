//! # Request/Response Envelope
//!
//! The JSON envelope spoken with the backend: a query/mutation string plus
//! a variables map on the way out, `{data, errors[]}` on the way back.
//! Each error carries a machine-readable code under `extensions.code`
//! which drives the error-handling policy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApiError, FieldError};

/// Outgoing request body.
#[derive(Debug, Clone, Serialize)]
pub struct WireRequest {
    pub query: String,
    pub variables: Value,
}

impl WireRequest {
    pub fn new(query: impl Into<String>, variables: Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// Incoming response body.
#[derive(Debug, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
pub struct WireError {
    pub message: String,
    #[serde(default)]
    pub extensions: WireErrorExtensions,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireErrorExtensions {
    pub code: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldError>,
}

impl WireResponse {
    /// Collapses the envelope into either its data payload or the first
    /// reported error, mapped onto the taxonomy.
    pub fn into_data(self) -> Result<Value, ApiError> {
        if let Some(err) = self.errors.into_iter().next() {
            let code = err.extensions.code.as_deref().unwrap_or("");
            return Err(ApiError::from_code(code, &err.message, err.extensions.fields));
        }
        self.data
            .ok_or_else(|| ApiError::Unknown("response carried neither data nor errors".to_string()))
    }
}

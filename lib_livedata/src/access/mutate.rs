//! # Mutation Accessor
//!
//! Creates or updates a single record with at-most-once application under
//! client-side retry. Every logical write intent carries one idempotency
//! token; retries reuse it, and the backend deduplicates by it, so a
//! replayed request returns the original result instead of a duplicate
//! write.

use serde_json::{Map, Value};

use crate::cache::store::RecordCache;
use crate::errors::ApiError;
use crate::transport::http::ApiClient;
use crate::utils::backoff::{with_retries, RetryPolicy};
use crate::utils::idempotency::IdempotencyToken;
use crate::wire::envelope::WireRequest;
use crate::wire::record::Record;

const UPSERT_MUTATION: &str = "\
mutation UpsertRecord($collection: String!, $id: ID, $payload: JSON!, $expectedRevision: Int) {\n\
  upsertRecord(collection: $collection, id: $id, payload: $payload, \
expectedRevision: $expectedRevision) {\n\
    record\n\
  }\n\
}";

/// One logical write intent.
#[derive(Debug, Clone)]
pub struct MutationSpec {
    pub collection: String,
    /// `None` creates a record; `Some` updates it.
    pub record_id: Option<String>,
    pub payload: Value,
    /// Optimistic-lock guard: the write fails with `Conflict` if the
    /// server-side revision no longer matches.
    pub expected_revision: Option<u64>,
    /// Reused verbatim across retries of this intent.
    pub token: IdempotencyToken,
}

impl MutationSpec {
    pub fn create(collection: impl Into<String>, payload: Value) -> Self {
        Self {
            collection: collection.into(),
            record_id: None,
            payload,
            expected_revision: None,
            token: IdempotencyToken::new(),
        }
    }

    pub fn update(collection: impl Into<String>, record_id: impl Into<String>, payload: Value) -> Self {
        Self {
            collection: collection.into(),
            record_id: Some(record_id.into()),
            payload,
            expected_revision: None,
            token: IdempotencyToken::new(),
        }
    }

    pub fn expect_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    fn variables(&self) -> Value {
        let mut vars = Map::new();
        vars.insert("collection".to_string(), Value::from(self.collection.clone()));
        if let Some(id) = &self.record_id {
            vars.insert("id".to_string(), Value::from(id.clone()));
        }
        vars.insert("payload".to_string(), self.payload.clone());
        if let Some(rev) = self.expected_revision {
            vars.insert("expectedRevision".to_string(), Value::from(rev));
        }
        Value::Object(vars)
    }
}

/// Submits the write and returns the post-write record. Transient
/// failures are retried under `policy` with the same idempotency token.
pub async fn submit(
    client: &ApiClient,
    policy: &RetryPolicy,
    spec: &MutationSpec,
) -> Result<Record, ApiError> {
    let request = WireRequest::new(UPSERT_MUTATION, spec.variables());
    let key = spec.token.as_str();
    let data = with_retries(policy, || client.execute(&request, Some(key))).await?;
    let record = data
        .get("upsertRecord")
        .and_then(|v| v.get("record"))
        .cloned()
        .ok_or_else(|| ApiError::Unknown("response data missing 'upsertRecord.record'".to_string()))?;
    serde_json::from_value(record)
        .map_err(|e| ApiError::Unknown(format!("malformed record payload: {}", e)))
}

/// `submit` with cache write-through.
///
/// Updates apply an optimistic entry before the round-trip and confirm or
/// revert it by the outcome. Creates have no client-side id to key an
/// optimistic entry on, so they only land in the cache once confirmed.
pub async fn submit_optimistic(
    client: &ApiClient,
    policy: &RetryPolicy,
    cache: &RecordCache,
    spec: &MutationSpec,
) -> Result<Record, ApiError> {
    let ticket = match &spec.record_id {
        Some(id) => Some(cache.apply_optimistic(id, spec.payload.clone()).await),
        None => None,
    };

    match submit(client, policy, spec).await {
        Ok(record) => {
            match &ticket {
                Some(ticket) => cache.confirm(ticket, &record).await,
                None => cache.apply_confirmed(&record).await,
            }
            Ok(record)
        }
        Err(err) => {
            if let Some(ticket) = &ticket {
                cache.revert(ticket).await;
            }
            Err(err)
        }
    }
}

//! Opaque record handles and change notifications.
//!
//! Records are owned by the remote store; the client only interprets the
//! envelope fields `id` and `revision` and keeps everything else as raw
//! JSON. `revision` increases monotonically per record and is what the
//! cache uses for latest-wins reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single remote record: identity, revision, and the untouched payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub revision: u64,
    /// Domain fields, passed through untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// What happened to a record, as reported over a subscription stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// One change notification. Delivery is at-least-once and only ordered
/// within a tenant stream, so consumers must reapply these with
/// latest-wins semantics keyed by (id, revision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: String,
    pub kind: ChangeKind,
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_keeps_unknown_fields_opaque() {
        let rec: Record = serde_json::from_value(json!({
            "id": "cus_1",
            "revision": 7,
            "name": "Acme Plumbing",
            "balance": { "due": 125.50 }
        }))
        .unwrap();
        assert_eq!(rec.id, "cus_1");
        assert_eq!(rec.revision, 7);
        assert_eq!(rec.field("name"), Some(&json!("Acme Plumbing")));
        assert_eq!(rec.field("balance").unwrap()["due"], json!(125.50));
    }

    #[test]
    fn change_event_round_trips_kind_tags() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "collection": "work_orders",
            "kind": "updated",
            "record": { "id": "wo_9", "revision": 2, "status": "scheduled" }
        }))
        .unwrap();
        assert_eq!(event.kind, ChangeKind::Updated);
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["kind"], json!("updated"));
    }
}

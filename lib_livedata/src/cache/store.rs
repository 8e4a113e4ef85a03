//! # Record Cache
//!
//! Mirrors server records so the UI can avoid redundant fetches and show
//! optimistic writes before the server confirms them.
//!
//! Per-record state machine:
//!
//! ```text
//! absent -> optimistic -> confirmed
//! absent -> optimistic -> (reverted) absent
//! ```
//!
//! Optimistic entries are speculative and kept separate from the last
//! confirmed value, so a failed mutation rolls back without touching a
//! confirmed update that landed concurrently (last-confirmed-wins).
//! Confirmed application is latest-wins by record revision: a stale
//! revision is a no-op, which makes duplicate and out-of-order
//! subscription deliveries safe to reapply.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::wire::record::{ChangeEvent, ChangeKind, Record};

/// Handle returned by `apply_optimistic`, used to confirm or revert that
/// specific speculative write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket {
    pub record_id: String,
    ticket: u64,
}

/// How a cached value is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Speculative, awaiting server confirmation.
    Optimistic,
    /// Server-confirmed at the given revision.
    Confirmed { revision: u64 },
}

/// What a reader sees for one record id.
#[derive(Debug, Clone)]
pub struct CacheView {
    pub value: Value,
    pub state: CacheState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Slot {
    /// Last server-confirmed value and its revision.
    confirmed: Option<(Value, u64)>,
    /// Pending speculative overlay, if any.
    optimistic: Option<(u64, Value)>,
    /// Highest revision at which this record was seen deleted. Kept so a
    /// redelivered update older than the delete cannot resurrect it.
    tombstone: Option<u64>,
    updated_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.confirmed.is_none() && self.optimistic.is_none() && self.tombstone.is_none()
    }

    fn visible(&self) -> bool {
        self.confirmed.is_some() || self.optimistic.is_some()
    }
}

#[derive(Default)]
struct CacheInner {
    slots: HashMap<String, Slot>,
    next_ticket: u64,
}

/// Thread-safe record cache, cheap to clone and share across tasks.
#[derive(Clone, Default)]
pub struct RecordCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a speculative value for `record_id` ahead of the server
    /// round-trip. Returns the ticket needed to confirm or revert it.
    pub async fn apply_optimistic(&self, record_id: &str, value: Value) -> MutationTicket {
        let mut inner = self.inner.lock().await;
        inner.next_ticket += 1;
        let ticket = inner.next_ticket;
        let slot = inner.slots.entry(record_id.to_string()).or_default();
        slot.optimistic = Some((ticket, value));
        slot.updated_at = Some(Utc::now());
        log::debug!("Optimistic entry {} for record {}", ticket, record_id);
        MutationTicket {
            record_id: record_id.to_string(),
            ticket,
        }
    }

    /// Resolves an optimistic entry with the server's post-write record.
    pub async fn confirm(&self, ticket: &MutationTicket, record: &Record) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(slot) = inner.slots.get_mut(&ticket.record_id) {
                match &slot.optimistic {
                    Some((id, _)) if *id == ticket.ticket => slot.optimistic = None,
                    // A newer optimistic write superseded this one; leave it.
                    _ => {}
                }
            }
        }
        self.apply_confirmed(record).await;
    }

    /// Rolls a failed optimistic entry back to the last confirmed state
    /// for that id, or to absent if it never existed.
    pub async fn revert(&self, ticket: &MutationTicket) {
        let mut inner = self.inner.lock().await;
        let Some(slot) = inner.slots.get_mut(&ticket.record_id) else {
            return;
        };
        match &slot.optimistic {
            Some((id, _)) if *id == ticket.ticket => {
                slot.optimistic = None;
                slot.updated_at = Some(Utc::now());
                log::debug!("Reverted optimistic entry for record {}", ticket.record_id);
            }
            _ => return,
        }
        if slot.is_empty() {
            inner.slots.remove(&ticket.record_id);
        }
    }

    /// Applies a server-confirmed record with latest-wins semantics:
    /// revisions at or below the current confirmed one, or at or below a
    /// deletion's revision, are ignored.
    pub async fn apply_confirmed(&self, record: &Record) {
        let mut inner = self.inner.lock().await;
        let slot = inner.slots.entry(record.id.clone()).or_default();
        let newest = slot.confirmed.as_ref().map(|(_, rev)| *rev).max(slot.tombstone);
        if let Some(current) = newest {
            if record.revision <= current {
                log::trace!(
                    "Ignoring stale revision {} for record {} (have {})",
                    record.revision,
                    record.id,
                    current
                );
                return;
            }
        }
        slot.confirmed = Some((Value::Object(record.fields.clone()), record.revision));
        slot.updated_at = Some(Utc::now());
    }

    /// Applies one subscription notification. Deletes participate in the
    /// same latest-wins ordering as updates: a delete older than the
    /// confirmed value is a no-op, and a delete leaves its revision behind
    /// so a redelivered older update cannot resurrect the record.
    pub async fn apply_event(&self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Deleted => {
                let mut inner = self.inner.lock().await;
                let slot = inner.slots.entry(event.record.id.clone()).or_default();
                if let Some((_, current)) = &slot.confirmed {
                    if event.record.revision <= *current {
                        return;
                    }
                }
                slot.confirmed = None;
                slot.tombstone = Some(
                    slot.tombstone
                        .map_or(event.record.revision, |t| t.max(event.record.revision)),
                );
                slot.updated_at = Some(Utc::now());
            }
            ChangeKind::Created | ChangeKind::Updated => {
                self.apply_confirmed(&event.record).await;
            }
        }
    }

    /// Current view for one record id. An optimistic overlay shadows the
    /// confirmed value until it resolves.
    pub async fn get(&self, record_id: &str) -> Option<CacheView> {
        let inner = self.inner.lock().await;
        let slot = inner.slots.get(record_id)?;
        let updated_at = slot.updated_at.unwrap_or_else(Utc::now);
        if let Some((_, value)) = &slot.optimistic {
            return Some(CacheView {
                value: value.clone(),
                state: CacheState::Optimistic,
                updated_at,
            });
        }
        slot.confirmed.as_ref().map(|(value, revision)| CacheView {
            value: value.clone(),
            state: CacheState::Confirmed {
                revision: *revision,
            },
            updated_at,
        })
    }

    /// Snapshot of every cached record view.
    pub async fn snapshot(&self) -> HashMap<String, CacheView> {
        let inner = self.inner.lock().await;
        inner
            .slots
            .iter()
            .filter_map(|(id, slot)| {
                let updated_at = slot.updated_at.unwrap_or_else(Utc::now);
                if let Some((_, value)) = &slot.optimistic {
                    return Some((
                        id.clone(),
                        CacheView {
                            value: value.clone(),
                            state: CacheState::Optimistic,
                            updated_at,
                        },
                    ));
                }
                slot.confirmed.as_ref().map(|(value, revision)| {
                    (
                        id.clone(),
                        CacheView {
                            value: value.clone(),
                            state: CacheState::Confirmed {
                                revision: *revision,
                            },
                            updated_at,
                        },
                    )
                })
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.slots.values().filter(|s| s.visible()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

//! # Subscription Accessor
//!
//! Delivers an ordered-per-tenant stream of change notifications for one
//! collection. Delivery is at-least-once; feed the events through
//! `RecordCache::apply_event` for latest-wins semantics.
//!
//! Dropping (or explicitly unsubscribing) a `Subscription` cancels the
//! socket task synchronously via its token; notifications still queued at
//! that point are discarded with the receiver.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::Credential;
use crate::errors::ApiError;
use crate::transport::socket::run_subscription;
use crate::wire::record::ChangeEvent;

/// Notifications buffered ahead of the consumer. A full buffer back-
/// pressures the socket task instead of growing without bound.
const EVENT_BUFFER: usize = 256;

/// A live subscription to one collection's change stream.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    resubscribed: watch::Receiver<u64>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Next change notification, or `None` once the stream has ended
    /// (after `unsubscribe`).
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Watch channel that ticks on every successful (re)subscribe. After
    /// a reconnect the stream may have gaps, so observers should
    /// reconcile via a paginated query.
    pub fn resubscribed(&self) -> watch::Receiver<u64> {
        self.resubscribed.clone()
    }

    /// Cancels the socket task and releases the transport.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    /// Whether the background task has fully terminated.
    pub fn is_terminated(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens a subscription to `collection` at `ws_url` (the full socket
/// endpoint, e.g. `ws://host:port/subscriptions`).
pub fn subscribe(
    ws_url: impl Into<String>,
    credential: Credential,
    collection: impl Into<String>,
) -> Result<Subscription, ApiError> {
    let ws_url = ws_url.into();
    if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
        return Err(ApiError::Unknown(format!(
            "subscription URL must be ws:// or wss://, got '{}'",
            ws_url
        )));
    }

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (resub_tx, resub_rx) = watch::channel(0u64);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_subscription(
        ws_url,
        credential,
        collection.into(),
        events_tx,
        resub_tx,
        cancel.clone(),
    ));

    Ok(Subscription {
        events: events_rx,
        resubscribed: resub_rx,
        cancel,
        task,
    })
}

//! # WebSocket Transport
//!
//! Long-lived subscription socket: connects, performs the
//! `connection_init` handshake carrying the credential, subscribes to a
//! collection, and forwards change notifications until cancelled.
//!
//! A disconnect tears the session down and reconnects with a fresh
//! subscription after a capped backoff; there is no resume-from-offset,
//! so consumers are told about each (re)subscribe and should reconcile
//! through a paginated query afterwards.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tokio_util::sync::CancellationToken;

use crate::auth::Credential;
use crate::utils::backoff::Backoff;
use crate::wire::record::ChangeEvent;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Frames exchanged over the subscription socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketFrame {
    ConnectionInit { payload: ConnectParams },
    ConnectionAck,
    Subscribe { payload: SubscribeParams },
    Next { payload: ChangeEvent },
    Ping,
    Pong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    pub authorization: Option<String>,
    pub tenant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub collection: String,
}

/// Runs the subscription session until the token is cancelled or the
/// consumer drops its receiver. Spawned by `access::subscribe`.
pub(crate) async fn run_subscription(
    ws_url: String,
    credential: Credential,
    collection: String,
    events: mpsc::Sender<ChangeEvent>,
    resubscribed: watch::Sender<u64>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::unbounded(RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY);

    loop {
        if cancel.is_cancelled() {
            return;
        }

        log::info!("Connecting subscription socket: {}", ws_url);
        match connect_async(ws_url.as_str()).await {
            Ok((ws_stream, _)) => {
                let (mut write, mut read) = ws_stream.split();

                // Handshake: init with credential, wait for the ack, subscribe.
                let init = SocketFrame::ConnectionInit {
                    payload: ConnectParams {
                        authorization: credential.bearer.clone(),
                        tenant: credential.tenant.clone(),
                    },
                };
                if let Err(e) = send_frame(&mut write, &init).await {
                    log::error!("Failed to send connection_init: {}", e);
                } else if !wait_for_ack(&mut read).await {
                    log::error!("Subscription handshake was not acknowledged");
                } else {
                    let sub = SocketFrame::Subscribe {
                        payload: SubscribeParams {
                            collection: collection.clone(),
                        },
                    };
                    if let Err(e) = send_frame(&mut write, &sub).await {
                        log::error!("Failed to send subscribe: {}", e);
                    } else {
                        log::info!("Subscribed to collection '{}'", collection);
                        // Fresh subscription established; consumers may have
                        // missed notifications and should reconcile.
                        resubscribed.send_modify(|n| *n += 1);
                        backoff = Backoff::unbounded(RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY);

                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    log::info!("Subscription cancelled, closing socket");
                                    let _ = write.close().await;
                                    return;
                                }
                                msg = read.next() => {
                                    match msg {
                                        Some(Ok(WsMessage::Text(text))) => {
                                            match serde_json::from_str::<SocketFrame>(text.as_str()) {
                                                Ok(SocketFrame::Next { payload }) => {
                                                    // Blocks when the buffer is full so a slow
                                                    // consumer backpressures the socket.
                                                    if events.send(payload).await.is_err() {
                                                        // Consumer dropped the receiver.
                                                        let _ = write.close().await;
                                                        return;
                                                    }
                                                }
                                                Ok(SocketFrame::Ping) => {
                                                    let _ = send_frame(&mut write, &SocketFrame::Pong).await;
                                                }
                                                Ok(_) => {}
                                                Err(e) => {
                                                    log::warn!("Unparseable frame: {}", e);
                                                }
                                            }
                                        }
                                        Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                                        Some(Ok(WsMessage::Close(_))) | None => {
                                            log::warn!("Subscription socket closed by remote");
                                            break;
                                        }
                                        Some(Err(e)) => {
                                            log::error!("Subscription read error: {}", e);
                                            break;
                                        }
                                        _ => {}
                                    }
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("Subscription connect failed: {}", e);
            }
        }

        // Reconnect with capped backoff; stay responsive to cancellation.
        let delay = backoff
            .next_delay()
            .unwrap_or(RECONNECT_MAX_DELAY);
        log::info!("Reconnecting subscription in {:?}", delay);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn send_frame<S>(write: &mut S, frame: &SocketFrame) -> Result<(), String>
where
    S: SinkExt<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    write
        .send(WsMessage::Text(text.into()))
        .await
        .map_err(|e| e.to_string())
}

async fn wait_for_ack<S>(read: &mut S) -> bool
where
    S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(HANDSHAKE_TIMEOUT);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return false,
            msg = read.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    if matches!(
                        serde_json::from_str::<SocketFrame>(text.as_str()),
                        Ok(SocketFrame::ConnectionAck)
                    ) {
                        return true;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return false,
            }
        }
    }
}

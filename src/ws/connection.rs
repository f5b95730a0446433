//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{PoolSelector, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{MonitorEvent, PoolId};
use crate::service::MonitorService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<MonitorEvent>,
    monitor: Arc<MonitorService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &monitor).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if subs.matches(event.pool_id())
                            && let Some(json) = event_frame(&event)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Wraps an event in an envelope. Events that fail to serialize are logged
/// and skipped.
fn event_frame(event: &MonitorEvent) -> Option<String> {
    let frame = serde_json::to_value(event).and_then(|payload| {
        let msg = WsMessage::new(
            uuid::Uuid::new_v4().to_string(),
            WsMessageType::Event,
            payload,
        );
        serde_json::to_string(&msg)
    });
    match frame {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(
                event_type = event.event_type_str(),
                error = %e,
                "ws event not serializable, skipped"
            );
            None
        }
    }
}

/// Splits selectors into concrete pool ids and a wildcard flag.
fn resolve(selectors: &[PoolSelector]) -> (Vec<PoolId>, bool) {
    let ids = selectors.iter().filter_map(PoolSelector::pool_id).collect();
    let wildcard = selectors.iter().any(PoolSelector::is_wildcard);
    (ids, wildcard)
}

fn subscribe(selectors: &[PoolSelector], subs: &mut SubscriptionManager) -> serde_json::Value {
    let (ids, wildcard) = resolve(selectors);
    subs.subscribe(&ids, wildcard);
    serde_json::json!({
        "subscribed": ids,
        "count": subs.count(),
        "wildcard": subs.is_subscribed_all(),
    })
}

fn unsubscribe(selectors: &[PoolSelector], subs: &mut SubscriptionManager) -> serde_json::Value {
    let (ids, wildcard) = resolve(selectors);
    subs.unsubscribe(&ids, wildcard);
    serde_json::json!({
        "unsubscribed": ids,
        "remaining_count": subs.count(),
        "wildcard": subs.is_subscribed_all(),
    })
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    monitor: &MonitorService,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let reply = match command {
        WsCommand::Subscribe { pool_ids } => {
            WsMessage::new(msg.id, WsMessageType::Response, subscribe(&pool_ids, subs))
        }
        WsCommand::Unsubscribe { pool_ids } => {
            WsMessage::new(msg.id, WsMessageType::Response, unsubscribe(&pool_ids, subs))
        }
        WsCommand::Latest { pool_id } => match monitor.latest_status(pool_id).await {
            Ok(snapshot) => WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({ "pool_id": pool_id, "snapshot": snapshot }),
            ),
            Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), e.to_string()),
        },
    };
    serde_json::to_string(&reply).ok()
}

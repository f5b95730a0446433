//! WebSocket message types: envelope, commands, and pool selectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PoolId;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp; optional on client messages.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped now.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message with a numeric code.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// A pool reference in a subscription command: a numeric id, a numeric
/// string, or `"*"` for every pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PoolSelector {
    /// Numeric pool id.
    Id(PoolId),
    /// Textual id or wildcard.
    Text(String),
}

impl PoolSelector {
    /// Returns `true` for the `"*"` wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim() == "*")
    }

    /// Returns the referenced pool, if this is a usable id.
    #[must_use]
    pub fn pool_id(&self) -> Option<PoolId> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Text(s) => s.trim().parse::<i64>().ok().map(PoolId::new),
        }
    }
}

/// Commands that a client can send over WebSocket, carried in the
/// envelope payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to events for specific pools.
    Subscribe {
        /// Pools to subscribe to. Use `["*"]` for all pools.
        pool_ids: Vec<PoolSelector>,
    },
    /// Unsubscribe from events for specific pools.
    Unsubscribe {
        /// Pools to unsubscribe from. `"*"` clears the wildcard.
        pool_ids: Vec<PoolSelector>,
    },
    /// Latest snapshot of one pool.
    Latest {
        /// Target pool.
        pool_id: PoolId,
    },
}

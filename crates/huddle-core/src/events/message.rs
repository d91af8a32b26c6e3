//! Raw published message.

use serde::{Deserialize, Serialize};

/// A message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Serial assigned by the backend, monotonic per channel.
    pub serial: Option<String>,
    /// Client id of the publishing connection.
    pub client_id: String,
    /// Backend receive timestamp in milliseconds since the epoch.
    pub timestamp_millis: i64,
    /// The published body, normally an encoded `OutboundPayload`.
    pub data: serde_json::Value,
}

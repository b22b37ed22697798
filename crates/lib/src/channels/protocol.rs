//! Bridge WebSocket protocol frames.
//!
//! Request `{ "type": "req", "id", "method", "params" }`, response
//! `{ "type": "res", "id", "ok", "payload" | "error" }`, event `{ "type": "event", "event", "payload" }`.

use crate::channels::client::ClientEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_CONNECT: &str = "connect";
pub const METHOD_REQUEST_PAIRING_CODE: &str = "requestPairingCode";
pub const METHOD_SEND_PRESENCE: &str = "sendPresenceUpdate";
pub const METHOD_SEND_MESSAGE: &str = "sendMessage";

pub const EVENT_CONNECTION_UPDATE: &str = "connection.update";
pub const EVENT_CREDS_UPDATE: &str = "creds.update";
pub const EVENT_MESSAGES_UPSERT: &str = "messages.upsert";

/// One wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Req {
        id: String,
        method: String,
        #[serde(default)]
        params: Value,
    },
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Params for `connect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Stored credentials, or null for a fresh session.
    pub credentials: Option<Value>,
    pub browser: [String; 3],
    pub mark_online_on_connect: bool,
}

/// Payload of a successful `connect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    #[serde(default)]
    pub registered: bool,
}

/// Decode an event frame into a client event. Unknown event names yield `Ok(None)`.
pub fn decode_event(event: &str, payload: Value) -> Result<Option<ClientEvent>, serde_json::Error> {
    let ev = match event {
        EVENT_CONNECTION_UPDATE => ClientEvent::Connection(serde_json::from_value(payload)?),
        EVENT_CREDS_UPDATE => ClientEvent::CredentialsUpdate(payload),
        EVENT_MESSAGES_UPSERT => ClientEvent::MessagesUpsert(serde_json::from_value(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(ev))
}

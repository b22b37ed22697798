//! Messaging client seam: the operations the bot needs and the events it reacts to.

use crate::channels::message::{MessagesUpsert, OutgoingText, Presence, WireMessage};
use crate::session::{Credentials, SessionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection closed")]
    Closed,
    #[error("{method} rejected: {message}")]
    Rejected { method: String, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Operations on one live connection.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Whether the session is linked to an account. False means pairing is needed.
    fn is_registered(&self) -> bool;

    /// Ask for a pairing code for the given phone number (digits only).
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, ClientError>;

    async fn send_presence(&self, presence: Presence, jid: &str) -> Result<(), ClientError>;

    /// Send text to a conversation, quoting `quoted`.
    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingText,
        quoted: &WireMessage,
    ) -> Result<(), ClientError>;

    /// Persist rotated credentials.
    async fn save_credentials(&self, creds: &Credentials) -> Result<(), ClientError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// A fresh connection: the client handle and its event stream.
pub struct Connection {
    pub client: Arc<dyn MessagingClient>,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
}

/// Opens connections; called once per (re)connect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, ClientError>;
}

/// Event emitted by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connection(ConnectionUpdate),
    CredentialsUpdate(Credentials),
    MessagesUpsert(MessagesUpsert),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Close,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Connection lifecycle update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(default)]
    pub connection: Option<ConnectionStatus>,
    #[serde(default)]
    pub last_disconnect: Option<LastDisconnect>,
}

impl ConnectionUpdate {
    pub fn open() -> Self {
        Self {
            connection: Some(ConnectionStatus::Open),
            last_disconnect: None,
        }
    }

    pub fn closed(status_code: Option<u16>) -> Self {
        Self {
            connection: Some(ConnectionStatus::Close),
            last_disconnect: Some(LastDisconnect {
                status_code,
                message: None,
            }),
        }
    }

    pub fn disconnect_reason(&self) -> DisconnectReason {
        DisconnectReason::from_status_code(
            self.last_disconnect.as_ref().and_then(|d| d.status_code),
        )
    }
}

/// Why a connection closed, from the close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    LoggedOut,
    Forbidden,
    /// Lost or timed out (both 408).
    ConnectionLost,
    MultideviceMismatch,
    ConnectionClosed,
    ConnectionReplaced,
    BadSession,
    UnavailableService,
    RestartRequired,
    Unknown(Option<u16>),
}

impl DisconnectReason {
    pub fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(401) => Self::LoggedOut,
            Some(403) => Self::Forbidden,
            Some(408) => Self::ConnectionLost,
            Some(411) => Self::MultideviceMismatch,
            Some(428) => Self::ConnectionClosed,
            Some(440) => Self::ConnectionReplaced,
            Some(500) => Self::BadSession,
            Some(503) => Self::UnavailableService,
            Some(515) => Self::RestartRequired,
            other => Self::Unknown(other),
        }
    }

    /// Every reason except a logout is worth reconnecting for.
    pub fn should_reconnect(&self) -> bool {
        !matches!(self, Self::LoggedOut)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::MultideviceMismatch => write!(f, "multi-device mismatch"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::ConnectionReplaced => write!(f, "connection replaced"),
            Self::BadSession => write!(f, "bad session"),
            Self::UnavailableService => write!(f, "service unavailable"),
            Self::RestartRequired => write!(f, "restart required"),
            Self::Unknown(Some(code)) => write!(f, "status {}", code),
            Self::Unknown(None) => write!(f, "unknown"),
        }
    }
}

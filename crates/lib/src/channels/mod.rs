//! Messaging channel: message and event types, the client trait, and the bridge client.
//!
//! The bot only talks to `MessagingClient`/`Connector`; `BridgeConnector` is the implementation
//! used by the binary.

mod bridge;
mod client;
mod message;
mod protocol;

pub use bridge::{BridgeClient, BridgeConnector};
pub use client::{
    ClientError, ClientEvent, Connection, ConnectionStatus, ConnectionUpdate, Connector,
    DisconnectReason, LastDisconnect, MessagingClient,
};
pub use message::{
    is_broadcast_jid, MediaBody, MessageContent, MessageKey, MessagePayload, MessagesUpsert,
    OutgoingText, Presence, TextBody, UpsertKind, WireMessage, NEWSLETTER_MARKER,
    STATUS_BROADCAST_JID,
};
pub use protocol::{ConnectParams, ConnectResult, Frame};

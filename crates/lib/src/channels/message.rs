//! Message records as delivered by the messaging client, and the text content we answer.
//!
//! Records keep every field they arrive with so the whole record can be echoed back as
//! the quoted message of a reply.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Conversation id of the status broadcast channel.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// Substring identifying newsletter channels.
pub const NEWSLETTER_MARKER: &str = "@newsletter";

/// Addressing part of a message record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Conversation id (JID), e.g. `123@s.whatsapp.net`.
    #[serde(default)]
    pub remote_jid: String,
    /// True when the account the bot runs as sent this message.
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub id: String,
    /// Sender inside a group conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// One message record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessagePayload>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message payload: one of several optional variant fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<TextBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_message: Option<MediaBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_message: Option<MediaBody>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Text-bearing content of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Conversation(String),
    ExtendedText(String),
    ImageCaption(String),
    VideoCaption(String),
    /// Stickers, reactions, documents, media without caption and so on.
    Unsupported,
}

impl MessageContent {
    /// Pick the content variant. Variants are checked in the order conversation, extended text, image, video.
    pub fn from_payload(payload: &MessagePayload) -> Self {
        if let Some(text) = &payload.conversation {
            return Self::Conversation(text.clone());
        }
        if let Some(body) = &payload.extended_text_message {
            return Self::ExtendedText(body.text.clone().unwrap_or_default());
        }
        if let Some(body) = &payload.image_message {
            return Self::ImageCaption(body.caption.clone().unwrap_or_default());
        }
        if let Some(body) = &payload.video_message {
            return Self::VideoCaption(body.caption.clone().unwrap_or_default());
        }
        Self::Unsupported
    }

    /// Text of a supported variant; None for `Unsupported`.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Conversation(t)
            | Self::ExtendedText(t)
            | Self::ImageCaption(t)
            | Self::VideoCaption(t) => Some(t),
            Self::Unsupported => None,
        }
    }
}

impl WireMessage {
    pub fn jid(&self) -> &str {
        &self.key.remote_jid
    }

    /// Content of the payload; `Unsupported` when there is no payload.
    pub fn content(&self) -> MessageContent {
        self.message
            .as_ref()
            .map(MessageContent::from_payload)
            .unwrap_or(MessageContent::Unsupported)
    }
}

/// True for status broadcast and newsletter conversations, which are never answered.
pub fn is_broadcast_jid(jid: &str) -> bool {
    jid == STATUS_BROADCAST_JID || jid.contains(NEWSLETTER_MARKER)
}

/// Batch tag of a `messages.upsert` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// Live messages.
    Notify,
    /// History sync and messages appended by other devices.
    Append,
    #[serde(other)]
    Other,
}

/// A batch of message records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesUpsert {
    #[serde(rename = "type")]
    pub kind: UpsertKind,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

/// Presence state sent to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

/// Text content of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingText {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> WireMessage {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn conversation_text() {
        let m = parse(json!({
            "key": { "remoteJid": "123@s.whatsapp.net", "fromMe": false, "id": "A1" },
            "message": { "conversation": "Hello" }
        }));
        assert_eq!(m.content(), MessageContent::Conversation("Hello".into()));
        assert_eq!(m.jid(), "123@s.whatsapp.net");
    }

    #[test]
    fn extended_text_and_captions() {
        let ext = parse(json!({ "key": { "remoteJid": "a" }, "message": { "extendedTextMessage": { "text": "link https://x", "matchedText": "https://x" } } }));
        assert_eq!(ext.content().text(), Some("link https://x"));

        let img = parse(json!({ "key": { "remoteJid": "a" }, "message": { "imageMessage": { "caption": "look", "mimetype": "image/jpeg" } } }));
        assert_eq!(img.content(), MessageContent::ImageCaption("look".into()));

        let vid = parse(json!({ "key": { "remoteJid": "a" }, "message": { "videoMessage": { "caption": "clip" } } }));
        assert_eq!(vid.content(), MessageContent::VideoCaption("clip".into()));
    }

    #[test]
    fn image_without_caption_is_empty_text() {
        let m = parse(json!({ "key": { "remoteJid": "a" }, "message": { "imageMessage": { "mimetype": "image/png" } } }));
        assert_eq!(m.content().text(), Some(""));
    }

    #[test]
    fn sticker_and_missing_payload_are_unsupported() {
        let sticker = parse(json!({ "key": { "remoteJid": "a" }, "message": { "stickerMessage": {} } }));
        assert_eq!(sticker.content(), MessageContent::Unsupported);
        assert!(sticker.content().text().is_none());

        let empty = parse(json!({ "key": { "remoteJid": "a" }, "message": null }));
        assert!(empty.message.is_none());
        assert_eq!(empty.content(), MessageContent::Unsupported);
    }

    #[test]
    fn unknown_fields_survive_reserialization() {
        let raw = json!({
            "key": { "remoteJid": "123@s.whatsapp.net", "fromMe": false, "id": "A1" },
            "messageTimestamp": 1700000000,
            "pushName": "Ana",
            "message": { "conversation": "hi", "messageContextInfo": { "deviceListMetadata": {} } }
        });
        let m = parse(raw.clone());
        assert_eq!(serde_json::to_value(&m).unwrap(), raw);
    }

    #[test]
    fn broadcast_and_newsletter_jids() {
        assert!(is_broadcast_jid("status@broadcast"));
        assert!(is_broadcast_jid("120363025246125888@newsletter"));
        assert!(!is_broadcast_jid("123@s.whatsapp.net"));
        assert!(!is_broadcast_jid("123-456@g.us"));
    }

    #[test]
    fn upsert_kind_tags() {
        let notify: MessagesUpsert = serde_json::from_value(json!({ "type": "notify", "messages": [] })).unwrap();
        assert_eq!(notify.kind, UpsertKind::Notify);
        let other: MessagesUpsert = serde_json::from_value(json!({ "type": "something-new" })).unwrap();
        assert_eq!(other.kind, UpsertKind::Other);
        assert!(other.messages.is_empty());
    }
}

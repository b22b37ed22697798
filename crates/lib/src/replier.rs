//! Auto-reply: answer every live incoming text message through the answer backend.

use crate::answer::AnswerBackend;
use crate::channels::{
    is_broadcast_jid, ClientError, MessagesUpsert, MessagingClient, OutgoingText, Presence,
    UpsertKind, WireMessage, STATUS_BROADCAST_JID,
};
use std::sync::Arc;

const PREVIEW_CHARS: usize = 30;

/// Why a message was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPayload,
    FromMe,
    Unsupported,
    EmptyText,
    StatusBroadcast,
    Newsletter,
}

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    Skipped(SkipReason),
}

/// Counts for one handled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Decide whether a message gets an answer; returns the text to ask about.
pub fn triage(msg: &WireMessage) -> Result<String, SkipReason> {
    if msg.message.is_none() {
        return Err(SkipReason::NoPayload);
    }
    if msg.key.from_me {
        return Err(SkipReason::FromMe);
    }
    let content = msg.content();
    let Some(text) = content.text() else {
        return Err(SkipReason::Unsupported);
    };
    if text.is_empty() {
        return Err(SkipReason::EmptyText);
    }
    let jid = msg.jid();
    if is_broadcast_jid(jid) {
        return Err(if jid == STATUS_BROADCAST_JID {
            SkipReason::StatusBroadcast
        } else {
            SkipReason::Newsletter
        });
    }
    Ok(text.to_string())
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Answers messages on one connection.
pub struct Replier {
    client: Arc<dyn MessagingClient>,
    answers: Arc<dyn AnswerBackend>,
}

impl Replier {
    pub fn new(client: Arc<dyn MessagingClient>, answers: Arc<dyn AnswerBackend>) -> Self {
        Self { client, answers }
    }

    /// Handle a `messages.upsert` batch. Only live (`notify`) batches are answered; messages run in
    /// batch order and a failing message does not stop the rest of the batch.
    pub async fn handle_upsert(&self, upsert: MessagesUpsert) -> BatchReport {
        let mut report = BatchReport::default();
        if upsert.kind != UpsertKind::Notify {
            log::debug!(
                "replier: ignoring {:?} batch of {} message(s)",
                upsert.kind,
                upsert.messages.len()
            );
            return report;
        }
        for msg in &upsert.messages {
            match self.handle_message(msg).await {
                Ok(Outcome::Replied) => report.replied += 1,
                Ok(Outcome::Skipped(reason)) => {
                    log::debug!("replier: skipped {} ({:?})", msg.key.id, reason);
                    report.skipped += 1;
                }
                Err(e) => {
                    log::error!(
                        "replier: handling message {} from {} failed: {}",
                        msg.key.id,
                        msg.jid(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Handle one message: composing presence, ask, reply quoting the original.
    pub async fn handle_message(&self, msg: &WireMessage) -> Result<Outcome, ClientError> {
        let text = match triage(msg) {
            Ok(t) => t,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };
        let jid = msg.jid();
        log::info!("replier: thinking response for: {}...", preview(&text));

        self.client.send_presence(Presence::Composing, jid).await?;
        let reply = self.answers.reply_or_fallback(&text).await;
        self.client
            .send_message(jid, OutgoingText { text: reply }, msg)
            .await?;
        Ok(Outcome::Replied)
    }
}

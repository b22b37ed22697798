//! Shared test doubles: a recording messaging client, a scripted connector, and an HTTP answer server.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::Query;
use axum::routing::get;
use axum::Router;
use lib::channels::{
    ClientError, ClientEvent, Connection, Connector, MessagingClient, OutgoingText, Presence,
    WireMessage,
};
use lib::session::Credentials;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Presence(Presence, String),
    Send {
        jid: String,
        text: String,
        quoted_id: String,
    },
    PairingCode(String),
    SaveCredentials(Value),
    Close,
}

/// Messaging client that records every call.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    registered: bool,
    /// Presence updates to this jid fail.
    fail_presence_for: Option<String>,
}

impl RecordingClient {
    pub fn registered() -> Self {
        Self {
            registered: true,
            ..Default::default()
        }
    }

    pub fn unregistered() -> Self {
        Self::default()
    }

    pub fn failing_presence_for(jid: &str) -> Self {
        Self {
            registered: true,
            fail_presence_for: Some(jid.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { jid, text, .. } => Some((jid, text)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessagingClient for RecordingClient {
    fn is_registered(&self) -> bool {
        self.registered
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, ClientError> {
        self.record(Call::PairingCode(phone_number.to_string()));
        Ok("ABCD-1234".to_string())
    }

    async fn send_presence(&self, presence: Presence, jid: &str) -> Result<(), ClientError> {
        if self.fail_presence_for.as_deref() == Some(jid) {
            return Err(ClientError::Closed);
        }
        self.record(Call::Presence(presence, jid.to_string()));
        Ok(())
    }

    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingText,
        quoted: &WireMessage,
    ) -> Result<(), ClientError> {
        self.record(Call::Send {
            jid: jid.to_string(),
            text: content.text,
            quoted_id: quoted.key.id.clone(),
        });
        Ok(())
    }

    async fn save_credentials(&self, creds: &Credentials) -> Result<(), ClientError> {
        self.record(Call::SaveCredentials(creds.clone()));
        Ok(())
    }

    async fn close(&self) {
        self.record(Call::Close);
    }
}

/// What one `connect` call produces.
pub enum Script {
    /// Connect fails.
    Fail,
    /// Connection emits these events. When `hold_open` is false the stream ends afterwards.
    Events {
        client: Arc<RecordingClient>,
        events: Vec<ClientEvent>,
        hold_open: bool,
    },
}

/// Connector that plays back one script per connect call.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
    held: Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicUsize::new(0),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Connection, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            None | Some(Script::Fail) => Err(ClientError::Connect("refused".to_string())),
            Some(Script::Events {
                client,
                events,
                hold_open,
            }) => {
                let (tx, rx) = mpsc::unbounded_channel();
                for ev in events {
                    let _ = tx.send(ev);
                }
                if hold_open {
                    self.held.lock().unwrap().push(tx);
                }
                Ok(Connection {
                    client,
                    events: rx,
                })
            }
        }
    }
}

/// Message record as the bridge delivers it.
pub fn wire(jid: &str, from_me: bool, id: &str, message: Value) -> WireMessage {
    serde_json::from_value(json!({
        "key": { "remoteJid": jid, "fromMe": from_me, "id": id },
        "messageTimestamp": 1_700_000_000u64,
        "message": message
    }))
    .expect("valid message record")
}

/// Answer server answering with `respond(question)` as (status, body). Returns the endpoint URL and the questions it saw.
pub async fn spawn_answer_server(
    respond: fn(&str) -> (u16, String),
) -> (String, Arc<Mutex<Vec<String>>>) {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_handler = seen.clone();
    let app = Router::new().route(
        "/v2/hercai",
        get(move |Query(q): Query<HashMap<String, String>>| {
            let seen = seen_handler.clone();
            async move {
                let question = q.get("question").cloned().unwrap_or_default();
                seen.lock().unwrap().push(question.clone());
                let (status, body) = respond(&question);
                (
                    axum::http::StatusCode::from_u16(status).expect("valid status"),
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    body,
                )
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind answer server");
    let addr: SocketAddr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}/v2/hercai", addr), seen)
}

/// JSON reply body helper for answer servers.
pub fn reply_json(text: &str) -> String {
    json!({ "reply": text }).to_string()
}

/// Poll until `cond` holds or the timeout passes.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

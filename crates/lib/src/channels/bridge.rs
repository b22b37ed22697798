//! Bridge client: talks to an external messaging bridge over a WebSocket.
//!
//! The bridge process owns the messaging protocol stack. We send requests (connect, pairing,
//! presence, send) and receive lifecycle, credential and message events.

use crate::channels::client::{ClientError, ClientEvent, Connection, Connector, MessagingClient};
use crate::channels::message::{OutgoingText, Presence, WireMessage};
use crate::channels::protocol::{
    self, ConnectParams, ConnectResult, Frame, METHOD_CONNECT, METHOD_REQUEST_PAIRING_CODE,
    METHOD_SEND_MESSAGE, METHOD_SEND_PRESENCE,
};
use crate::config::BridgeConfig;
use crate::session::{Credentials, SessionStore};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;

/// Requests waiting for a response. Once `closed` is set no new waiter is accepted.
#[derive(Default)]
struct PendingRequests {
    closed: bool,
    waiters: HashMap<String, oneshot::Sender<Result<Value, ClientError>>>,
}

type Pending = Arc<Mutex<PendingRequests>>;

/// Opens bridge connections, handing stored credentials to the bridge on every connect.
pub struct BridgeConnector {
    url: String,
    browser: [String; 3],
    mark_online_on_connect: bool,
    session: Arc<SessionStore>,
}

impl BridgeConnector {
    pub fn new(url: impl Into<String>, bridge: &BridgeConfig, session: Arc<SessionStore>) -> Self {
        Self {
            url: url.into(),
            browser: bridge.browser.clone(),
            mark_online_on_connect: bridge.mark_online_on_connect,
            session,
        }
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self) -> Result<Connection, ClientError> {
        log::debug!("bridge: connecting to {}", self.url);
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let pending: Pending = Arc::new(Mutex::new(PendingRequests::default()));

        tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                let is_close = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    log::debug!("bridge: write failed: {}", e);
                    break;
                }
                if is_close {
                    break;
                }
            }
        });

        let pending_reader = pending.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        log::debug!("bridge: read failed: {}", e);
                        break;
                    }
                };
                dispatch_frame(&text, &pending_reader, &event_tx).await;
            }
            let mut pending = pending_reader.lock().await;
            pending.closed = true;
            for (_, tx) in pending.waiters.drain() {
                let _ = tx.send(Err(ClientError::Closed));
            }
            log::debug!("bridge: reader stopped");
        });

        let client = BridgeClient {
            write_tx,
            pending,
            next_id: AtomicU64::new(1),
            registered: AtomicBool::new(false),
            session: self.session.clone(),
        };
        let params = ConnectParams {
            credentials: self.session.load_credentials(),
            browser: self.browser.clone(),
            mark_online_on_connect: self.mark_online_on_connect,
        };
        let params =
            serde_json::to_value(params).map_err(|e| ClientError::Protocol(e.to_string()))?;
        let payload = match client.request(METHOD_CONNECT, params).await {
            Ok(p) => p,
            Err(e) => {
                client.close().await;
                return Err(e);
            }
        };
        let result: ConnectResult = match serde_json::from_value(payload) {
            Ok(r) => r,
            Err(e) => {
                client.close().await;
                return Err(ClientError::Protocol(format!("malformed connect result: {}", e)));
            }
        };
        client.registered.store(result.registered, Ordering::SeqCst);
        log::info!(
            "bridge: connected to {} (registered: {})",
            self.url,
            result.registered
        );

        Ok(Connection {
            client: Arc::new(client),
            events: event_rx,
        })
    }
}

async fn dispatch_frame(
    text: &str,
    pending: &Pending,
    event_tx: &mpsc::UnboundedSender<ClientEvent>,
) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("bridge: ignoring unparsable frame: {}", e);
            return;
        }
    };
    match frame {
        Frame::Res {
            id,
            ok,
            payload,
            error,
        } => {
            let Some(tx) = pending.lock().await.waiters.remove(&id) else {
                log::debug!("bridge: response for unknown request id {}", id);
                return;
            };
            let result = if ok {
                Ok(payload.unwrap_or(Value::Null))
            } else {
                Err(ClientError::Protocol(
                    error.unwrap_or_else(|| "request failed".to_string()),
                ))
            };
            let _ = tx.send(result);
        }
        Frame::Event { event, payload } => match protocol::decode_event(&event, payload) {
            Ok(Some(ev)) => {
                let _ = event_tx.send(ev);
            }
            Ok(None) => log::debug!("bridge: unhandled event {}", event),
            Err(e) => log::warn!("bridge: malformed {} event: {}", event, e),
        },
        Frame::Req { method, .. } => {
            log::debug!("bridge: ignoring request frame from bridge ({})", method);
        }
    }
}

/// Handle to one bridge connection.
pub struct BridgeClient {
    write_tx: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    registered: AtomicBool,
    session: Arc<SessionStore>,
}

impl BridgeClient {
    /// Send a request and wait for its response payload.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let frame = Frame::Req {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        let text =
            serde_json::to_string(&frame).map_err(|e| ClientError::Protocol(e.to_string()))?;
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(ClientError::Closed);
            }
            pending.waiters.insert(id.clone(), tx);
        }
        if self.write_tx.send(Message::Text(text)).is_err() {
            self.pending.lock().await.waiters.remove(&id);
            return Err(ClientError::Closed);
        }
        match rx.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(ClientError::Protocol(message))) => Err(ClientError::Rejected {
                method: method.to_string(),
                message,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::Closed),
        }
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, ClientError> {
        let payload = self
            .request(
                METHOD_REQUEST_PAIRING_CODE,
                json!({ "phoneNumber": phone_number }),
            )
            .await?;
        payload
            .get("code")
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
            .ok_or_else(|| ClientError::Protocol("pairing response without code".to_string()))
    }

    async fn send_presence(&self, presence: Presence, jid: &str) -> Result<(), ClientError> {
        self.request(
            METHOD_SEND_PRESENCE,
            json!({ "presence": presence, "jid": jid }),
        )
        .await
        .map(|_| ())
    }

    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingText,
        quoted: &WireMessage,
    ) -> Result<(), ClientError> {
        self.request(
            METHOD_SEND_MESSAGE,
            json!({ "jid": jid, "content": content, "options": { "quoted": quoted } }),
        )
        .await
        .map(|_| ())
    }

    async fn save_credentials(&self, creds: &Credentials) -> Result<(), ClientError> {
        self.session.save_credentials(creds).await?;
        Ok(())
    }

    async fn close(&self) {
        let _ = self.write_tx.send(Message::Close(None));
    }
}

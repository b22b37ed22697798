//! Connection supervisor: connect, pair when needed, dispatch events, reconnect with backoff.
//!
//! A close with reason "logged out" ends the run; any other close schedules exactly one
//! reconnect attempt after an exponential delay. Consecutive failures (connect errors or
//! closes without the connection ever opening) are bounded by `maxAttempts`.

use crate::answer::AnswerBackend;
use crate::channels::{
    ClientEvent, Connection, ConnectionStatus, Connector, DisconnectReason, MessagesUpsert,
};
use crate::config::ReconnectConfig;
use crate::pairing::{self, PhoneNumberSource};
use crate::replier::Replier;
use anyhow::Result;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Connection state as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    LoggedOut,
}

/// Why `Supervisor::run` returned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    LoggedOut,
    Shutdown,
}

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay for the current attempt; advances the attempt.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

enum SessionEnd {
    LoggedOut,
    Shutdown,
    Closed(DisconnectReason),
}

/// Owns the connector, answer backend and reconnect policy for the lifetime of the bot.
pub struct Supervisor {
    connector: Arc<dyn Connector>,
    answers: Arc<dyn AnswerBackend>,
    reconnect: ReconnectConfig,
    phone_source: PhoneNumberSource,
    state: ConnectionState,
    backoff: Backoff,
    failures: u32,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        answers: Arc<dyn AnswerBackend>,
        reconnect: ReconnectConfig,
        phone_source: PhoneNumberSource,
    ) -> Self {
        let backoff = Backoff::from_config(&reconnect);
        Self {
            connector,
            answers,
            reconnect,
            phone_source,
            state: ConnectionState::Disconnected,
            backoff,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            log::debug!("supervisor: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run until logged out, shut down, or out of reconnect attempts (error).
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunExit>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                res = self.connector.connect() => res,
                _ = shutdown.as_mut() => return Ok(self.shut_down()),
            };
            match connected {
                Ok(conn) => match self.drive(conn, shutdown.as_mut()).await {
                    SessionEnd::LoggedOut => {
                        self.set_state(ConnectionState::LoggedOut);
                        log::warn!(
                            "supervisor: logged out; remove the session directory and pair again"
                        );
                        return Ok(RunExit::LoggedOut);
                    }
                    SessionEnd::Shutdown => return Ok(self.shut_down()),
                    SessionEnd::Closed(reason) => {
                        log::debug!("supervisor: session ended ({})", reason);
                    }
                },
                Err(e) => {
                    log::warn!("supervisor: connect failed: {}", e);
                }
            }

            self.set_state(ConnectionState::Disconnected);
            self.failures = self.failures.saturating_add(1);
            let max = self.reconnect.max_attempts;
            if max != 0 && self.failures > max {
                anyhow::bail!(
                    "reconnect attempts exhausted after {} consecutive failures",
                    self.failures
                );
            }
            let delay = self.backoff.next_delay();
            log::info!(
                "supervisor: reconnecting in {} ms (attempt {})",
                delay.as_millis(),
                self.failures
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.as_mut() => return Ok(self.shut_down()),
            }
        }
    }

    fn shut_down(&mut self) -> RunExit {
        self.set_state(ConnectionState::Disconnected);
        log::info!("supervisor: shutting down");
        RunExit::Shutdown
    }

    /// Serve one connection until it closes or shutdown fires.
    async fn drive<F>(&mut self, conn: Connection, mut shutdown: Pin<&mut F>) -> SessionEnd
    where
        F: Future<Output = ()>,
    {
        let Connection { client, mut events } = conn;

        if !client.is_registered() {
            log::warn!("pairing: no session found, please pair");
            let paired = tokio::select! {
                res = pairing::request_code(client.as_ref(), &self.phone_source) => res,
                _ = shutdown.as_mut() => {
                    client.close().await;
                    return SessionEnd::Shutdown;
                }
            };
            match paired {
                Ok(Some(code)) => {
                    println!("Your Pairing Code: {}", code);
                    log::info!("pairing: code issued, enter it on your phone");
                }
                Ok(None) => {}
                Err(e) => log::error!("pairing: {}", e),
            }
        }

        let replier = Arc::new(Replier::new(client.clone(), self.answers.clone()));
        loop {
            let event = tokio::select! {
                ev = events.recv() => ev,
                _ = shutdown.as_mut() => {
                    client.close().await;
                    return SessionEnd::Shutdown;
                }
            };
            let Some(event) = event else {
                log::info!("supervisor: event stream ended, reconnecting: true");
                return SessionEnd::Closed(DisconnectReason::Unknown(None));
            };
            match event {
                ClientEvent::Connection(update) => match update.connection {
                    Some(ConnectionStatus::Open) => {
                        self.set_state(ConnectionState::Connected);
                        self.backoff.reset();
                        self.failures = 0;
                        log::info!(
                            "supervisor: bot connected, auto-reply is active for all messages"
                        );
                    }
                    Some(ConnectionStatus::Connecting) => {
                        self.set_state(ConnectionState::Connecting);
                    }
                    Some(ConnectionStatus::Close) => {
                        let reason = update.disconnect_reason();
                        let reconnect = reason.should_reconnect();
                        log::warn!(
                            "supervisor: connection closed ({}), reconnecting: {}",
                            reason,
                            reconnect
                        );
                        client.close().await;
                        return if reconnect {
                            SessionEnd::Closed(reason)
                        } else {
                            SessionEnd::LoggedOut
                        };
                    }
                    None => {}
                },
                ClientEvent::CredentialsUpdate(creds) => {
                    if let Err(e) = client.save_credentials(&creds).await {
                        log::error!("supervisor: saving credentials failed: {}", e);
                    }
                }
                ClientEvent::MessagesUpsert(batch) => spawn_batch(replier.clone(), batch),
            }
        }
    }
}

/// Run one batch on its own task; a panic inside is logged and contained.
fn spawn_batch(replier: Arc<Replier>, batch: MessagesUpsert) {
    tokio::spawn(async move {
        match AssertUnwindSafe(replier.handle_upsert(batch)).catch_unwind().await {
            Ok(report) => {
                if report.replied + report.failed > 0 {
                    log::debug!(
                        "supervisor: batch done ({} replied, {} skipped, {} failed)",
                        report.replied,
                        report.skipped,
                        report.failed
                    );
                }
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("supervisor: message batch handler panicked: {}", msg);
            }
        }
    });
}

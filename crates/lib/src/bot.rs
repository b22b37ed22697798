//! Bot wiring: open the session, build the bridge connector and answer client, run the supervisor.

use crate::answer::AnswerClient;
use crate::channels::BridgeConnector;
use crate::config::{self, Config};
use crate::pairing::PhoneNumberSource;
use crate::session::SessionStore;
use crate::supervisor::{RunExit, Supervisor};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Run the bot until logged out, shut down, or out of reconnect attempts.
/// `config_path` is the path the config was loaded from (used to resolve the session directory).
/// The session directory is created if absent and locked for the lifetime of the run.
/// `config.bridge.url` is used as-is; callers apply env/flag overrides first.
pub async fn run_bot<F>(config: Config, config_path: &Path, shutdown: F) -> Result<RunExit>
where
    F: Future<Output = ()>,
{
    let session_dir = config::resolve_session_dir(&config, config_path);
    let session = Arc::new(
        SessionStore::open(&session_dir)
            .with_context(|| format!("opening session directory {}", session_dir.display()))?,
    );
    let answers = AnswerClient::new(&config.answer).context("building answer client")?;
    log::info!("answer endpoint: {}", answers.endpoint());

    let connector = BridgeConnector::new(config.bridge.url.trim(), &config.bridge, session.clone());
    let phone_source = PhoneNumberSource::from_config(config.pairing.phone_number.as_deref());

    let mut supervisor = Supervisor::new(
        Arc::new(connector),
        Arc::new(answers),
        config.reconnect.clone(),
        phone_source,
    );
    let exit = supervisor.run(shutdown).await;
    drop(supervisor);
    log::debug!("releasing session directory {}", session.dir().display());
    exit
}

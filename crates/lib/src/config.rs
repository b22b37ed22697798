//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.autoreply/config.json`) and environment.
//! Every field is optional; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default question-answer endpoint. The question is passed as the `question` query parameter.
pub const DEFAULT_ANSWER_ENDPOINT: &str = "https://hercai.zaide.op/v2/hercai";

/// Reply sent when the question-answer endpoint fails.
pub const DEFAULT_FALLBACK_TEXT: &str = "⚠️ I'm having trouble connecting to my brain server.";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where session credentials live.
    #[serde(default)]
    pub session: SessionConfig,

    /// Messaging bridge connection.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Question-answer endpoint and fallback reply.
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Reconnect backoff and retry limit.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Pairing options for unregistered sessions.
    #[serde(default)]
    pub pairing: PairingConfig,
}

/// Session directory settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Session directory. Relative paths are resolved against the config file's parent. Default: `session` next to the config file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Bridge WebSocket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// WebSocket URL of the bridge (default "ws://127.0.0.1:8787/ws"). Overridden by AUTOREPLY_BRIDGE_URL env.
    #[serde(default = "default_bridge_url")]
    pub url: String,

    /// Browser identity announced to the network: [name, agent, version].
    #[serde(default = "default_browser")]
    pub browser: [String; 3],

    /// Mark the account as online as soon as the connection opens.
    #[serde(default = "default_true")]
    pub mark_online_on_connect: bool,
}

/// Question-answer endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerConfig {
    #[serde(default = "default_answer_endpoint")]
    pub endpoint: String,

    /// Text sent instead of a reply when the endpoint fails.
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Reconnect policy: exponential backoff between `baseDelayMs` and `maxDelayMs`, at most `maxAttempts` consecutive failures (0 = unlimited).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Pairing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingConfig {
    /// Phone number to pair with. When unset the number is read from the terminal.
    #[serde(default)]
    pub phone_number: Option<String>,
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8787/ws".to_string()
}

fn default_browser() -> [String; 3] {
    [
        "GPT Auto Bot".to_string(),
        "Chrome".to_string(),
        "1.0.0".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_answer_endpoint() -> String {
    DEFAULT_ANSWER_ENDPOINT.to_string()
}

fn default_fallback_text() -> String {
    DEFAULT_FALLBACK_TEXT.to_string()
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            browser: default_browser(),
            mark_online_on_connect: true,
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_answer_endpoint(),
            fallback_text: default_fallback_text(),
            timeout_secs: None,
        }
    }
}

impl AnswerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Resolve the bridge URL: env AUTOREPLY_BRIDGE_URL overrides config.
pub fn resolve_bridge_url(config: &Config) -> String {
    std::env::var("AUTOREPLY_BRIDGE_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.bridge.url.trim().to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("AUTOREPLY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".autoreply").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used (for resolving the session directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the session directory: `session.directory` if set (relative paths resolved against the config file's parent), otherwise `session` next to the config file.
pub fn resolve_session_dir(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.session.directory {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                parent.join(d)
            }
        }
        _ => parent.join("session"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.answer.endpoint, DEFAULT_ANSWER_ENDPOINT);
        assert_eq!(c.answer.fallback_text, DEFAULT_FALLBACK_TEXT);
        assert!(c.answer.timeout().is_none());
        assert_eq!(c.bridge.browser[0], "GPT Auto Bot");
        assert!(c.bridge.mark_online_on_connect);
        assert_eq!(c.reconnect.max_attempts, 10);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: Config = serde_json::from_str(
            r#"{ "answer": { "timeoutSecs": 15 }, "reconnect": { "maxAttempts": 0 } }"#,
        )
        .unwrap();
        assert_eq!(c.answer.timeout(), Some(Duration::from_secs(15)));
        assert_eq!(c.answer.endpoint, DEFAULT_ANSWER_ENDPOINT);
        assert_eq!(c.reconnect.max_attempts, 0);
        assert_eq!(c.reconnect.base_delay_ms, 1_000);
        assert_eq!(c.bridge.url, "ws://127.0.0.1:8787/ws");
    }

    #[test]
    fn resolve_session_dir_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.autoreply/config.json");
        assert_eq!(
            resolve_session_dir(&config, path),
            PathBuf::from("/home/user/.autoreply/session")
        );
    }

    #[test]
    fn resolve_session_dir_override_relative() {
        let mut config = Config::default();
        config.session.directory = Some(PathBuf::from("state/wa"));
        let path = Path::new("/home/user/.autoreply/config.json");
        assert_eq!(
            resolve_session_dir(&config, path),
            PathBuf::from("/home/user/.autoreply/state/wa")
        );
    }

    #[test]
    fn resolve_session_dir_override_absolute() {
        let mut config = Config::default();
        config.session.directory = Some(PathBuf::from("/var/lib/autoreply"));
        let path = Path::new("config.json");
        assert_eq!(
            resolve_session_dir(&config, path),
            PathBuf::from("/var/lib/autoreply")
        );
    }

    #[test]
    fn load_config_missing_file_is_default() {
        let path = std::env::temp_dir().join("autoreply-config-test-missing/config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.answer.endpoint, DEFAULT_ANSWER_ENDPOINT);
    }
}

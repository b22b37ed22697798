//! Initialize the configuration directory: create ~/.autoreply, a default config, and the session directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the session directory resolved from the config.
///
/// Returns the session directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let session_dir = config::resolve_session_dir(&config, config_path);
    if !session_dir.exists() {
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("creating session directory {}", session_dir.display()))?;
        log::info!("created session directory at {}", session_dir.display());
    } else {
        log::debug!("session directory already exists at {}, skipping", session_dir.display());
    }

    Ok(session_dir)
}

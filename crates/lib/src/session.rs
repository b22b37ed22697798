//! Session directory: opaque messaging credentials plus an exclusive process lock.
//!
//! The credentials are whatever the messaging client hands us on `creds.update`; they are
//! stored as-is in `creds.json` and handed back on the next connect.

use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

const CREDS_FILE: &str = "creds.json";
const LOCK_FILE: &str = ".lock";

/// Opaque credential state owned by the messaging client.
pub type Credentials = serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session directory {0} is in use by another process")]
    Locked(PathBuf),
    #[error("encoding credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_err(path: &Path, source: std::io::Error) -> SessionError {
    SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// An opened session directory. Holds the lock until dropped.
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    lock: File,
}

impl SessionStore {
    /// Create the directory if missing and take the exclusive lock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let lock_path = dir.join(LOCK_FILE);
        let lock = File::create(&lock_path).map_err(|e| io_err(&lock_path, e))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(SessionError::Locked(dir));
        }
        log::debug!("session: opened {}", dir.display());
        Ok(Self { dir, lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    /// Load stored credentials. Missing file => None; unreadable or invalid file is logged and treated as missing.
    pub fn load_credentials(&self) -> Option<Credentials> {
        let path = self.creds_path();
        let s = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("session: reading {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("session: {} is not valid JSON, ignoring: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist credentials: write a temp file, then rename over `creds.json`.
    pub async fn save_credentials(&self, creds: &Credentials) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(creds)?;
        let path = self.creds_path();
        let tmp = self.dir.join(format!("{}.tmp", CREDS_FILE));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_err(&path, e))?;
        log::debug!("session: credentials saved to {}", path.display());
        Ok(())
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}

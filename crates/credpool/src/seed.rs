//! Credential seed file
//!
//! A JSON file holding the list of credential payloads the external login
//! layer produced. All writes use atomic temp-file + rename to prevent
//! corruption on crash, and the file is chmod 0600 since payloads carry
//! session cookies. Only payloads are stored here: usage counters and
//! cooldown state are process-local and never persisted.

use std::path::{Path, PathBuf};

use common::Payload;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Seed-file manager for credential payloads.
///
/// The Mutex serializes writes; reads briefly take the lock to clone the
/// in-memory list.
#[derive(Debug)]
pub struct CredentialFile {
    path: PathBuf,
    state: Mutex<Vec<Payload>>,
}

impl CredentialFile {
    /// Load payloads from the given file path.
    ///
    /// If the file doesn't exist, creates it as an empty list so future
    /// loads skip the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading seed file: {e}")))?;
            let payloads: Vec<Payload> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing seed file: {e}")))?;
            info!(path = %path.display(), payloads = payloads.len(), "loaded credential seeds");
            payloads
        } else {
            info!(path = %path.display(), "seed file not found, starting empty");
            let payloads = Vec::new();
            write_atomic(&path, &payloads).await?;
            payloads
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Append a payload and persist to disk.
    pub async fn add(&self, payload: Payload) -> Result<()> {
        let mut state = self.state.lock().await;
        state.push(payload);
        write_atomic(&self.path, &state).await
    }

    /// Clone of all stored payloads, e.g. for seeding a pool at startup.
    pub async fn payloads(&self) -> Vec<Payload> {
        let state = self.state.lock().await;
        state.clone()
    }

    /// Number of stored payloads.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    /// Whether the file holds no payloads.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write payloads to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. File permissions are set to 0600.
async fn write_atomic(path: &Path, data: &[Payload]) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing seed file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("seed path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp seed file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting seed file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp seed file: {e}")))?;

    debug!(path = %path.display(), "persisted credential seeds");
    Ok(())
}

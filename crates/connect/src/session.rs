//! Session token generation and persistence.
//!
//! The store only holds the token; whether it is still valid is always
//! decided by the wallet after a fresh connection.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use simpleos_connect_protocol::constants::SESSION_KEY;

/// Entropy of a session token in bytes (32 hex characters).
const TOKEN_BYTES: usize = 16;

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable slot for the single active session token.
pub trait SessionStore: Send + Sync {
    /// Returns the stored token, if any.
    fn load(&self) -> Option<String>;

    /// Replaces the stored token.
    fn save(&self, token: &str) -> Result<(), SessionError>;

    /// Forgets the stored token.
    fn clear(&self) -> Result<(), SessionError>;
}

/// Generates a fresh session token from the OS CSPRNG, lowercase hex.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Keeps the token in process memory only.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    #[serde(rename = "session_uuid")]
    token: String,
}

/// Persists the token to a small JSON file.
///
/// The file is read once at construction and rewritten on every change.
pub struct FileSessionStore {
    path: PathBuf,
    token: RwLock<Option<String>>,
}

impl FileSessionStore {
    /// Opens the store at `path`, loading any token already on disk.
    pub fn new(path: PathBuf) -> Result<Self, SessionError> {
        let token = load_token(&path)?;
        Ok(Self {
            path,
            token: RwLock::new(token),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(&PersistedSession {
            token: token.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
        debug!(path = ?self.path, "persisted {SESSION_KEY}");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = ?self.path, "removed {SESSION_KEY}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn load_token(path: &Path) -> Result<Option<String>, SessionError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let persisted: PersistedSession = serde_json::from_str(&data)?;
    debug!(path = ?path, "loaded {SESSION_KEY}");
    Ok(Some(persisted.token).filter(|t| !t.is_empty()))
}

/// Returns the default session file path.
pub fn default_session_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("simpleos-connect").join("session.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

//! Durable slot for the access token written by the refresh flow.
//!
//! The client never reads browser storage directly; it writes through a
//! [`TokenStore`] so native and WASM callers can plug in memory, file or
//! keychain backends.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{request_id::now_millis, TokenStoreError};

/// Access token with its absolute expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Expiry as Unix milliseconds.
    #[serde(rename = "tokenExpiry")]
    pub expires_at_ms: u64,
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

impl StoredToken {
    pub fn new(access_token: impl Into<String>, expires_at_ms: u64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at_ms,
        }
    }

    /// Token that expires `ttl_ms` from now.
    pub fn expiring_in(access_token: impl Into<String>, ttl_ms: u64) -> Self {
        Self::new(access_token, now_millis().saturating_add(ttl_ms))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Storage for the current access token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Result<Option<StoredToken>, TokenStoreError>;
    fn set(&self, token: StoredToken) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Process-local token store. The default for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<StoredToken>, TokenStoreError> {
        let slot = self.slot.lock().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(slot.clone())
    }

    fn set(&self, token: StoredToken) -> Result<(), TokenStoreError> {
        let mut slot = self.slot.lock().map_err(|_| TokenStoreError::Poisoned)?;
        *slot = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let mut slot = self.slot.lock().map_err(|_| TokenStoreError::Poisoned)?;
        *slot = None;
        Ok(())
    }
}

/// Token store backed by a JSON file. A missing file means "no token".
///
/// **Not available on `wasm32` targets.**
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct FileTokenStore {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileTokenStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<StoredToken>, TokenStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn set(&self, token: StoredToken) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&token)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

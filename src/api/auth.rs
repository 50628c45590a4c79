//! Credential storage for the access/refresh token pair.
//!
//! The client only ever talks to a `TokenStore`, so the backing area can be
//! swapped: process memory for tests and short-lived tools, the OS keychain
//! for the CLI so a session survives between invocations.

use std::sync::RwLock;

use keyring::Entry;
use zeroize::Zeroize;

use crate::error::TokenStoreError;

/// Default keychain service name.
pub const DEFAULT_SERVICE_NAME: &str = "com.assetdesk.cli";

const ACCESS_KEY: &str = "access_token";
const REFRESH_KEY: &str = "refresh_token";

/// Synchronous key-value area holding the current credentials.
///
/// No validation of token contents happens here. Writes are whole-value
/// replacements, so readers never observe a half-written token. Reads return
/// `Ok(None)` only when no token is stored; a backend that cannot be read
/// reports an error instead.
pub trait TokenStore: Send + Sync {
    fn access(&self) -> Result<Option<String>, TokenStoreError>;
    fn refresh(&self) -> Result<Option<String>, TokenStoreError>;
    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;

    fn has_session(&self) -> bool {
        matches!(self.access(), Ok(Some(_))) || matches!(self.refresh(), Ok(Some(_)))
    }
}

// ── Memory ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

impl Tokens {
    fn wipe(&mut self) {
        if let Some(ref mut t) = self.access {
            t.zeroize();
        }
        if let Some(ref mut t) = self.refresh {
            t.zeroize();
        }
        self.access = None;
        self.refresh = None;
    }
}

/// Process-local token store. Token strings are zeroed when cleared or replaced.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing pair.
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access: Some(access.to_string()),
                refresh: Some(refresh.to_string()),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self
            .tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .access
            .clone())
    }

    fn refresh(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self
            .tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .refresh
            .clone())
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), TokenStoreError> {
        let mut guard = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        guard.wipe();
        guard.access = Some(access.to_string());
        guard.refresh = Some(refresh.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .wipe();
        Ok(())
    }
}

// ── Keychain ──────────────────────────────────────────────────────────────────

/// OS keychain token store (macOS Keychain, Secret Service, Windows Credential Manager).
///
/// Each token lives in its own entry under the configured service name.
/// A missing entry reads as "no token". Any other keychain failure (locked
/// keychain, denied access) is returned to the caller so it is never
/// mistaken for a signed-out state.
pub struct KeychainTokenStore {
    service: String,
}

impl KeychainTokenStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, TokenStoreError> {
        Ok(Entry::new(&self.service, key)?)
    }

    fn read(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        match self.entry(key)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                log::warn!("Failed to read {} from keychain: {}", key, e);
                Err(TokenStoreError::from(e))
            }
        }
    }

    /// Idempotent: a missing entry counts as deleted.
    fn delete(&self, key: &str) -> Result<(), TokenStoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(TokenStoreError::from(e)),
        }
    }
}

impl Default for KeychainTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl TokenStore for KeychainTokenStore {
    fn access(&self) -> Result<Option<String>, TokenStoreError> {
        self.read(ACCESS_KEY)
    }

    fn refresh(&self) -> Result<Option<String>, TokenStoreError> {
        self.read(REFRESH_KEY)
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), TokenStoreError> {
        self.entry(ACCESS_KEY)?.set_password(access)?;
        self.entry(REFRESH_KEY)?.set_password(refresh)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.delete(ACCESS_KEY)?;
        self.delete(REFRESH_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.access().unwrap().is_none());
        assert!(store.refresh().unwrap().is_none());
        assert!(!store.has_session());

        store.set_tokens("a1", "r1").unwrap();
        assert_eq!(store.access().unwrap().as_deref(), Some("a1"));
        assert_eq!(store.refresh().unwrap().as_deref(), Some("r1"));
        assert!(store.has_session());
    }

    #[test]
    fn test_memory_store_replace_and_clear() {
        let store = MemoryTokenStore::with_tokens("a1", "r1");
        store.set_tokens("a2", "r2").unwrap();
        assert_eq!(store.access().unwrap().as_deref(), Some("a2"));
        assert_eq!(store.refresh().unwrap().as_deref(), Some("r2"));

        store.clear().unwrap();
        assert!(store.access().unwrap().is_none());
        assert!(store.refresh().unwrap().is_none());

        // Clearing twice is fine
        store.clear().unwrap();
    }
}

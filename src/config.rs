//! Runtime configuration from the environment.
//!
//! `.env` is loaded by the binary before `Config::from_env` runs, so values
//! there behave exactly like exported variables.

use std::time::Duration;

use crate::api::auth::DEFAULT_SERVICE_NAME;
use crate::cache::DEFAULT_STALE_AFTER;
use crate::error::ValidationError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Where credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// OS keychain (macOS Keychain, Secret Service, Windows Credential Manager).
    Keychain,
    /// Process memory only; credentials vanish on exit.
    Memory,
}

impl std::str::FromStr for TokenStoreKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keychain" | "keyring" => Ok(TokenStoreKind::Keychain),
            "memory" => Ok(TokenStoreKind::Memory),
            other => Err(ValidationError::new(
                "ASSETDESK_TOKEN_STORE",
                format!("Unknown token store '{}' (expected keychain or memory)", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub token_store: TokenStoreKind,
    pub keychain_service: String,
    pub cache_stale_after: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // API base URL: ASSETDESK_API_URL > API_BASE_URL > localhost default
        let api_base_url = lookup("ASSETDESK_API_URL")
            .or_else(|| lookup("API_BASE_URL"))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token_store = match lookup("ASSETDESK_TOKEN_STORE") {
            Some(v) => v.parse()?,
            None => TokenStoreKind::Keychain,
        };

        let keychain_service = lookup("ASSETDESK_KEYCHAIN_SERVICE")
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let cache_stale_after = match lookup("ASSETDESK_CACHE_TTL_SECS") {
            Some(v) => v.trim().parse().map(Duration::from_secs).map_err(|_| {
                ValidationError::new(
                    "ASSETDESK_CACHE_TTL_SECS",
                    format!("Expected a number of seconds, got '{}'", v),
                )
            })?,
            None => DEFAULT_STALE_AFTER,
        };

        Ok(Self {
            api_base_url,
            token_store,
            keychain_service,
            cache_stale_after,
        })
    }
}

//! Application state shared by CLI commands.
//!
//! Wires the token store, API client, library and uploader together from a
//! `Config`. The library sits behind an `Arc` so the uploader and commands
//! share one cache.

use std::sync::Arc;
use std::time::Duration;

use crate::api::auth::{KeychainTokenStore, MemoryTokenStore, TokenStore};
use crate::api::client::ApiClient;
use crate::api::transport::{ReqwestTransport, Transport};
use crate::cache::QueryCache;
use crate::config::{Config, TokenStoreKind};
use crate::library::Library;
use crate::upload::{Observer, Uploader};

/// Request timeout for API calls and object PUTs.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

pub struct AppState<T = ReqwestTransport> {
    pub library: Arc<Library<T>>,
    pub uploader: Uploader<T>,
}

impl AppState<ReqwestTransport> {
    /// Build state talking to the configured backend over HTTPS.
    pub fn new(config: &Config, observer: Option<Observer>) -> Self {
        let tokens: Arc<dyn TokenStore> = match config.token_store {
            TokenStoreKind::Keychain => Arc::new(KeychainTokenStore::new(&config.keychain_service)),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        };
        log::debug!(
            "Using {:?} token store, API at {}",
            config.token_store,
            config.api_base_url
        );
        Self::with_transport(
            ReqwestTransport::new(HTTP_TIMEOUT),
            config,
            tokens,
            observer,
        )
    }
}

impl<T: Transport> AppState<T> {
    pub fn with_transport(
        transport: T,
        config: &Config,
        tokens: Arc<dyn TokenStore>,
        observer: Option<Observer>,
    ) -> Self {
        let client = Arc::new(ApiClient::new(transport, &config.api_base_url, tokens));
        let library = Arc::new(Library::new(
            client,
            QueryCache::new(config.cache_stale_after),
        ));
        let mut uploader = Uploader::new(library.clone());
        if let Some(observer) = observer {
            uploader = uploader.with_observer(observer);
        }
        Self { library, uploader }
    }
}

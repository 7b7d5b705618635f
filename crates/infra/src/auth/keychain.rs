//! Keychain-backed [`AuthContext`]
//!
//! Reads the bearer token and user id from the platform keychain (Keychain
//! Access on macOS) via `keyring`, and caches the identity until the endpoint
//! rejects it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use jiffy_core::AuthContext;
use jiffy_domain::constants::{KEYCHAIN_AUTH_TOKEN_KEY, KEYCHAIN_SERVICE, KEYCHAIN_USER_ID_KEY};
use jiffy_domain::Identity;
use keyring::Entry;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),
}

/// Read-only secret lookup
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when no entry exists for `key`.
    fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError>;
}

/// [`SecretStore`] over the platform keychain
pub struct KeyringStore {
    service_name: String,
}

impl KeyringStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE)
    }
}

impl SecretStore for KeyringStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = Entry::new(&self.service_name, key).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to open entry for {key}: {e}"))
        })?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to retrieve secret for {key}: {e}"
            ))),
        }
    }
}

/// Called when delivery reports rejected credentials
pub type RefreshHook = Arc<dyn Fn() + Send + Sync>;

pub struct KeychainAuthContext {
    store: Arc<dyn SecretStore>,
    cached: RwLock<Option<Identity>>,
    needs_reauth: AtomicBool,
    refresh_hook: Option<RefreshHook>,
}

impl KeychainAuthContext {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
            needs_reauth: AtomicBool::new(false),
            refresh_hook: None,
        }
    }

    /// Read from the default keychain service.
    pub fn from_keychain() -> Self {
        Self::new(Arc::new(KeyringStore::default()))
    }

    #[must_use]
    pub fn with_refresh_hook(mut self, hook: RefreshHook) -> Self {
        self.refresh_hook = Some(hook);
        self
    }

    /// True after a rejection until credentials are read successfully again.
    pub fn needs_reauth(&self) -> bool {
        self.needs_reauth.load(Ordering::Acquire)
    }

    /// Keychain reads block, so they run off the async workers.
    async fn load(&self) -> Option<Identity> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || load_identity(store.as_ref())).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "Keychain read task failed");
                None
            }
        }
    }
}

fn read_secret(store: &dyn SecretStore, key: &str) -> Option<String> {
    match store.get_secret(key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(err) => {
            warn!(error = %err, key = %key, "Keychain read failed");
            None
        }
    }
}

fn load_identity(store: &dyn SecretStore) -> Option<Identity> {
    let token = read_secret(store, KEYCHAIN_AUTH_TOKEN_KEY)?;
    let user_id = read_secret(store, KEYCHAIN_USER_ID_KEY)?;
    Some(Identity::new(token, user_id))
}

#[async_trait]
impl AuthContext for KeychainAuthContext {
    async fn current_identity(&self) -> Option<Identity> {
        if let Some(identity) = self.cached.read().await.as_ref() {
            return Some(identity.clone());
        }

        let mut cached = self.cached.write().await;
        if cached.is_none() {
            *cached = self.load().await;
            if let Some(identity) = cached.as_ref() {
                self.needs_reauth.store(false, Ordering::Release);
                info!(user_id = %identity.user_id, "Loaded identity from keychain");
            } else {
                debug!("No identity in keychain");
            }
        }
        cached.clone()
    }

    async fn on_auth_failure(&self) {
        self.cached.write().await.take();
        self.needs_reauth.store(true, Ordering::Release);
        info!("Credentials rejected; re-authentication required");
        if let Some(hook) = &self.refresh_hook {
            hook();
        }
    }
}

//! Process-wide credential context
//!
//! Built once at startup and shared by reference with every component that
//! performs authenticated calls.

use std::sync::Arc;

use crate::config::CredentialConfig;
use crate::error::CredentialError;
use crate::jwt::JwtIssuer;
use crate::secrets::RemoteSecretStore;
use crate::signing::RequestSigner;
use crate::watcher::{CredentialWatcher, WatchHandle};

/// Everything needed to authenticate outbound requests
#[derive(Debug)]
pub struct SecretsContext {
    config: CredentialConfig,
    watcher: Arc<CredentialWatcher>,
    store: Arc<RemoteSecretStore>,
    issuer: JwtIssuer,
    signer: RequestSigner,
    _watch: WatchHandle,
}

impl SecretsContext {
    /// Load configuration from the environment and start up.
    ///
    /// # Errors
    ///
    /// See [`from_config`](Self::from_config).
    pub fn load() -> Result<Self, CredentialError> {
        Self::from_config(CredentialConfig::load()?)
    }

    /// Validate `config`, read the credential files and start watching them.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`CredentialError::Config`] for invalid configuration,
    /// [`CredentialError::Watch`] when either credential file cannot be read
    /// or watched.
    pub fn from_config(config: CredentialConfig) -> Result<Self, CredentialError> {
        config.validate()?;

        let watcher = Arc::new(CredentialWatcher::initialize(
            config.secrets.ca_cert_path.clone(),
            config.secrets.api_token_path.clone(),
        )?);
        let watch = watcher.watch()?;

        let store = Arc::new(RemoteSecretStore::from_config(
            &config.secrets,
            Arc::clone(&watcher),
        ));
        let issuer = JwtIssuer::from_config(&config, Arc::clone(&store));
        let signer = RequestSigner::from_config(&config.secrets, Arc::clone(&store));

        tracing::info!(
            namespace = %config.secrets.namespace,
            secret = %config.secrets.name,
            remote_url = %config.secrets.remote_url,
            "credential context ready"
        );

        Ok(Self {
            config,
            watcher,
            store,
            issuer,
            signer,
            _watch: watch,
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    /// CA and token snapshots
    pub fn watcher(&self) -> &Arc<CredentialWatcher> {
        &self.watcher
    }

    /// Secret store
    pub fn store(&self) -> &Arc<RemoteSecretStore> {
        &self.store
    }

    /// Token issuer
    pub fn issuer(&self) -> &JwtIssuer {
        &self.issuer
    }

    /// HMAC request signer
    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }
}

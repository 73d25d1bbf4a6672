use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobserv_response::{ResponseError, classify};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::decode::{Base64FieldsDecoder, SecretDecoder};
use super::transport::{ReqwestTransport, SecretRequest, SecretTransport};
use super::SecretBundle;
use crate::cache::{CacheStats, CacheStore, TtlCache};
use crate::config::SecretsConfig;
use crate::error::SecretsError;
use crate::watcher::CredentialWatcher;

type FetchGate = Arc<tokio::sync::Mutex<()>>;

/// Cached, authenticated access to the remote secret service.
///
/// A bundle is served from cache until its `expires_at`; after that the next
/// [`retrieve`](Self::retrieve) fetches it again. Concurrent callers asking
/// for the same cold key share one fetch. A failed fetch is returned as an
/// error and is never papered over with an expired bundle.
pub struct RemoteSecretStore {
    watcher: Arc<CredentialWatcher>,
    transport: Arc<dyn SecretTransport>,
    decoder: Arc<dyn SecretDecoder>,
    cache: TtlCache<Arc<SecretBundle>>,
    remote_url: String,
    server_path: String,
    cache_prefix: String,
    ttl: Duration,
    in_flight: parking_lot::Mutex<HashMap<String, FetchGate>>,
}

impl RemoteSecretStore {
    /// Start building a store that authenticates with `watcher`'s credentials
    pub fn builder(
        watcher: Arc<CredentialWatcher>,
        remote_url: impl Into<String>,
    ) -> RemoteSecretStoreBuilder {
        RemoteSecretStoreBuilder::new(watcher, remote_url.into())
    }

    /// Store configured from [`SecretsConfig`] with the `reqwest` transport
    pub fn from_config(config: &SecretsConfig, watcher: Arc<CredentialWatcher>) -> Self {
        Self::builder(watcher, config.remote_url.clone())
            .server_path(config.server_path.clone())
            .cache_prefix(config.cache_prefix.clone())
            .ttl(config.ttl())
            .decoder(config.decode.decoder())
            .transport(Arc::new(ReqwestTransport::new(config.timeout())))
            .cache(TtlCache::in_memory(config.cache_capacity))
            .build()
    }

    /// Cache key for a secret
    pub fn cache_key(&self, secret_name: &str, namespace: &str) -> String {
        format!("{}:{namespace}:{secret_name}", self.cache_prefix)
    }

    /// URL a secret is fetched from
    pub fn secret_url(&self, secret_name: &str, namespace: &str) -> String {
        let base = self.remote_url.trim_end_matches('/');
        let prefix = self.server_path.trim_matches('/');
        if prefix.is_empty() {
            format!("{base}/{namespace}/secrets/{secret_name}/")
        } else {
            format!("{base}/{prefix}/{namespace}/secrets/{secret_name}/")
        }
    }

    /// Latest bundle for `secret_name` in `namespace`.
    ///
    /// # Errors
    ///
    /// [`SecretsError::Fetch`] when the request fails or the service answers
    /// with a failure status, [`SecretsError::Decode`] when the payload does
    /// not match the decode policy.
    pub async fn retrieve(
        &self,
        secret_name: &str,
        namespace: &str,
    ) -> Result<Arc<SecretBundle>, SecretsError> {
        let key = self.cache_key(secret_name, namespace);
        if let Some(bundle) = self.cache.fresh(&key).await {
            tracing::trace!(namespace, secret = secret_name, "secret served from cache");
            return Ok(bundle);
        }

        let gate = self.gate(&key);
        let result = {
            let _guard = gate.lock().await;
            // Another caller may have filled the cache while we waited.
            match self.cache.fresh(&key).await {
                Some(bundle) => Ok(bundle),
                None => match self.fetch(secret_name, namespace).await {
                    Ok(bundle) => {
                        let bundle = Arc::new(bundle);
                        self.cache.store(&key, Arc::clone(&bundle), self.ttl).await;
                        Ok(bundle)
                    }
                    Err(err) => Err(err),
                },
            }
        };
        self.release(&key, &gate);
        result
    }

    /// One field of a bundle, `None` if the bundle has no such field
    ///
    /// # Errors
    ///
    /// Same as [`retrieve`](Self::retrieve).
    pub async fn field(
        &self,
        secret_name: &str,
        namespace: &str,
        field: &str,
    ) -> Result<Option<SecretString>, SecretsError> {
        let bundle = self.retrieve(secret_name, namespace).await?;
        Ok(bundle.get(field).cloned())
    }

    /// Drop the cached bundle so the next call fetches again
    pub async fn invalidate(&self, secret_name: &str, namespace: &str) {
        self.cache.evict(&self.cache_key(secret_name, namespace)).await;
    }

    /// Secret cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn fetch(
        &self,
        secret_name: &str,
        namespace: &str,
    ) -> Result<SecretBundle, SecretsError> {
        let fetch_err = |source: ResponseError| SecretsError::Fetch {
            namespace: namespace.to_owned(),
            name: secret_name.to_owned(),
            source,
        };

        let token = self.watcher.token();
        let request = SecretRequest {
            url: self.secret_url(secret_name, namespace),
            bearer_token: SecretString::from(token.expose_secret().trim().to_owned()),
            ca_certificate: self.watcher.ca(),
        };
        tracing::debug!(namespace, secret = secret_name, url = %request.url, "fetching secret");

        let response = classify(self.transport.get(&request)).await.map_err(|err| {
            tracing::warn!(namespace, secret = secret_name, error = %err, "secret fetch failed");
            fetch_err(err)
        })?;
        let raw: Value = response.deserialize().await.map_err(fetch_err)?;
        let fields = self
            .decoder
            .decode(&raw)
            .map_err(|source| SecretsError::Decode {
                namespace: namespace.to_owned(),
                name: secret_name.to_owned(),
                source,
            })?;

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        Ok(SecretBundle {
            namespace: namespace.to_owned(),
            name: secret_name.to_owned(),
            fields,
            expires_at: Utc::now()
                .checked_add_signed(ttl)
                .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC),
        })
    }

    fn gate(&self, key: &str) -> FetchGate {
        Arc::clone(self.in_flight.lock().entry(key.to_owned()).or_default())
    }

    fn release(&self, key: &str, gate: &FetchGate) {
        let mut in_flight = self.in_flight.lock();
        // Only the map and this caller still hold it: nobody else is waiting.
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(key);
        }
    }
}

impl fmt::Debug for RemoteSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSecretStore")
            .field("remote_url", &self.remote_url)
            .field("server_path", &self.server_path)
            .field("cache_prefix", &self.cache_prefix)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RemoteSecretStore`]
#[must_use = "builder methods must be chained or built"]
pub struct RemoteSecretStoreBuilder {
    watcher: Arc<CredentialWatcher>,
    remote_url: String,
    server_path: String,
    cache_prefix: String,
    ttl: Duration,
    decoder: Arc<dyn SecretDecoder>,
    transport: Option<Arc<dyn SecretTransport>>,
    cache: Option<TtlCache<Arc<SecretBundle>>>,
}

impl RemoteSecretStoreBuilder {
    fn new(watcher: Arc<CredentialWatcher>, remote_url: String) -> Self {
        Self {
            watcher,
            remote_url,
            server_path: String::new(),
            cache_prefix: "pre".into(),
            ttl: Duration::from_secs(60),
            decoder: Arc::new(Base64FieldsDecoder),
            transport: None,
            cache: None,
        }
    }

    /// Path between the base URL and `{namespace}/secrets/...`
    pub fn server_path(mut self, server_path: impl Into<String>) -> Self {
        self.server_path = server_path.into();
        self
    }

    /// Cache key prefix
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// How long a fetched bundle is served from cache
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Payload decoder
    pub fn decoder(mut self, decoder: Arc<dyn SecretDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// HTTP transport
    pub fn transport(mut self, transport: Arc<dyn SecretTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Bundle cache
    pub fn cache(mut self, cache: TtlCache<Arc<SecretBundle>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Bundle cache over a custom backend
    pub fn cache_store(self, store: Arc<dyn CacheStore<Arc<SecretBundle>>>) -> Self {
        self.cache(TtlCache::new(store))
    }

    /// Finish building
    pub fn build(self) -> RemoteSecretStore {
        RemoteSecretStore {
            watcher: self.watcher,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::default())),
            decoder: self.decoder,
            cache: self.cache.unwrap_or_else(|| TtlCache::in_memory(10_000)),
            remote_url: self.remote_url,
            server_path: self.server_path,
            cache_prefix: self.cache_prefix,
            ttl: self.ttl,
            in_flight: parking_lot::Mutex::new(HashMap::new()),
        }
    }
}

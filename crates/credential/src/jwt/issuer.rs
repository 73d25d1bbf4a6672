use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use super::claims::{Claims, UserIdentity};
use super::rotation::{KeyNames, SigningKeys};
use super::signer::{Hs256Signer, TokenSigner, token_expiry};
use crate::cache::{CacheStats, CacheStore, TtlCache};
use crate::config::CredentialConfig;
use crate::secrets::RemoteSecretStore;

/// Scheme used in the `Authorization` header for issued tokens
pub const AUTHORIZATION_SCHEME: &str = "JWT-Bearer";

/// A signed token and the instant it stops being reused
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// Encoded JWT
    pub token: SecretString,
    /// The token's `exp`, which is also when its cache entry expires
    pub expires_at: DateTime<Utc>,
}

/// Issues short-lived tokens signed with the rotating key pair held in a
/// secret bundle.
///
/// Issuance is best-effort: every failure (secret service unreachable, key
/// material missing, encoding error) is logged and yields `None`, letting the
/// caller fall back to an unauthenticated request.
pub struct JwtIssuer {
    store: Arc<RemoteSecretStore>,
    signer: Arc<dyn TokenSigner>,
    cache: TtlCache<SignedToken>,
    secret_name: String,
    namespace: String,
    key_names: KeyNames,
    ttl: Duration,
}

impl JwtIssuer {
    /// Start building an issuer reading keys from `secret_name` in `namespace`
    pub fn builder(
        store: Arc<RemoteSecretStore>,
        secret_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> JwtIssuerBuilder {
        JwtIssuerBuilder {
            store,
            secret_name: secret_name.into(),
            namespace: namespace.into(),
            key_names: KeyNames {
                valid_at: String::new(),
                current: String::new(),
                previous: String::new(),
            },
            ttl: Duration::from_secs(60),
            signer: Arc::new(Hs256Signer),
            cache: None,
        }
    }

    /// Issuer configured from [`CredentialConfig`]
    pub fn from_config(config: &CredentialConfig, store: Arc<RemoteSecretStore>) -> Self {
        Self::builder(
            store,
            config.secrets.name.clone(),
            config.secrets.namespace.clone(),
        )
        .key_names(KeyNames::from(&config.jwt))
        .ttl(config.jwt.ttl())
        .cache(TtlCache::in_memory(config.secrets.cache_capacity))
        .build()
    }

    /// Cache key for a token
    pub fn cache_key(&self, subject_id: &str, claims_hash: &str) -> String {
        format!(
            "{}:{}:{subject_id}:{claims_hash}",
            self.secret_name, self.namespace
        )
    }

    /// Token asserting `claims` for `subject_id`.
    ///
    /// Identical requests within the token lifetime get the same token back
    /// without signing again.
    pub async fn issue(&self, claims: &Claims, subject_id: &str) -> Option<String> {
        let claims_hash = match claims.content_hash() {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!(
                    subject = subject_id,
                    error = %err,
                    "cannot hash claims, no token issued"
                );
                return None;
            }
        };
        let key = self.cache_key(subject_id, &claims_hash);

        if let Some(cached) = self.cache.fresh(&key).await {
            tracing::trace!(subject = subject_id, "token served from cache");
            return Some(cached.token.expose_secret().to_owned());
        }

        let bundle = match self.store.retrieve(&self.secret_name, &self.namespace).await {
            Ok(bundle) => bundle,
            Err(err) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    secret = %self.secret_name,
                    error = %err,
                    "signing secret unavailable, no token issued"
                );
                return None;
            }
        };

        let now = Utc::now();
        let signed = SigningKeys::select(&bundle, &self.key_names, now).and_then(|signing_key| {
            tracing::debug!(subject = subject_id, slot = ?signing_key.slot, "signing token");
            self.signer.sign(claims, &signing_key, self.ttl, now)
        });
        let token = match signed {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(subject = subject_id, error = %err, "token signing failed");
                return None;
            }
        };

        let expires_at = DateTime::from_timestamp(token_expiry(now, self.ttl), 0)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let signed = SignedToken {
            token: SecretString::from(token.clone()),
            expires_at,
        };
        self.cache.store_until(&key, signed, expires_at).await;

        Some(token)
    }

    /// `Authorization` header value carrying a token for `claims`
    pub async fn authorization_header(&self, claims: &Claims, subject_id: &str) -> Option<String> {
        self.issue(claims, subject_id)
            .await
            .map(|token| format!("{AUTHORIZATION_SCHEME} {token}"))
    }

    /// `Authorization` header value for a user, `None` when no token could be issued
    pub async fn authorize_user(&self, user: &UserIdentity) -> Option<String> {
        self.authorization_header(&Claims::for_user(user), &user.id)
            .await
    }

    /// Token cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("secret_name", &self.secret_name)
            .field("namespace", &self.namespace)
            .field("key_names", &self.key_names)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Builder for [`JwtIssuer`]
#[must_use = "builder methods must be chained or built"]
pub struct JwtIssuerBuilder {
    store: Arc<RemoteSecretStore>,
    secret_name: String,
    namespace: String,
    key_names: KeyNames,
    ttl: Duration,
    signer: Arc<dyn TokenSigner>,
    cache: Option<TtlCache<SignedToken>>,
}

impl JwtIssuerBuilder {
    /// Bundle fields holding the key pair and its activation time
    pub fn key_names(mut self, key_names: KeyNames) -> Self {
        self.key_names = key_names;
        self
    }

    /// Token lifetime
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Signer
    pub fn signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Token cache
    pub fn cache(mut self, cache: TtlCache<SignedToken>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Token cache over a custom backend
    pub fn cache_store(self, store: Arc<dyn CacheStore<SignedToken>>) -> Self {
        self.cache(TtlCache::new(store))
    }

    /// Finish building
    pub fn build(self) -> JwtIssuer {
        JwtIssuer {
            store: self.store,
            signer: self.signer,
            cache: self.cache.unwrap_or_else(|| TtlCache::in_memory(10_000)),
            secret_name: self.secret_name,
            namespace: self.namespace,
            key_names: self.key_names,
            ttl: self.ttl,
        }
    }
}

//! HMAC request signing with the shared key from the secret bundle

use std::sync::Arc;

use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;

use crate::config::SecretsConfig;
use crate::error::SecretsError;
use crate::secrets::RemoteSecretStore;

type HmacSha256 = Hmac<Sha256>;

/// Signs payloads with the bundle field named by `sign_key`
#[derive(Debug)]
pub struct RequestSigner {
    store: Arc<RemoteSecretStore>,
    secret_name: String,
    namespace: String,
    sign_key: String,
}

impl RequestSigner {
    /// Signer reading `sign_key` from `secret_name` in `namespace`
    pub fn new(
        store: Arc<RemoteSecretStore>,
        secret_name: impl Into<String>,
        namespace: impl Into<String>,
        sign_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            secret_name: secret_name.into(),
            namespace: namespace.into(),
            sign_key: sign_key.into(),
        }
    }

    /// Signer configured from [`SecretsConfig`]
    pub fn from_config(config: &SecretsConfig, store: Arc<RemoteSecretStore>) -> Self {
        Self::new(
            store,
            config.name.clone(),
            config.namespace.clone(),
            config.sign_key.clone(),
        )
    }

    /// Hex HMAC-SHA256 of `data`, `None` if the bundle has no signing key.
    ///
    /// # Errors
    ///
    /// Propagates a failure to retrieve the bundle.
    pub async fn hmac(&self, data: impl AsRef<[u8]>) -> Result<Option<String>, SecretsError> {
        let Some(key) = self
            .store
            .field(&self.secret_name, &self.namespace, &self.sign_key)
            .await?
            .filter(|key| !key.expose_secret().is_empty())
        else {
            tracing::debug!(field = %self.sign_key, "no signing key in bundle");
            return Ok(None);
        };
        Ok(sign(key.expose_secret().as_bytes(), data.as_ref()))
    }
}

/// Hex HMAC-SHA256 of `data` under `key`
pub fn sign(key: &[u8], data: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(data);
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign(b"Jefe", b"what do ya want for nothing?").as_deref(),
            Some("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
        );
    }
}

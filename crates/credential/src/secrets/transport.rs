use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use jobserv_response::{RawResponse, ResponseError};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

/// One authenticated GET against the secret service
#[derive(Debug, Clone)]
pub struct SecretRequest {
    /// Absolute URL
    pub url: String,
    /// Bearer token, already trimmed
    pub bearer_token: SecretString,
    /// PEM of the CA the server certificate must chain to
    pub ca_certificate: SecretString,
}

/// Performs secret service requests
///
/// The returned exchange is unclassified; the caller runs it through
/// [`jobserv_response::classify`].
#[async_trait]
pub trait SecretTransport: Send + Sync {
    /// Issue the request
    async fn get(&self, request: &SecretRequest) -> Result<RawResponse, ResponseError>;
}

/// `reqwest` transport trusting only the request's CA for `https` URLs
///
/// The platform roots are never consulted once a CA is given. The client is
/// rebuilt only when the CA certificate changes.
pub struct ReqwestTransport {
    timeout: Duration,
    client: Mutex<Option<(SecretString, reqwest::Client)>>,
}

impl ReqwestTransport {
    /// Transport with the given per-request timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: Mutex::new(None),
        }
    }

    fn client_for(&self, request: &SecretRequest) -> Result<reqwest::Client, ResponseError> {
        let ca = if request.url.starts_with("https://") {
            request.ca_certificate.expose_secret()
        } else {
            ""
        };

        let mut cached = self.client.lock();
        if let Some((cached_ca, client)) = cached.as_ref()
            && cached_ca.expose_secret() == ca
        {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if !ca.is_empty() {
            builder = builder.tls_certs_only(trust_roots(ca)?);
        }
        let client = builder.build().map_err(ResponseError::transport)?;
        tracing::debug!(ca_only = !ca.is_empty(), "built secret service client");

        *cached = Some((SecretString::from(ca.to_owned()), client.clone()));
        Ok(client)
    }
}

/// Every certificate in a PEM bundle, used as the complete trust store
fn trust_roots(pem: &str) -> Result<Vec<reqwest::Certificate>, ResponseError> {
    reqwest::Certificate::from_pem_bundle(pem.as_bytes()).map_err(ResponseError::transport)
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretTransport for ReqwestTransport {
    async fn get(&self, request: &SecretRequest) -> Result<RawResponse, ResponseError> {
        let client = self.client_for(request)?;
        let response = client
            .get(&request.url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", request.bearer_token.expose_secret()),
            )
            .send()
            .await?;
        Ok(response.into())
    }
}

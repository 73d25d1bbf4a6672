//! Secret bundles fetched from the remote secret service

mod decode;
mod store;
mod transport;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

pub use decode::{Base64FieldsDecoder, PassthroughDecoder, SecretDecoder, SecretFields};
pub use store::{RemoteSecretStore, RemoteSecretStoreBuilder};
pub use transport::{ReqwestTransport, SecretRequest, SecretTransport};

/// A decoded secret with the instant its cached copy stops being served
#[derive(Debug, Clone)]
pub struct SecretBundle {
    /// Namespace the secret lives in
    pub namespace: String,
    /// Secret name
    pub name: String,
    /// Decoded fields
    pub fields: SecretFields,
    /// Cache expiry
    pub expires_at: DateTime<Utc>,
}

impl SecretBundle {
    /// Value of one field
    pub fn get(&self, field: &str) -> Option<&SecretString> {
        self.fields.get(field)
    }

    /// `true` if the bundle has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

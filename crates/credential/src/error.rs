//! Error types for credential operations
//!
//! - [`CredentialError`]: top-level error returned by [`SecretsContext`](crate::SecretsContext)
//! - [`WatchError`]: reading or watching the CA / token files
//! - [`CacheError`]: cache backend failures (always recovered locally)
//! - [`DecodeError`]: secret payload did not match the decode policy
//! - [`SecretsError`]: fetching a secret bundle from the secret service
//! - [`SigningError`]: producing a signed token

use std::path::PathBuf;

use jobserv_response::{DomainError, ResponseError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::watcher::CredentialKind;

/// Top-level credential error
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CA or token file could not be loaded or watched
    #[error("Credential watch error: {0}")]
    Watch(#[from] WatchError),

    /// Secret service failure
    #[error("Secret store error: {0}")]
    Secrets(#[from] SecretsError),
}

/// Errors reading or watching the credential files
#[derive(Debug, Error)]
pub enum WatchError {
    /// Startup read failed; the process cannot authenticate
    #[error("Failed to load {kind} from '{}': {source}", path.display())]
    Initial {
        /// Which credential
        kind: CredentialKind,
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Re-read after a change notification failed
    #[error("Failed to reload {kind} from '{}': {source}", path.display())]
    Refresh {
        /// Which credential
        kind: CredentialKind,
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file system watcher could not be registered
    #[error("Failed to watch '{}': {source}", path.display())]
    Notify {
        /// Watched directory
        path: PathBuf,
        /// Underlying notify error
        #[source]
        source: notify::Error,
    },
}

/// Cache backend failure
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unreachable or rejected the operation
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Stored value could not be (de)serialized
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Secret payload did not match the decode policy
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a JSON object
    #[error("Secret payload is not a JSON object")]
    NotAnObject,

    /// Base64 policy requires a `data` object
    #[error("Secret payload has no 'data' object")]
    MissingData,

    /// Field value is not a string
    #[error("Secret field '{field}' is not a string")]
    NotAString {
        /// Field name
        field: String,
    },

    /// Field value is not valid base64
    #[error("Secret field '{field}' is not valid base64: {source}")]
    Base64 {
        /// Field name
        field: String,
        /// Underlying decode error
        #[source]
        source: base64::DecodeError,
    },

    /// Decoded field is not UTF-8
    #[error("Secret field '{field}' is not valid UTF-8")]
    Utf8 {
        /// Field name
        field: String,
    },
}

/// Errors fetching a secret bundle
#[derive(Debug, Error)]
pub enum SecretsError {
    /// The secret service request failed or returned a failure status
    #[error("Failed to fetch secret '{namespace}/{name}': {source}")]
    Fetch {
        /// Secret namespace
        namespace: String,
        /// Secret name
        name: String,
        /// Classified response error
        #[source]
        source: ResponseError,
    },

    /// The payload did not match the decode policy
    #[error("Failed to decode secret '{namespace}/{name}': {source}")]
    Decode {
        /// Secret namespace
        namespace: String,
        /// Secret name
        name: String,
        /// Underlying decode error
        #[source]
        source: DecodeError,
    },
}

impl SecretsError {
    /// Domain error from the secret service, when the fetch completed with a failure status.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Fetch { source, .. } => source.domain(),
            Self::Decode { .. } => None,
        }
    }
}

/// Token signing failure
#[derive(Debug, Error)]
pub enum SigningError {
    /// Key material is empty
    #[error("Signing key is empty")]
    EmptyKey,

    /// The bundle has no usable value for the selected key field
    #[error("Signing key field '{field}' is missing or empty")]
    MissingKey {
        /// Bundle field name
        field: String,
    },

    /// Encoder rejected the claims or key
    #[error("Token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

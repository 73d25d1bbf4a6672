//! Credentials for authenticated calls to `JobServ` backend services
//!
//! - [`CredentialWatcher`] keeps the CA certificate and bearer token read from
//!   disk fresh as the files are rotated.
//! - [`RemoteSecretStore`] fetches secret bundles from the secret service,
//!   authenticated with those credentials, and caches them for a TTL.
//! - [`JwtIssuer`] signs short-lived identity tokens with the rotating key
//!   pair held in a secret bundle.
//! - [`RequestSigner`] produces HMAC signatures with a shared bundle key.
//!
//! [`SecretsContext`] wires all of them from a [`CredentialConfig`].
//!
//! ```rust,no_run
//! use jobserv_credential::prelude::*;
//!
//! # async fn example() -> Result<(), CredentialError> {
//! let ctx = SecretsContext::load()?;
//!
//! let user: UserIdentity = serde_json::from_str(r#"{"_id":"5f1e","orgs":[{"name":"Acme"}]}"#)
//!     .expect("valid user");
//! if let Some(header) = ctx.issuer().authorize_user(&user).await {
//!     println!("Authorization: {header}");
//! }
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
mod context;
pub mod error;
pub mod jwt;
pub mod secrets;
pub mod signing;
pub mod watcher;

pub use cache::{CacheEntry, CacheStats, CacheStore, MemoryCache, TtlCache};
pub use config::{CredentialConfig, DecodePolicy, JwtConfig, SecretsConfig};
pub use context::SecretsContext;
pub use error::{
    CacheError, CredentialError, DecodeError, SecretsError, SigningError, WatchError,
};
pub use jwt::{Claims, JwtIssuer, KeyNames, SignedToken, TokenSigner, UserIdentity};
pub use secrets::{RemoteSecretStore, SecretBundle, SecretDecoder, SecretTransport};
pub use signing::RequestSigner;
pub use watcher::{CredentialKind, CredentialSnapshot, CredentialWatcher, WatchHandle};

pub use secrecy::{ExposeSecret, SecretString};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::config::{ConfigError, CredentialConfig};
    pub use crate::error::{CredentialError, SecretsError};
    pub use crate::jwt::{Claims, JwtIssuer, UserIdentity};
    pub use crate::secrets::{RemoteSecretStore, SecretBundle};
    pub use crate::signing::RequestSigner;
    pub use crate::watcher::{CredentialKind, CredentialWatcher};
    pub use crate::SecretsContext;
    pub use secrecy::{ExposeSecret, SecretString};
}

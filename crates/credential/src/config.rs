//! Configuration for the credential subsystem
//!
//! Values come from an optional TOML file named by `FIO_CONFIG_FILE`, then
//! from `FIO_SCRT_*` / `FIO_JWT_*` environment variables, which win.
//!
//! ```rust,no_run
//! use jobserv_credential::CredentialConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CredentialConfig::load()?;
//! config.validate()?;
//! println!("secrets TTL: {:?}", config.secrets.ttl());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::{Base64FieldsDecoder, PassthroughDecoder, SecretDecoder};

/// Environment variable naming the optional TOML config file
pub const CONFIG_FILE_ENV: &str = "FIO_CONFIG_FILE";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    /// Config file could not be read
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How secret payload fields are decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Top-level fields are used as-is
    Passthrough,
    /// Every field under `data` is base64-decoded
    #[default]
    Base64,
}

impl DecodePolicy {
    /// Decoder implementing this policy
    pub fn decoder(self) -> Arc<dyn SecretDecoder> {
        match self {
            Self::Passthrough => Arc::new(PassthroughDecoder),
            Self::Base64 => Arc::new(Base64FieldsDecoder),
        }
    }
}

impl std::str::FromStr for DecodePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "passthrough" | "identity" => Ok(Self::Passthrough),
            "base64" => Ok(Self::Base64),
            other => Err(ConfigError::InvalidValue {
                field: "secrets.decode".into(),
                reason: format!("expected 'passthrough' or 'base64', got '{other}'"),
            }),
        }
    }
}

/// Complete credential configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Secret service and credential file settings
    pub secrets: SecretsConfig,
    /// Token issuance settings
    pub jwt: JwtConfig,
}

/// Secret service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// PEM file of the CA that signs the secret service certificate
    pub ca_cert_path: PathBuf,
    /// File holding the bearer token for the secret service
    pub api_token_path: PathBuf,
    /// Base URL of the secret service (`https://host:port`)
    pub remote_url: String,
    /// Path prefix below `remote_url` (e.g. `api/v1/namespaces`)
    pub server_path: String,
    /// Prefix for every secret cache key
    pub cache_prefix: String,
    /// Secret holding the signing material
    pub name: String,
    /// Namespace of `name`
    pub namespace: String,
    /// Field of the bundle used as HMAC key
    pub sign_key: String,
    /// Secret cache TTL in seconds
    pub expires_in: u64,
    /// Payload decode policy
    pub decode: DecodePolicy,
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Maximum number of cached entries per cache
    pub cache_capacity: u64,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            ca_cert_path: PathBuf::new(),
            api_token_path: PathBuf::new(),
            remote_url: String::new(),
            server_path: String::new(),
            cache_prefix: "pre".into(),
            name: String::new(),
            namespace: String::new(),
            sign_key: String::new(),
            expires_in: 60,
            decode: DecodePolicy::default(),
            request_timeout: 10,
            cache_capacity: 10_000,
        }
    }
}

impl SecretsConfig {
    /// Secret cache TTL
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    /// Secret service request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Token issuance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Bundle field holding the epoch-seconds activation time of `key`
    pub valid_at_key: String,
    /// Bundle field holding the current signing key
    pub key: String,
    /// Bundle field holding the previous signing key
    pub prev_key: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            valid_at_key: String::new(),
            key: String::new(),
            prev_key: String::new(),
            expires_in: 60,
        }
    }
}

impl JwtConfig {
    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

impl CredentialConfig {
    /// Load from `FIO_CONFIG_FILE` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_ENV).filter(|path| !path.is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from environment-style variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = &mut self.secrets;
        if let Some(v) = lookup("FIO_SCRT_CA_CERT_PATH") {
            s.ca_cert_path = v.into();
        }
        if let Some(v) = lookup("FIO_SCRT_API_TOKEN_PATH") {
            s.api_token_path = v.into();
        }
        if let Some(v) = lookup("FIO_SCRT_SERVER_PATH") {
            s.server_path = v;
        }
        if let Some(v) = lookup("FIO_SCRT_CACHE_PREFIX") {
            s.cache_prefix = v;
        }
        if let Some(v) = lookup("FIO_SCRT_NAME") {
            s.name = v;
        }
        if let Some(v) = lookup("FIO_SCRT_NAMESPACE") {
            s.namespace = v;
        }
        if let Some(v) = lookup("FIO_SCRT_SIGN_KEY") {
            s.sign_key = v;
        }
        if let Some(v) = lookup("FIO_SCRT_REMOTE_URL") {
            s.remote_url = v;
        }
        if let Some(v) = lookup("FIO_SCRT_EXPIRES_IN") {
            s.expires_in = parse_seconds("secrets.expires_in", &v)?;
        }
        if let Some(v) = lookup("FIO_SCRT_DECODE") {
            s.decode = v.parse()?;
        }
        if let Some(v) = lookup("FIO_SCRT_REQUEST_TIMEOUT") {
            s.request_timeout = parse_seconds("secrets.request_timeout", &v)?;
        }

        let j = &mut self.jwt;
        if let Some(v) = lookup("FIO_JWT_VALID_AT_KEY") {
            j.valid_at_key = v;
        }
        if let Some(v) = lookup("FIO_JWT_KEY") {
            j.key = v;
        }
        if let Some(v) = lookup("FIO_JWT_PREV_KEY") {
            j.prev_key = v;
        }
        if let Some(v) = lookup("FIO_JWT_EXPIRES_IN") {
            j.expires_in = parse_seconds("jwt.expires_in", &v)?;
        }
        Ok(())
    }

    /// Check that everything needed at startup is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.secrets;
        required("secrets.ca_cert_path", s.ca_cert_path.as_os_str().is_empty())?;
        required("secrets.api_token_path", s.api_token_path.as_os_str().is_empty())?;
        required("secrets.remote_url", s.remote_url.is_empty())?;
        required("secrets.name", s.name.is_empty())?;
        required("secrets.namespace", s.namespace.is_empty())?;
        required("secrets.cache_prefix", s.cache_prefix.is_empty())?;
        required("jwt.key", self.jwt.key.is_empty())?;
        required("jwt.prev_key", self.jwt.prev_key.is_empty())?;
        required("jwt.valid_at_key", self.jwt.valid_at_key.is_empty())?;

        if !s.remote_url.starts_with("http://") && !s.remote_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "secrets.remote_url".into(),
                reason: "must start with http:// or https://".into(),
            });
        }

        for (field, value) in [
            ("secrets.expires_in", s.expires_in),
            ("secrets.request_timeout", s.request_timeout),
            ("secrets.cache_capacity", s.cache_capacity),
            ("jwt.expires_in", self.jwt.expires_in),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }

        Ok(())
    }
}

fn required(field: &str, missing: bool) -> Result<(), ConfigError> {
    if missing {
        return Err(ConfigError::MissingRequired {
            field: field.into(),
        });
    }
    Ok(())
}

fn parse_seconds(field: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.into(),
        reason: format!("expected a whole number of seconds, got '{raw}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn complete_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("FIO_SCRT_CA_CERT_PATH", "/run/secrets/ca.crt"),
            ("FIO_SCRT_API_TOKEN_PATH", "/run/secrets/token"),
            ("FIO_SCRT_REMOTE_URL", "https://secrets.internal:6443"),
            ("FIO_SCRT_SERVER_PATH", "api/v1/namespaces"),
            ("FIO_SCRT_NAME", "jwt-secrets"),
            ("FIO_SCRT_NAMESPACE", "jobserv"),
            ("FIO_JWT_KEY", "jwt-key"),
            ("FIO_JWT_PREV_KEY", "jwt-prev-key"),
            ("FIO_JWT_VALID_AT_KEY", "jwt-valid-at"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = CredentialConfig::load_with(lookup(&[])).unwrap();

        assert_eq!(config.secrets.cache_prefix, "pre");
        assert_eq!(config.secrets.ttl(), Duration::from_secs(60));
        assert_eq!(config.jwt.ttl(), Duration::from_secs(60));
        assert_eq!(config.secrets.decode, DecodePolicy::Base64);
    }

    #[test]
    fn test_env_overrides() {
        let mut env = complete_env();
        env.push(("FIO_SCRT_EXPIRES_IN", "120"));
        env.push(("FIO_JWT_EXPIRES_IN", "30"));
        env.push(("FIO_SCRT_DECODE", "passthrough"));

        let config = CredentialConfig::load_with(lookup(&env)).unwrap();

        assert_eq!(config.secrets.expires_in, 120);
        assert_eq!(config.jwt.expires_in, 30);
        assert_eq!(config.secrets.decode, DecodePolicy::Passthrough);
        assert_eq!(config.secrets.namespace, "jobserv");
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_number() {
        let err = CredentialConfig::load_with(lookup(&[("FIO_JWT_EXPIRES_IN", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field, .. } if field == "jwt.expires_in"
        ));
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let env: Vec<_> = complete_env()
            .into_iter()
            .filter(|(k, _)| *k != "FIO_JWT_PREV_KEY")
            .collect();
        let config = CredentialConfig::load_with(lookup(&env)).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { field } if field == "jwt.prev_key"));
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let mut env = complete_env();
        env.push(("FIO_SCRT_REMOTE_URL", "secrets.internal"));
        let config = CredentialConfig::load_with(lookup(&env)).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(
            &path,
            r#"
[secrets]
name = "from-file"
namespace = "file-ns"
expires_in = 300

[jwt]
key = "file-key"
"#,
        )
        .unwrap();
        let path_str = path.to_str().unwrap().to_string();

        let config = CredentialConfig::load_with(lookup(&[
            (CONFIG_FILE_ENV, path_str.as_str()),
            ("FIO_SCRT_NAMESPACE", "env-ns"),
        ]))
        .unwrap();

        assert_eq!(config.secrets.name, "from-file");
        assert_eq!(config.secrets.namespace, "env-ns");
        assert_eq!(config.secrets.expires_in, 300);
        assert_eq!(config.secrets.cache_prefix, "pre");
        assert_eq!(config.jwt.key, "file-key");
    }
}

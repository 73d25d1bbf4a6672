use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Where the asserted identity comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSource {
    /// Asserted by this service on behalf of an authenticated user
    #[default]
    Internal,
}

/// Organization membership of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization name
    pub name: String,
}

/// The authenticated user a token is issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// User id
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Organizations the user belongs to
    #[serde(default)]
    pub orgs: Vec<Organization>,
    /// Whether the user has a subscription
    #[serde(default)]
    pub subscriber: bool,
}

/// Identity claims carried by an issued token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Team names
    pub teams: Vec<String>,
    /// Organization names
    pub orgs: Vec<String>,
    /// Subscription flag
    pub subscriber: bool,
    /// Subject id
    pub id: String,
    /// Always [`ClaimSource::Internal`]
    pub source: ClaimSource,
    /// Caller-supplied claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const RESERVED: &[&str] = &["teams", "orgs", "subscriber", "id", "source", "iss", "iat", "exp"];

impl Claims {
    /// Claims for `user`: org names lower-cased, teams mirror orgs
    pub fn for_user(user: &UserIdentity) -> Self {
        let orgs: Vec<String> = user.orgs.iter().map(|o| o.name.to_lowercase()).collect();
        Self {
            teams: orgs.clone(),
            orgs,
            subscriber: user.subscriber,
            id: user.id.clone(),
            source: ClaimSource::Internal,
            extra: Map::new(),
        }
    }

    /// Add a caller claim; reserved names are ignored
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if RESERVED.contains(&name.as_str()) {
            tracing::debug!(claim = %name, "ignoring reserved claim name");
        } else {
            self.extra.insert(name, value.into());
        }
        self
    }

    /// SHA-256 hex digest of the claims' JSON form.
    ///
    /// Caller claims are kept in a sorted map, so equal claim sets hash
    /// equally regardless of insertion order.
    ///
    /// # Errors
    ///
    /// Propagates a serialization failure.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

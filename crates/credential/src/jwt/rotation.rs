//! Signing key selection across a rotation window
//!
//! A bundle carries the current key, the previous key and the epoch-seconds
//! instant (`valid_at`) at which the current key becomes active. Until that
//! instant tokens are signed with the previous key, so a new key can be
//! provisioned ahead of its cutover.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::config::JwtConfig;
use crate::error::SigningError;
use crate::secrets::SecretBundle;

/// Bundle field names holding the rotation material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNames {
    /// Field with the activation time of `current`, in epoch seconds
    pub valid_at: String,
    /// Field with the current key
    pub current: String,
    /// Field with the previous key
    pub previous: String,
}

impl From<&JwtConfig> for KeyNames {
    fn from(config: &JwtConfig) -> Self {
        Self {
            valid_at: config.valid_at_key.clone(),
            current: config.key.clone(),
            previous: config.prev_key.clone(),
        }
    }
}

/// Which key of the pair was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    /// Activation time has passed
    Current,
    /// Activation time is still ahead, or unknown
    Previous,
}

/// A selected signing key
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// Which key this is
    pub slot: KeySlot,
    /// Key material
    pub secret: SecretString,
}

/// Key selection rule
#[derive(Debug, Clone, Copy)]
pub struct SigningKeys;

impl SigningKeys {
    /// Slot to sign with at `now`.
    ///
    /// Current once `now_ms >= floor(valid_at * 1000)`. A missing or
    /// non-numeric `valid_at` never activates the current key.
    pub fn slot(bundle: &SecretBundle, names: &KeyNames, now: DateTime<Utc>) -> KeySlot {
        let valid_at_ms = bundle
            .get(&names.valid_at)
            .and_then(|raw| raw.expose_secret().trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite())
            .map(|secs| (secs * 1000.0).floor());

        match valid_at_ms {
            Some(valid_at_ms) if now.timestamp_millis() as f64 >= valid_at_ms => KeySlot::Current,
            Some(_) => KeySlot::Previous,
            None => {
                tracing::warn!(
                    field = %names.valid_at,
                    "rotation timestamp missing or invalid, using previous key"
                );
                KeySlot::Previous
            }
        }
    }

    /// Key to sign with at `now`.
    ///
    /// # Errors
    ///
    /// [`SigningError::MissingKey`] when the chosen field is absent or empty.
    pub fn select(
        bundle: &SecretBundle,
        names: &KeyNames,
        now: DateTime<Utc>,
    ) -> Result<SigningKey, SigningError> {
        let slot = Self::slot(bundle, names, now);
        let field = match slot {
            KeySlot::Current => &names.current,
            KeySlot::Previous => &names.previous,
        };

        match bundle.get(field) {
            Some(secret) if !secret.expose_secret().is_empty() => Ok(SigningKey {
                slot,
                secret: secret.clone(),
            }),
            _ => Err(SigningError::MissingKey {
                field: field.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::secrets::SecretFields;
    use rstest::rstest;

    fn names() -> KeyNames {
        KeyNames {
            valid_at: "jwt-valid-at".into(),
            current: "jwt-key".into(),
            previous: "jwt-prev-key".into(),
        }
    }

    fn bundle(valid_at: Option<&str>) -> SecretBundle {
        let mut fields = SecretFields::from([
            ("jwt-key".to_string(), SecretString::from("new")),
            ("jwt-prev-key".to_string(), SecretString::from("old")),
        ]);
        if let Some(valid_at) = valid_at {
            fields.insert("jwt-valid-at".into(), SecretString::from(valid_at));
        }
        SecretBundle {
            namespace: "ns".into(),
            name: "jwt".into(),
            fields,
            expires_at: Utc::now(),
        }
    }

    fn at(secs: i64, millis: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, millis * 1_000_000).unwrap()
    }

    #[rstest]
    #[case::before_cutover(at(1_699_999_999, 999), KeySlot::Previous)]
    #[case::exact_cutover(at(1_700_000_000, 0), KeySlot::Current)]
    #[case::after_cutover(at(1_700_000_001, 0), KeySlot::Current)]
    fn test_cutover(#[case] now: DateTime<Utc>, #[case] expected: KeySlot) {
        let key = SigningKeys::select(&bundle(Some("1700000000")), &names(), now).unwrap();
        assert_eq!(key.slot, expected);
    }

    #[test]
    fn test_fractional_valid_at_is_floored() {
        let b = bundle(Some("1700000000.5009"));
        assert_eq!(SigningKeys::slot(&b, &names(), at(1_700_000_000, 500)), KeySlot::Current);
        assert_eq!(SigningKeys::slot(&b, &names(), at(1_700_000_000, 499)), KeySlot::Previous);
    }

    #[test]
    fn test_missing_valid_at_uses_previous() {
        let key = SigningKeys::select(&bundle(None), &names(), Utc::now()).unwrap();
        assert_eq!(key.slot, KeySlot::Previous);
        assert_eq!(key.secret.expose_secret(), "old");
    }

    #[test]
    fn test_missing_key_material() {
        let mut b = bundle(Some("0"));
        b.fields.remove("jwt-key");

        let err = SigningKeys::select(&b, &names(), Utc::now()).unwrap_err();
        assert!(matches!(err, SigningError::MissingKey { field } if field == "jwt-key"));
    }
}

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::error::DecodeError;

/// Decoded secret fields by name
pub type SecretFields = BTreeMap<String, SecretString>;

/// Turns a parsed secret payload into a flat field map
pub trait SecretDecoder: Send + Sync {
    /// Decode `raw`
    ///
    /// # Errors
    ///
    /// [`DecodeError`] when the payload does not have the expected shape.
    fn decode(&self, raw: &Value) -> Result<SecretFields, DecodeError>;
}

/// Uses the payload's top-level fields as they are.
///
/// Strings are taken verbatim, other scalars are rendered as JSON text and
/// `null` fields are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl SecretDecoder for PassthroughDecoder {
    fn decode(&self, raw: &Value) -> Result<SecretFields, DecodeError> {
        let object = raw.as_object().ok_or(DecodeError::NotAnObject)?;
        Ok(object
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), SecretString::from(value)))
            })
            .collect())
    }
}

/// Base64-decodes every string under the payload's `data` object,
/// the layout used by Kubernetes secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64FieldsDecoder;

impl SecretDecoder for Base64FieldsDecoder {
    fn decode(&self, raw: &Value) -> Result<SecretFields, DecodeError> {
        let object = raw.as_object().ok_or(DecodeError::NotAnObject)?;
        let data = object
            .get("data")
            .and_then(Value::as_object)
            .ok_or(DecodeError::MissingData)?;

        data.iter()
            .map(|(key, value)| {
                let encoded = value.as_str().ok_or_else(|| DecodeError::NotAString {
                    field: key.clone(),
                })?;
                let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|source| {
                    DecodeError::Base64 {
                        field: key.clone(),
                        source,
                    }
                })?);
                let decoded = std::str::from_utf8(&bytes)
                    .map_err(|_| DecodeError::Utf8 { field: key.clone() })?;
                Ok((key.clone(), SecretString::from(decoded.to_owned())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn exposed<'a>(fields: &'a SecretFields, key: &str) -> Option<&'a str> {
        fields.get(key).map(|v| v.expose_secret())
    }

    #[test]
    fn test_passthrough_keeps_top_level_fields() {
        let fields = PassthroughDecoder
            .decode(&json!({ "jwt-key": "abc", "jwt-valid-at": 1_700_000_000, "gone": null }))
            .unwrap();

        assert_eq!(exposed(&fields, "jwt-key"), Some("abc"));
        assert_eq!(exposed(&fields, "jwt-valid-at"), Some("1700000000"));
        assert!(!fields.contains_key("gone"));
    }

    #[test]
    fn test_base64_decodes_data_fields() {
        let fields = Base64FieldsDecoder
            .decode(&json!({
                "kind": "Secret",
                "data": { "jwt-key": "c2VjcmV0", "jwt-valid-at": "MTcwMDAwMDAwMA==" }
            }))
            .unwrap();

        assert_eq!(exposed(&fields, "jwt-key"), Some("secret"));
        assert_eq!(exposed(&fields, "jwt-valid-at"), Some("1700000000"));
        assert!(!fields.contains_key("kind"));
    }

    #[test]
    fn test_base64_requires_data() {
        assert!(matches!(
            Base64FieldsDecoder.decode(&json!({ "jwt-key": "c2VjcmV0" })),
            Err(DecodeError::MissingData)
        ));
    }

    #[test]
    fn test_base64_rejects_bad_field() {
        let err = Base64FieldsDecoder
            .decode(&json!({ "data": { "jwt-key": "%%%" } }))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Base64 { field, .. } if field == "jwt-key"));
    }

    #[test]
    fn test_non_object_payload() {
        assert!(matches!(
            PassthroughDecoder.decode(&json!(["a"])),
            Err(DecodeError::NotAnObject)
        ));
    }
}

//! Redaction of sensitive configuration values.

/// Token every sensitive value is replaced with. Its length does not
/// depend on the secret.
pub const MASK: &str = "********";

/// Used instead of [`MASK`] for secrets made only of `*`, so the token
/// never contains the secret. Shares no character with [`MASK`].
pub const ALTERNATE_MASK: &str = "########";

/// Redaction token for `secret`.
pub fn mask_secret(secret: &str) -> &'static str {
    if !secret.is_empty() && MASK.contains(secret) {
        ALTERNATE_MASK
    } else {
        MASK
    }
}

/// Mask a secret for display. Absent values stay absent.
pub fn mask(value: Option<&str>) -> Option<String> {
    value.map(|secret| mask_secret(secret).to_string())
}

/// Masked copy of a JSON value. `null` stays `null`.
pub fn mask_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Null => serde_json::Value::Null,
        serde_json::Value::String(secret) => serde_json::Value::String(mask_secret(secret).to_string()),
        _ => serde_json::Value::String(MASK.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mask_is_fixed_length() {
        assert_eq!(mask(Some("a")).as_deref(), Some(MASK));
        assert_eq!(mask(Some("a-much-longer-secret")).as_deref(), Some(MASK));
    }

    #[test]
    fn mask_keeps_absence() {
        assert_eq!(mask(None), None);
        assert_eq!(mask_value(&json!(null)), json!(null));
    }

    #[test]
    fn mask_value_hides_any_type() {
        assert_eq!(mask_value(&json!("s3cret")), json!(MASK));
        assert_eq!(mask_value(&json!(1234)), json!(MASK));
    }

    #[test]
    fn star_only_secret_is_not_contained_in_token() {
        for secret in ["*", "***", "********"] {
            let masked = mask(Some(secret)).unwrap();
            assert_ne!(masked, secret);
            assert!(!masked.contains(secret), "{} leaked into {}", secret, masked);
            assert_eq!(masked.len(), MASK.len());
        }
        assert_eq!(mask_value(&json!("**")), json!(ALTERNATE_MASK));
        // Longer than the token, so it cannot be contained in it.
        assert_eq!(mask_secret("*********"), MASK);
    }
}

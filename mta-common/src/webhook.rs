//! Payment webhook signature validation
//!
//! Payment providers (PayPal, MAIB) report settlement through a relay that
//! posts a JSON body carrying `timestamp` (Unix epoch ms) and `signature`.
//!
//! # Signature
//!
//! 1. Replace `signature` with 64 zeros
//! 2. Serialize as canonical JSON (keys sorted recursively, no whitespace)
//! 3. Append the shared webhook secret
//! 4. SHA-256, lowercase hex
//!
//! Pure functions only; HTTP wiring lives in the server crate.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Placeholder substituted for the signature before hashing
const SIGNATURE_PLACEHOLDER: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// How far in the past a webhook timestamp may be
pub const MAX_PAST_MS: i64 = 300_000;

/// How far in the future a webhook timestamp may be (clock drift)
pub const MAX_FUTURE_MS: i64 = 5_000;

/// Webhook validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Timestamp outside the acceptance window
    InvalidTimestamp { timestamp: i64, now: i64, reason: String },

    /// Signature does not match
    InvalidSignature,

    /// A required field is missing or has the wrong type
    MissingField(&'static str),

    /// Webhook secret not configured
    Disabled,
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookError::InvalidTimestamp { reason, .. } => write!(f, "Invalid timestamp: {}", reason),
            WebhookError::InvalidSignature => write!(f, "Invalid signature"),
            WebhookError::MissingField(name) => write!(f, "Missing field: {}", name),
            WebhookError::Disabled => write!(f, "Webhook secret not configured"),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Check a webhook timestamp against `now` (both epoch ms)
pub fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), WebhookError> {
    let diff = now - timestamp;

    if diff > MAX_PAST_MS {
        return Err(WebhookError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("Timestamp {}ms too old (max {}ms past)", diff, MAX_PAST_MS),
        });
    }

    if diff < -MAX_FUTURE_MS {
        return Err(WebhookError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.abs(),
                MAX_FUTURE_MS
            ),
        });
    }

    Ok(())
}

/// Canonical JSON: sorted keys, no whitespace
///
/// ```
/// use mta_common::webhook::to_canonical_json;
/// use serde_json::json;
///
/// let canonical = to_canonical_json(&json!({"z": 1, "a": [true, null]}));
/// assert_eq!(canonical, r#"{"a":[true,null],"z":1}"#);
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        // serde_json escapes strings exactly once and without whitespace
        other => other.to_string(),
    }
}

/// Compute the signature for a webhook body
pub fn calculate_signature(body: &Value, secret: &str) -> String {
    let mut value = body.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "signature".to_string(),
            Value::String(SIGNATURE_PLACEHOLDER.to_string()),
        );
    }

    let to_hash = format!("{}{}", to_canonical_json(&value), secret);
    format!("{:x}", Sha256::digest(to_hash.as_bytes()))
}

/// Validate timestamp and signature of a webhook body
pub fn verify(body: &Value, secret: &str, now_ms: i64) -> Result<(), WebhookError> {
    if secret.trim().is_empty() {
        return Err(WebhookError::Disabled);
    }

    let timestamp = body
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or(WebhookError::MissingField("timestamp"))?;
    let provided = body
        .get("signature")
        .and_then(Value::as_str)
        .ok_or(WebhookError::MissingField("signature"))?;

    validate_timestamp(timestamp, now_ms)?;

    let calculated = calculate_signature(body, secret);
    if !crate::security::constant_time_eq(provided.as_bytes(), calculated.as_bytes()) {
        return Err(WebhookError::InvalidSignature);
    }

    Ok(())
}

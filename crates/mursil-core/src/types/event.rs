//! S3 event envelope and normalization
//!
//! Decodes the provider-delivered notification batch
//! (`{"Records": [{"eventName", "s3": {"bucket": {"name"}, "object":
//! {"key", "eTag"}}}]}`) into canonical [`ScanRequest`] values.
//!
//! Normalization is lenient per record and strict per batch: a record
//! missing bucket or key is dropped (counted, logged at debug), while a
//! body that is not parseable JSON at all is rejected upstream as a
//! malformed payload before this module is reached.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::IdentityConfig;
use crate::identity::identity;
use crate::MANUAL_EVENT;

// ============================================================================
// Raw envelope
// ============================================================================

/// One raw record of the S3 notification envelope.
///
/// Every field is optional at decode time; presence is checked
/// explicitly during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "eventName")]
    pub event_name: Option<String>,
    pub s3: Option<RawS3>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawS3 {
    pub bucket: Option<RawBucket>,
    pub object: Option<RawObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBucket {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObject {
    pub key: Option<String>,
    #[serde(rename = "eTag")]
    pub e_tag: Option<String>,
}

// ============================================================================
// Canonical unit of work
// ============================================================================

/// Canonical unit of work extracted from one storage event record.
///
/// Constructed only when both bucket and key are non-empty. The key is
/// passed through exactly as the provider reported it; percent-encoded
/// keys stay encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    pub bucket: String,
    pub key: String,
    pub event: String,
    pub etag: Option<String>,
    /// Deterministic idempotency anchor derived from `key`
    pub identity: String,
}

impl ScanRequest {
    /// Build a request from extracted fields, deriving the identity.
    ///
    /// Returns `None` when bucket or key is missing or empty.
    pub fn from_parts(
        bucket: Option<String>,
        key: Option<String>,
        event: Option<String>,
        etag: Option<String>,
        identity_config: &IdentityConfig,
    ) -> Option<Self> {
        let bucket = bucket.filter(|b| !b.is_empty())?;
        let key = key.filter(|k| !k.is_empty())?;
        let slug = identity(&key, identity_config.mode, identity_config.length);

        Some(Self {
            bucket,
            key,
            event: event.filter(|e| !e.is_empty()).unwrap_or_else(|| MANUAL_EVENT.to_string()),
            etag,
            identity: slug,
        })
    }

    fn from_record(record: RawRecord, identity_config: &IdentityConfig) -> Option<Self> {
        let s3 = record.s3?;
        let bucket = s3.bucket.and_then(|b| b.name);
        let (key, etag) = match s3.object {
            Some(object) => (object.key, object.e_tag),
            None => (None, None),
        };
        Self::from_parts(bucket, key, record.event_name, etag, identity_config)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Result of normalizing one notification batch
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Canonical requests, in input record order
    pub requests: Vec<ScanRequest>,
    /// Records present in the envelope, well-formed or not
    pub received: usize,
    /// Records dropped for missing bucket/key or unusable shape
    pub dropped: usize,
}

/// Normalize a parsed notification payload into scan requests.
///
/// A payload without a `Records` array yields an empty batch; batches
/// can legitimately mix well-formed and provider-internal records, so
/// individual bad records never fail the call.
pub fn normalize(payload: &Value, identity_config: &IdentityConfig) -> NormalizedBatch {
    let records = match payload.get("Records").and_then(Value::as_array) {
        Some(records) => records,
        None => {
            debug!("payload has no Records array, nothing to normalize");
            return NormalizedBatch::default();
        }
    };

    let mut batch = NormalizedBatch {
        received: records.len(),
        ..Default::default()
    };

    for (index, raw) in records.iter().enumerate() {
        // Lenient per-record decode: a record of the wrong shape is
        // just a drop, same as one missing bucket/key.
        let request = serde_json::from_value::<RawRecord>(raw.clone())
            .ok()
            .and_then(|record| ScanRequest::from_record(record, identity_config));

        match request {
            Some(request) => batch.requests.push(request),
            None => {
                debug!(index, "dropping record without bucket/key");
                batch.dropped += 1;
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity_config() -> IdentityConfig {
        IdentityConfig::default()
    }

    fn put_record(bucket: &str, key: &str) -> Value {
        json!({
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": {"name": bucket},
                "object": {"key": key, "eTag": "abc123"}
            }
        })
    }

    #[test]
    fn test_normalize_single_record() {
        let payload = json!({"Records": [put_record("incoming", "a/b.csv")]});
        let batch = normalize(&payload, &identity_config());

        assert_eq!(batch.received, 1);
        assert_eq!(batch.dropped, 0);
        assert_eq!(batch.requests.len(), 1);

        let request = &batch.requests[0];
        assert_eq!(request.bucket, "incoming");
        assert_eq!(request.key, "a/b.csv");
        assert_eq!(request.event, "ObjectCreated:Put");
        assert_eq!(request.etag.as_deref(), Some("abc123"));
        assert_eq!(request.identity, "1c31892c");
    }

    #[test]
    fn test_normalize_filters_and_preserves_order() {
        let payload = json!({"Records": [
            put_record("incoming", "first.csv"),
            {"eventName": "ObjectCreated:Put", "s3": {"bucket": {"name": "incoming"}, "object": {"key": ""}}},
            {"s3": {"object": {"key": "no-bucket.csv"}}},
            put_record("incoming", "second.csv"),
            "not-even-an-object",
        ]});

        let batch = normalize(&payload, &identity_config());
        assert_eq!(batch.received, 5);
        assert_eq!(batch.dropped, 3);
        let keys: Vec<_> = batch.requests.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["first.csv", "second.csv"]);
    }

    #[test]
    fn test_normalize_missing_event_name_defaults_to_manual() {
        let payload = json!({"Records": [
            {"s3": {"bucket": {"name": "incoming"}, "object": {"key": "x.csv"}}}
        ]});
        let batch = normalize(&payload, &identity_config());
        assert_eq!(batch.requests[0].event, "manual");
        assert_eq!(batch.requests[0].etag, None);
    }

    #[test]
    fn test_normalize_no_records_is_empty_not_error() {
        for payload in [json!({}), json!({"Event": "s3:TestEvent"}), json!([1, 2]), json!(null)] {
            let batch = normalize(&payload, &identity_config());
            assert_eq!(batch.received, 0);
            assert!(batch.requests.is_empty());
        }
    }

    #[test]
    fn test_normalize_key_passed_through_unmodified() {
        let payload = json!({"Records": [put_record("incoming", "dir%2Ffile name.csv")]});
        let batch = normalize(&payload, &identity_config());
        assert_eq!(batch.requests[0].key, "dir%2Ffile name.csv");
    }

    #[test]
    fn test_identity_stable_across_batches() {
        let payload = json!({"Records": [put_record("incoming", "a/b.csv")]});
        let first = normalize(&payload, &identity_config());
        let second = normalize(&payload, &identity_config());
        assert_eq!(first.requests[0].identity, second.requests[0].identity);
    }

    #[test]
    fn test_duplicate_keys_dispatch_independently() {
        // Provider retries can repeat a key within one batch; each
        // record stays a separate request with the same identity.
        let payload = json!({"Records": [
            put_record("incoming", "a/b.csv"),
            put_record("incoming", "a/b.csv"),
        ]});
        let batch = normalize(&payload, &identity_config());
        assert_eq!(batch.requests.len(), 2);
        assert_eq!(batch.requests[0].identity, batch.requests[1].identity);
    }
}

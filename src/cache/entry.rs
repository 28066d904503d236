//! Cache Entry Types
//!
//! Defines TTLs and the expiring entry wrapper shared by every backend.

use crate::cache::backend::DEFAULT_TTL_MS;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

// =============================================================================
// Time-To-Live
// =============================================================================

/// How long an entry stays readable after it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ttl {
    /// Entry never expires
    Never,
    /// Entry expires this many milliseconds after the write
    Millis(u64),
}

impl Ttl {
    /// Build from a signed millisecond count; zero or negative means never
    pub fn from_millis(ms: i64) -> Self {
        if ms > 0 {
            Ttl::Millis(ms as u64)
        } else {
            Ttl::Never
        }
    }

    /// Absolute expiry timestamp for a write happening at `now_ms`
    pub fn expiry_from(&self, now_ms: i64) -> Option<i64> {
        match self {
            Ttl::Never => None,
            Ttl::Millis(ms) => Some(now_ms.saturating_add(i64::try_from(*ms).unwrap_or(i64::MAX))),
        }
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::Millis(DEFAULT_TTL_MS)
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        match u64::try_from(d.as_millis()) {
            Ok(0) => Ttl::Never,
            Ok(ms) => Ttl::Millis(ms),
            Err(_) => Ttl::Millis(u64::MAX),
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => write!(f, "never"),
            Ttl::Millis(ms) => write!(f, "{}ms", ms),
        }
    }
}

// =============================================================================
// Expiring Entry
// =============================================================================

/// A value paired with its optional absolute expiry
///
/// Persistent backends store this exact shape as JSON:
/// `{"value": <any>, "expiry": <unix millis> | null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringEntry {
    /// The cached value
    pub value: Value,
    /// Absolute expiry in Unix millis (None = never expires)
    #[serde(default, deserialize_with = "deserialize_expiry")]
    pub expiry: Option<i64>,
}

/// A stored expiry of zero (or below) is treated like null
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.filter(|ms| *ms > 0))
}

impl ExpiringEntry {
    /// Wrap a value written at `now_ms` with the given TTL
    pub fn new(value: Value, ttl: Ttl, now_ms: i64) -> Self {
        Self {
            value,
            expiry: ttl.expiry_from(now_ms),
        }
    }

    /// Wrap a value that never expires
    pub fn permanent(value: Value) -> Self {
        Self {
            value,
            expiry: None,
        }
    }

    /// Check if the entry has expired at `now_ms`
    #[inline]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        is_expired(self.expiry, now_ms)
    }

    /// Milliseconds left before expiry, `None` for permanent entries
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        self.expiry.map(|e| (e - now_ms).max(0))
    }
}

/// Expiry rule shared by every read path
#[inline]
pub fn is_expired(expiry: Option<i64>, now_ms: i64) -> bool {
    matches!(expiry, Some(e) if now_ms > e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ttl_from_millis() {
        assert_eq!(Ttl::from_millis(0), Ttl::Never);
        assert_eq!(Ttl::from_millis(-5), Ttl::Never);
        assert_eq!(Ttl::from_millis(50), Ttl::Millis(50));
        assert_eq!(Ttl::default(), Ttl::Millis(300_000));
        assert_eq!(Ttl::from(Duration::ZERO), Ttl::Never);
        assert_eq!(Ttl::from(Duration::from_secs(2)), Ttl::Millis(2000));
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = ExpiringEntry::new(json!("x"), Ttl::Millis(50), 1_000);
        assert_eq!(entry.expiry, Some(1_050));
        // Expired only strictly after the expiry instant
        assert!(!entry.is_expired_at(1_050));
        assert!(entry.is_expired_at(1_051));
        assert_eq!(entry.remaining_ms(1_020), Some(30));

        let forever = ExpiringEntry::new(json!("x"), Ttl::Never, 1_000);
        assert!(!forever.is_expired_at(i64::MAX));
        assert_eq!(forever.remaining_ms(5), None);
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry = ExpiringEntry::new(json!({"rooms": [101, 102]}), Ttl::Millis(10), 100);
        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded, json!({"value": {"rooms": [101, 102]}, "expiry": 110}));

        let permanent = serde_json::to_string(&ExpiringEntry::permanent(json!(1))).unwrap();
        assert_eq!(permanent, r#"{"value":1,"expiry":null}"#);
    }

    #[test]
    fn test_entry_zero_expiry_means_never() {
        let decoded: ExpiringEntry =
            serde_json::from_str(r#"{"value":"hostel-a","expiry":0}"#).unwrap();
        assert_eq!(decoded.expiry, None);

        let decoded: ExpiringEntry = serde_json::from_str(r#"{"value":"hostel-a"}"#).unwrap();
        assert_eq!(decoded.expiry, None);
    }

    #[test]
    fn test_entry_missing_value_is_rejected() {
        assert!(serde_json::from_str::<ExpiringEntry>(r#"{"expiry":10}"#).is_err());
        assert!(serde_json::from_str::<ExpiringEntry>("\"plain string\"").is_err());
    }
}

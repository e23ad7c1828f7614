//! The normalized capture record.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Placeholder stored when a body could not be read or decoded.
pub const DECODE_FAILED_PLACEHOLDER: &str = "Could not parse body";

/// 22 alphanumeric characters carry ~131 bits of entropy.
const RECORD_ID_LEN: usize = 22;

/// Opaque, URL-safe identifier of a captured request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh id from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RECORD_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded request body.
///
/// On the wire this is the bare value: a JSON value, a string, `null`, or
/// the [`DECODE_FAILED_PLACEHOLDER`] string.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Json(serde_json::Value),
    Text(String),
    Absent,
    DecodeFailed,
}

impl RecordBody {
    pub fn is_absent(&self) -> bool {
        matches!(self, RecordBody::Absent)
    }
}

impl Serialize for RecordBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordBody::Json(value) => value.serialize(serializer),
            RecordBody::Text(text) => serializer.serialize_str(text),
            RecordBody::Absent => serializer.serialize_none(),
            RecordBody::DecodeFailed => serializer.serialize_str(DECODE_FAILED_PLACEHOLDER),
        }
    }
}

impl<'de> Deserialize<'de> for RecordBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Null => RecordBody::Absent,
            serde_json::Value::String(s) if s == DECODE_FAILED_PLACEHOLDER => RecordBody::DecodeFailed,
            serde_json::Value::String(s) => RecordBody::Text(s),
            other => RecordBody::Json(other),
        })
    }
}

/// One captured inbound request. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RecordId,
    /// Milliseconds since the Unix epoch, taken when capture began.
    pub timestamp: i64,
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: RecordBody,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema tag carried by every envelope.
pub const ENVELOPE_VERSION: &str = "v1";

/// Producer name stamped into `source`.
pub const ENVELOPE_SOURCE: &str = "llama-throughput-lab";

// ═══════════════════════════════════════════════════════════════
//  Envelope
// ═══════════════════════════════════════════════════════════════

/// Versioned wrapper around a bus payload.
///
/// One envelope per publish call; `payload` is nested verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub topic: String,
    /// UTC, whole seconds, `Z` suffix.
    pub ts: String,
    pub version: String,
    pub source: String,
    pub payload: Value,
}

impl Envelope {
    /// Envelope stamped with a fresh UUIDv4 and the current time.
    pub fn new(topic: &str, payload: Value) -> Self {
        Self::with_parts(uuid::Uuid::new_v4().to_string(), Utc::now(), topic, payload)
    }

    /// Envelope with an explicit id and clock reading.
    pub fn with_parts(id: String, at: DateTime<Utc>, topic: &str, payload: Value) -> Self {
        Self {
            id,
            topic: topic.to_string(),
            ts: format_ts(at),
            version: ENVELOPE_VERSION.to_string(),
            source: ENVELOPE_SOURCE.to_string(),
            payload,
        }
    }

    /// UTF-8 JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Parsed `ts`, if well-formed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.ts)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Wrap `payload` for `topic` and serialize it.
pub fn make_envelope(topic: &str, payload: Value) -> Result<Vec<u8>, serde_json::Error> {
    Envelope::new(topic, payload).encode()
}

fn format_ts(at: DateTime<Utc>) -> String {
    at.trunc_subsecs(0).to_rfc3339_opts(SecondsFormat::Secs, true)
}

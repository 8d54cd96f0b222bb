//! Cached record codec
//!
//! A [`CacheEntry`] pairs the raw resolver response with the time it was
//! fetched. Entries are stored as JSON objects of the form
//!
//! ```text
//! {"Date": "2024-05-01T10:00:00.123456789Z", "Blob": "<base64 response body>"}
//! ```
//!
//! Keeping the timestamp outside the payload lets the cache check freshness
//! without parsing the resolver's response format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One cached resolver response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the payload was fetched from the resolver
    #[serde(rename = "Date", alias = "date")]
    pub fetched_at: DateTime<Utc>,
    /// The response body exactly as received
    #[serde(rename = "Blob", alias = "blob", with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl CacheEntry {
    /// Creates an entry for a payload fetched at `fetched_at`
    pub fn new(fetched_at: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            fetched_at,
            payload,
        }
    }

    /// Serializes the entry for storage
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }

    /// Parses a stored entry. Malformed bytes mean the store is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::Decode)
    }

    /// Whether the entry is stale at `now` under the given TTL
    ///
    /// An entry expires once `fetched_at + ttl` is reached, so a zero TTL
    /// expires every entry. A TTL too large to represent never expires.
    pub fn is_expired(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return false;
        };
        match self.fetched_at.checked_add_signed(ttl) {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        // A nil byte slice is written as null
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

//! Byte format of a cache entry.
//!
//! The value is serialized to JSON, wrapped in an envelope carrying the format
//! version, timestamps and a sha256 checksum of the payload, and the whole
//! envelope is gzip-compressed.

use crate::error::{Result, StoreError};
use crate::serialization::{from_json, to_json};
use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Current envelope format. Readers reject anything newer.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    written_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    checksum: String,
    payload: String,
}

/// A decoded, unexpired cache value.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub written_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn encode<T: Serialize>(value: &T, ttl: Option<Duration>, now: DateTime<Utc>) -> Result<Vec<u8>> {
    let expires_at = match ttl {
        Some(ttl) => Some(now.checked_add_signed(ttl).ok_or_else(|| {
            StoreError::serialization(format!("TTL of {}s runs past the calendar", ttl.num_seconds()))
        })?),
        None => None,
    };
    let payload = to_json(value)?;
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        written_at: now,
        expires_at,
        checksum: checksum(&payload),
        payload,
    };
    let json = to_json(&envelope)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(json.as_bytes())
        .map_err(|e| StoreError::compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StoreError::compression(e.to_string()))
}

/// Decodes the bytes stored under `key`. An expired entry decodes to `None`.
pub fn decode<T: DeserializeOwned>(
    key: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<Option<CacheEntry<T>>> {
    let mut json = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut json)
        .map_err(|e| StoreError::corrupt(key, format!("not a gzip envelope: {e}")))?;

    let envelope: Envelope = from_json(&json)
        .map_err(|e| StoreError::corrupt(key, format!("unreadable envelope: {e}")))?;

    if envelope.format_version > FORMAT_VERSION {
        return Err(StoreError::corrupt(
            key,
            format!(
                "format version {} is newer than supported {}",
                envelope.format_version, FORMAT_VERSION
            ),
        ));
    }
    if envelope.expires_at.is_some_and(|at| at <= now) {
        tracing::debug!(key, "Cache entry expired");
        return Ok(None);
    }
    if checksum(&envelope.payload) != envelope.checksum {
        return Err(StoreError::corrupt(key, "checksum mismatch"));
    }

    let value = from_json(&envelope.payload)
        .map_err(|e| StoreError::corrupt(key, format!("payload does not decode: {e}")))?;
    Ok(Some(CacheEntry {
        value,
        written_at: envelope.written_at,
        expires_at: envelope.expires_at,
    }))
}

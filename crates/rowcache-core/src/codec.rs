//! Payload codecs

use crate::error::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Encoding used for cache payloads.
///
/// Neither format ever produces an empty payload, which leaves the empty byte
/// string free to act as the absent-row tombstone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    #[serde(alias = "msgpack")]
    MessagePack,
}

impl Codec {
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(value)?),
            Codec::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    /// Encode `value` and confirm the payload decodes back into `T`.
    ///
    /// serde_json writes non-finite floats as `null`, which then fails to
    /// decode. Payloads like that must never reach the store.
    pub fn encode_checked<T: Serialize + DeserializeOwned>(&self, value: &T) -> Result<Vec<u8>> {
        let payload = self.encode(value)?;
        self.decode::<T>(&payload).map_err(|e| {
            CacheError::Serialization(format!("{} payload does not decode: {}", self, e))
        })?;
        Ok(payload)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MessagePack => "msgpack",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "msgpack" | "messagepack" => Ok(Codec::MessagePack),
            other => Err(CacheError::Config(format!("unknown codec: {}", other))),
        }
    }
}

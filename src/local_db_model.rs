//! Stored record envelope.
//!
//! Every value the engine persists is wrapped in a [`LocalDbModel`]: the
//! storage key, a content hash of the payload, the payload's schema version,
//! and the payload itself as JSON. The hash catches torn or hand-edited values;
//! the version lets each record type upgrade older payloads one record at a
//! time, so a failed upgrade costs that record only.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{EngineError, EngineResult};
use crate::local_db_state::KeyValueStore;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LocalDbModel {
    /// Storage key this envelope was written under.
    pub id: String,

    /// xxh3 digest of the serialized `data`, lowercase hex.
    pub hash: String,

    /// Schema version of `data`. Envelopes written before versioning existed
    /// deserialize as version 1.
    #[serde(default = "first_version")]
    pub version: u32,

    pub data: JsonValue,
}

fn first_version() -> u32 {
    1
}

/// A payload type that can be stored inside a [`LocalDbModel`].
pub trait Versioned: Serialize + DeserializeOwned {
    const SCHEMA_VERSION: u32;

    /// Upgrades an older payload to [`Self::SCHEMA_VERSION`]. Returning `None`
    /// marks the record as unmigratable.
    fn migrate(_from_version: u32, _data: JsonValue) -> Option<JsonValue> {
        None
    }
}

pub fn content_hash(data: &JsonValue) -> String {
    format!("{:016x}", xxh3_64(data.to_string().as_bytes()))
}

impl LocalDbModel {
    pub fn wrap<T: Versioned>(id: &str, value: &T) -> EngineResult<Self> {
        let data = serde_json::to_value(value)?;
        Ok(Self {
            id: id.to_string(),
            hash: content_hash(&data),
            version: T::SCHEMA_VERSION,
            data,
        })
    }

    pub fn unwrap_payload<T: Versioned>(self) -> EngineResult<T> {
        if content_hash(&self.data) != self.hash {
            return Err(EngineError::Decode {
                key: self.id,
                reason: "content hash mismatch".to_string(),
            });
        }

        let data = if self.version < T::SCHEMA_VERSION {
            debug!(
                "Migrating '{}' from schema v{} to v{}",
                self.id,
                self.version,
                T::SCHEMA_VERSION
            );
            T::migrate(self.version, self.data).ok_or_else(|| EngineError::Migration {
                key: self.id.clone(),
                from_version: self.version,
            })?
        } else if self.version > T::SCHEMA_VERSION {
            return Err(EngineError::Decode {
                key: self.id,
                reason: format!("written by newer schema v{}", self.version),
            });
        } else {
            self.data
        };

        serde_json::from_value(data).map_err(|e| EngineError::Decode {
            key: self.id,
            reason: e.to_string(),
        })
    }
}

pub fn encode<T: Versioned>(key: &str, value: &T) -> EngineResult<Vec<u8>> {
    let model = LocalDbModel::wrap(key, value)?;
    Ok(serde_json::to_vec(&model)?)
}

pub fn decode<T: Versioned>(key: &str, bytes: &[u8]) -> EngineResult<T> {
    let model: LocalDbModel = serde_json::from_slice(bytes).map_err(|e| EngineError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    model.unwrap_payload()
}

/// Reads one record. Backend failures propagate; a value that cannot be
/// decoded is logged and reported as absent.
pub fn load<T: Versioned>(store: &dyn KeyValueStore, key: &str) -> EngineResult<Option<T>> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    match decode(key, &bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Dropping unreadable record: {e}");
            Ok(None)
        }
    }
}

/// Reads every record under `prefix`, skipping the ones that fail to decode.
pub fn load_prefix<T: Versioned>(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> EngineResult<Vec<(String, T)>> {
    let mut out = Vec::new();
    for (key, bytes) in store.scan_prefix(prefix)? {
        match decode(&key, &bytes) {
            Ok(value) => out.push((key, value)),
            Err(e) => warn!("Dropping unreadable record: {e}"),
        }
    }
    Ok(out)
}

pub fn save<T: Versioned>(store: &dyn KeyValueStore, key: &str, value: &T) -> EngineResult<()> {
    let bytes = encode(key, value)?;
    store.put(key, &bytes)
}

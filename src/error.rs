//! Engine-level error type.
//!
//! Recoverable selection problems (duplicate word, a line that spells
//! nothing) never reach this type; they are reported as a
//! [`SelectionOutcome`](crate::engine::SelectionOutcome). What remains are the
//! failures a caller has to know about: the backing store went away, a stored
//! record could not be read back, or the caller handed us something invalid.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The storage backend could not be opened or a write did not commit.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// A stored value exists but could not be turned back into a record.
    #[error("Failed to decode record '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error("Failed to encode record: {0}")]
    Encode(String),

    /// A stored record carries an older schema that could not be upgraded.
    #[error("Failed to migrate record '{key}' from schema v{from_version}")]
    Migration { key: String, from_version: u32 },

    /// The caller referenced a cell outside the puzzle grid.
    #[error("Selection ({row}, {col}) is outside a {size}x{size} grid")]
    InvalidSelection { row: usize, col: usize, size: usize },

    #[error("Grid size {size} is outside {min}..={max}")]
    UnsupportedGridSize { size: usize, min: usize, max: usize },

    /// A generated puzzle violated one of its structural invariants.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<lmdb::Error> for EngineError {
    fn from(err: lmdb::Error) -> Self {
        EngineError::PersistenceUnavailable(format!("LMDB error: {err}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Encode(format!("JSON serialization error: {err}"))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::PersistenceUnavailable(format!("IO error: {err}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

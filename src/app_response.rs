use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::EngineError;

/// Envelope returned across the FFI boundary. Every `extern "C"` entry point
/// serializes one of these to JSON.
#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    ValidationError(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<EngineError> for AppResponse {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::PersistenceUnavailable(_) | EngineError::Migration { .. } => {
                AppResponse::DatabaseError(err.to_string())
            }
            EngineError::Decode { .. } | EngineError::Encode(_) => {
                AppResponse::SerializationError(err.to_string())
            }
            EngineError::InvalidSelection { .. }
            | EngineError::UnsupportedGridSize { .. }
            | EngineError::InvalidGrid(_)
            | EngineError::InvalidConfig(_) => AppResponse::ValidationError(err.to_string()),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }
}

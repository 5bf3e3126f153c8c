use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::generator::DEFAULT_PLACEMENT_ATTEMPTS;
use crate::hints::{HintPolicy, DEFAULT_COMPLETION_BONUS, DEFAULT_DAILY_ALLOTMENT};

const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;
const MAX_HINTS: u32 = 99;

/// Engine construction parameters, passed as JSON to `create_engine`.
///
/// ```json
/// {
///   "db_path": "/data/app/wordsearch",
///   "shared_db_path": "/group/container/wordsearch-shared",
///   "daily_hint_allotment": 3
/// }
/// ```
///
/// Without a `db_path` the engine runs on an in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub db_path: Option<PathBuf>,
    /// Directory reachable by the widget process. Defaults to `db_path`.
    pub shared_db_path: Option<PathBuf>,
    pub map_size_mb: usize,
    pub daily_hint_allotment: u32,
    pub completion_bonus_hints: u32,
    pub placement_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            shared_db_path: None,
            map_size_mb: 16,
            daily_hint_allotment: DEFAULT_DAILY_ALLOTMENT,
            completion_bonus_hints: DEFAULT_COMPLETION_BONUS,
            placement_attempts: DEFAULT_PLACEMENT_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("Invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.map_size_mb == 0 {
            return Err(EngineError::InvalidConfig(
                "map_size_mb must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_PLACEMENT_ATTEMPTS).contains(&self.placement_attempts) {
            return Err(EngineError::InvalidConfig(format!(
                "placement_attempts must be between 1 and {MAX_PLACEMENT_ATTEMPTS}"
            )));
        }
        if self.daily_hint_allotment > MAX_HINTS || self.completion_bonus_hints > MAX_HINTS {
            return Err(EngineError::InvalidConfig(format!(
                "hint counts must not exceed {MAX_HINTS}"
            )));
        }
        if let Some(path) = &self.db_path {
            if path.as_os_str().is_empty() {
                return Err(EngineError::InvalidConfig("db_path is empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn hint_policy(&self) -> HintPolicy {
        HintPolicy {
            daily_allotment: self.daily_hint_allotment,
            completion_bonus: self.completion_bonus_hints,
        }
    }
}

use std::sync::Arc;

use chrono::{NaiveTime, Timelike};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::local_db_model::{self, Versioned};
use crate::local_db_state::KeyValueStore;

pub const MIN_GRID_SIZE: usize = 5;
pub const MAX_GRID_SIZE: usize = 12;
pub const DEFAULT_GRID_SIZE: usize = 8;

const SETTINGS_KEY: &str = "settings";

/// Rejects grid sizes outside `MIN_GRID_SIZE..=MAX_GRID_SIZE`.
pub fn check_grid_size(grid_size: usize) -> EngineResult<()> {
    if (MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid_size) {
        Ok(())
    } else {
        Err(EngineError::UnsupportedGridSize {
            size: grid_size,
            min: MIN_GRID_SIZE,
            max: MAX_GRID_SIZE,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppearanceMode {
    #[default]
    System,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintMode {
    /// Hints come out of the daily budget.
    #[default]
    Limited,
    /// Hints are always available and never charged.
    Unlimited,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub grid_size: usize,
    pub appearance: AppearanceMode,
    pub hint_mode: HintMode,
    pub celebrations: bool,
    pub haptics: bool,
    pub sound: bool,
    /// Local time at which the daily puzzle rotates.
    pub daily_refresh_time: NaiveTime,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            appearance: AppearanceMode::System,
            hint_mode: HintMode::Limited,
            celebrations: true,
            haptics: true,
            sound: false,
            daily_refresh_time: NaiveTime::MIN,
        }
    }
}

impl AppSettings {
    /// Clamps the grid size into range and drops seconds from the refresh time.
    pub fn sanitized(mut self) -> Self {
        self.grid_size = self.grid_size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        self.daily_refresh_time =
            NaiveTime::from_hms_opt(self.daily_refresh_time.hour(), self.daily_refresh_time.minute(), 0)
                .unwrap_or(NaiveTime::MIN);
        self
    }
}

impl Versioned for AppSettings {
    const SCHEMA_VERSION: u32 = 1;
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> AppSettings {
        match local_db_model::load::<AppSettings>(self.store.as_ref(), SETTINGS_KEY) {
            Ok(settings) => settings.unwrap_or_default().sanitized(),
            Err(e) => {
                warn!("Settings unavailable, using defaults: {e}");
                AppSettings::default()
            }
        }
    }

    /// Persists the sanitized form of `settings` and returns it.
    pub fn save(&self, settings: AppSettings) -> EngineResult<AppSettings> {
        let settings = settings.sanitized();
        local_db_model::save(self.store.as_ref(), SETTINGS_KEY, &settings)?;
        Ok(settings)
    }
}

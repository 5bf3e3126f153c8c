//! Per-day, per-grid-size progress records.
//!
//! Records live under `progress:<day>:<grid>`. Separately, every completion is
//! appended to `completion:<day>`, which is what streaks are computed from.
//! [`ProgressStore::reset`] removes the progress record but leaves the
//! completion history alone: restarting a finished puzzle does not take the
//! day back out of a streak.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::calendar::{Clock, DayKey};
use crate::error::EngineResult;
use crate::generator::GridPosition;
use crate::local_db_model::{self, Versioned};
use crate::local_db_state::KeyValueStore;

const RECORD_PREFIX: &str = "progress:";
const HISTORY_PREFIX: &str = "completion:";
const REVISION_KEY: &str = "completion_revision";

/// `"<day>:<grid>"`, the identity of a progress record.
pub fn record_key(day: DayKey, grid_size: usize) -> String {
    format!("{}:{grid_size}", day.get())
}

fn storage_key(day: DayKey, grid_size: usize) -> String {
    format!("{RECORD_PREFIX}{}", record_key(day, grid_size))
}

fn history_key(day: DayKey) -> String {
    format!("{HISTORY_PREFIX}{}", day.get())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppProgressRecord {
    pub day: DayKey,
    pub grid_size: usize,
    pub found_words: BTreeSet<String>,
    pub solved_positions: BTreeSet<GridPosition>,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AppProgressRecord {
    pub fn new(day: DayKey, grid_size: usize) -> Self {
        Self {
            day,
            grid_size,
            found_words: BTreeSet::new(),
            solved_positions: BTreeSet::new(),
            completed: false,
            started_at: None,
            updated_at: None,
            completed_at: None,
        }
    }

    pub fn key(&self) -> String {
        record_key(self.day, self.grid_size)
    }
}

impl Versioned for AppProgressRecord {
    const SCHEMA_VERSION: u32 = 2;

    /// v1 records only carried the found words and the completion flag.
    fn migrate(from_version: u32, mut data: JsonValue) -> Option<JsonValue> {
        if from_version != 1 {
            return None;
        }
        let fields = data.as_object_mut()?;
        if !fields.contains_key("day") || !fields.contains_key("grid_size") {
            return None;
        }
        fields
            .entry("found_words")
            .or_insert_with(|| JsonValue::Array(Vec::new()));
        fields.entry("completed").or_insert(JsonValue::Bool(false));
        fields.insert("solved_positions".to_string(), JsonValue::Array(Vec::new()));
        for stamp in ["started_at", "updated_at", "completed_at"] {
            fields.entry(stamp).or_insert(JsonValue::Null);
        }
        Some(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionHistory {
    day: DayKey,
    grid_sizes: BTreeSet<usize>,
    first_completed_at: DateTime<Utc>,
}

impl Versioned for CompletionHistory {
    const SCHEMA_VERSION: u32 = 1;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
struct HistoryRevision(u64);

impl Versioned for HistoryRevision {
    const SCHEMA_VERSION: u32 = 1;
}

pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// All readable records keyed by `"<day>:<grid>"`. Empty if storage is
    /// unavailable.
    pub fn load_records(&self) -> BTreeMap<String, AppProgressRecord> {
        match local_db_model::load_prefix::<AppProgressRecord>(self.store.as_ref(), RECORD_PREFIX)
        {
            Ok(records) => records.into_iter().map(|(_, r)| (r.key(), r)).collect(),
            Err(e) => {
                warn!("Progress records unavailable: {e}");
                BTreeMap::new()
            }
        }
    }

    pub fn load_record(&self, day: DayKey, grid_size: usize) -> Option<AppProgressRecord> {
        let key = storage_key(day, grid_size);
        match local_db_model::load(self.store.as_ref(), &key) {
            Ok(record) => record,
            Err(e) => {
                warn!("Progress record {key} unavailable: {e}");
                None
            }
        }
    }

    /// Upserts `record`. Saving an unchanged record rewrites the same bytes.
    pub fn save(&self, record: &AppProgressRecord) -> EngineResult<()> {
        let _guard = self.write_lock.lock();
        local_db_model::save(
            self.store.as_ref(),
            &storage_key(record.day, record.grid_size),
            record,
        )?;
        if record.completed {
            self.append_history(record.day, record.grid_size)?;
        }
        Ok(())
    }

    /// Loads the record for the key (or a new one), applies `f` and saves the
    /// result if `f` changed it. The write lock is held from the load through
    /// the save, so concurrent updates to the same store never drop each
    /// other's changes.
    pub fn update<R>(
        &self,
        day: DayKey,
        grid_size: usize,
        f: impl FnOnce(&mut AppProgressRecord) -> R,
    ) -> EngineResult<(AppProgressRecord, R)> {
        let _guard = self.write_lock.lock();
        let key = storage_key(day, grid_size);
        let before = local_db_model::load::<AppProgressRecord>(self.store.as_ref(), &key)?
            .unwrap_or_else(|| AppProgressRecord::new(day, grid_size));

        let mut record = before.clone();
        let out = f(&mut record);
        if record != before {
            local_db_model::save(self.store.as_ref(), &key, &record)?;
            if record.completed {
                self.append_history(day, grid_size)?;
            }
        }
        Ok((record, out))
    }

    /// Drops found words and solved cells for the key. The completion history
    /// is kept, so the day still counts toward streaks.
    pub fn reset(&self, day: DayKey, grid_size: usize) -> EngineResult<()> {
        let _guard = self.write_lock.lock();
        if self.store.delete(&storage_key(day, grid_size))? {
            info!("Reset progress for {}", record_key(day, grid_size));
        }
        Ok(())
    }

    /// Sets the completion flag, creating an empty record if none exists.
    /// Found words are left untouched.
    pub fn mark_completed(&self, day: DayKey, grid_size: usize) -> EngineResult<()> {
        let _guard = self.write_lock.lock();
        let key = storage_key(day, grid_size);
        let mut record = local_db_model::load::<AppProgressRecord>(self.store.as_ref(), &key)?
            .unwrap_or_else(|| AppProgressRecord::new(day, grid_size));

        if !record.completed {
            let now = self.clock.now().with_timezone(&Utc);
            record.completed = true;
            record.completed_at = Some(now);
            record.updated_at = Some(now);
            local_db_model::save(self.store.as_ref(), &key, &record)?;
        }
        self.append_history(day, grid_size)
    }

    /// Days with at least one grid size ever completed.
    pub fn completed_day_offsets(&self) -> BTreeSet<DayKey> {
        let mut days: BTreeSet<DayKey> = match local_db_model::load_prefix::<CompletionHistory>(
            self.store.as_ref(),
            HISTORY_PREFIX,
        ) {
            Ok(history) => history.into_iter().map(|(_, h)| h.day).collect(),
            Err(e) => {
                warn!("Completion history unavailable: {e}");
                BTreeSet::new()
            }
        };

        // Records flagged complete by an older build that never wrote history.
        days.extend(
            self.load_records()
                .into_values()
                .filter(|r| r.completed)
                .map(|r| r.day),
        );
        days
    }

    fn append_history(&self, day: DayKey, grid_size: usize) -> EngineResult<()> {
        let key = history_key(day);
        let existing = local_db_model::load::<CompletionHistory>(self.store.as_ref(), &key)?;
        let history = match existing {
            Some(h) if h.grid_sizes.contains(&grid_size) => return Ok(()),
            Some(mut h) => {
                h.grid_sizes.insert(grid_size);
                h
            }
            None => CompletionHistory {
                day,
                grid_sizes: BTreeSet::from([grid_size]),
                first_completed_at: self.clock.now().with_timezone(&Utc),
            },
        };
        local_db_model::save(self.store.as_ref(), &key, &history)?;
        self.bump_revision()
    }

    /// Counter bumped every time the completion history changes. `None` when
    /// it cannot be read.
    pub fn history_revision(&self) -> Option<u64> {
        match local_db_model::load::<HistoryRevision>(self.store.as_ref(), REVISION_KEY) {
            Ok(revision) => Some(revision.map_or(0, |r| r.0)),
            Err(e) => {
                warn!("Completion revision unavailable: {e}");
                None
            }
        }
    }

    fn bump_revision(&self) -> EngineResult<()> {
        let current = local_db_model::load::<HistoryRevision>(self.store.as_ref(), REVISION_KEY)?
            .map_or(0, |r| r.0);
        local_db_model::save(
            self.store.as_ref(),
            REVISION_KEY,
            &HistoryRevision(current.wrapping_add(1)),
        )
    }
}

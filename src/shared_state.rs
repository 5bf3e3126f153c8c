//! Snapshot shared with the companion widget.
//!
//! The host app is the only writer; the widget only reads. The snapshot is one
//! value under one key and every save replaces it in a single transaction, so
//! a reader racing a write sees either the old or the new snapshot, never a
//! mix. The embedded rotation boundary stops the widget from showing
//! yesterday's progress after the day has turned over.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::calendar::{start_of_local_day, DayKey, DayKeyCalendar};
use crate::error::EngineResult;
use crate::generator::GridPosition;
use crate::local_db_model::{self, Versioned};
use crate::local_db_state::KeyValueStore;

const SHARED_KEY: &str = "shared:puzzle_state";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPuzzleState {
    pub puzzle_index: DayKey,
    pub grid_size: usize,
    pub found_words: BTreeSet<String>,
    pub solved_positions: BTreeSet<GridPosition>,
    pub rotation_boundary: DateTime<FixedOffset>,
}

impl SharedPuzzleState {
    pub fn empty(
        puzzle_index: DayKey,
        grid_size: usize,
        rotation_boundary: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            puzzle_index,
            grid_size,
            found_words: BTreeSet::new(),
            solved_positions: BTreeSet::new(),
            rotation_boundary,
        }
    }
}

impl Versioned for SharedPuzzleState {
    const SCHEMA_VERSION: u32 = 1;
}

fn local_instant(tz: &FixedOffset, day: NaiveDate, at: NaiveTime) -> DateTime<FixedOffset> {
    tz.from_local_datetime(&day.and_time(at))
        .earliest()
        .unwrap_or_else(|| start_of_local_day(tz, day))
}

/// Most recent instant at or before `now` where the local clock read
/// `refresh_time`. With the default refresh time of midnight this is the
/// start of the current local day.
pub fn current_rotation_boundary(
    now: &DateTime<FixedOffset>,
    refresh_time: NaiveTime,
) -> DateTime<FixedOffset> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = local_instant(&tz, today, refresh_time);
    if candidate <= *now {
        return candidate;
    }
    match today.pred_opt() {
        Some(yesterday) => local_instant(&tz, yesterday, refresh_time),
        None => candidate,
    }
}

pub struct SharedStateSync {
    store: Arc<dyn KeyValueStore>,
    calendar: Arc<DayKeyCalendar>,
    refresh_time: RwLock<NaiveTime>,
    write_lock: Mutex<()>,
}

impl SharedStateSync {
    pub fn new(store: Arc<dyn KeyValueStore>, calendar: Arc<DayKeyCalendar>) -> Self {
        Self {
            store,
            calendar,
            refresh_time: RwLock::new(NaiveTime::MIN),
            write_lock: Mutex::new(()),
        }
    }

    pub fn set_refresh_time(&self, refresh_time: NaiveTime) {
        *self.refresh_time.write() = refresh_time;
    }

    pub fn rotation_boundary(&self, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        current_rotation_boundary(now, *self.refresh_time.read())
    }

    /// Puzzle index active at `now`: the day key of the current boundary.
    pub fn active_index(&self, now: &DateTime<FixedOffset>) -> DayKey {
        self.calendar.day_key_at(&self.rotation_boundary(now))
    }

    fn stored(&self) -> Option<SharedPuzzleState> {
        match local_db_model::load::<SharedPuzzleState>(self.store.as_ref(), SHARED_KEY) {
            Ok(state) => state,
            Err(e) => {
                warn!("Shared puzzle state unavailable: {e}");
                None
            }
        }
    }

    /// Snapshot for the puzzle active at `now`. A snapshot saved before the
    /// current boundary, or for another index or grid size, is not carried
    /// over; a fresh empty state is returned instead.
    pub fn load_state(
        &self,
        now: &DateTime<FixedOffset>,
        preferred_grid_size: usize,
    ) -> SharedPuzzleState {
        let boundary = self.rotation_boundary(now);
        let index = self.calendar.day_key_at(&boundary);

        match self.stored() {
            Some(state)
                if state.puzzle_index == index
                    && state.grid_size == preferred_grid_size
                    && state.rotation_boundary >= boundary =>
            {
                state
            }
            Some(stale) => {
                debug!(
                    "Shared snapshot for day {} is stale, rotating to day {index}",
                    stale.puzzle_index
                );
                SharedPuzzleState::empty(index, preferred_grid_size, boundary)
            }
            None => SharedPuzzleState::empty(index, preferred_grid_size, boundary),
        }
    }

    pub fn save_state(&self, state: &SharedPuzzleState) -> EngineResult<()> {
        let _guard = self.write_lock.lock();
        local_db_model::save(self.store.as_ref(), SHARED_KEY, state)
    }

    /// Empties the snapshot if it belongs to `(puzzle_index, grid_size)`.
    pub fn clear_progress(&self, puzzle_index: DayKey, grid_size: usize) -> EngineResult<()> {
        let _guard = self.write_lock.lock();
        let stored = local_db_model::load::<SharedPuzzleState>(self.store.as_ref(), SHARED_KEY)?;
        match stored {
            Some(state) if state.puzzle_index == puzzle_index && state.grid_size == grid_size => {
                let cleared =
                    SharedPuzzleState::empty(puzzle_index, grid_size, state.rotation_boundary);
                local_db_model::save(self.store.as_ref(), SHARED_KEY, &cleared)
            }
            _ => Ok(()),
        }
    }
}

//! Consecutive-day streaks.
//!
//! The current streak is the run of completed days ending today, or ending
//! yesterday while today is still open. The best streak never goes down: it
//! is the maximum of the cached best, the longest run in history and the
//! current run.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::error::EngineResult;
use crate::local_db_model::{self, Versioned};
use crate::local_db_state::KeyValueStore;
use crate::progress::ProgressStore;

const STREAK_KEY: &str = "streak";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub best: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreakCache {
    streak: Streak,
    computed_for: DayKey,
    /// Completion-history revision the streak was computed from.
    #[serde(default)]
    revision: Option<u64>,
}

impl Versioned for StreakCache {
    const SCHEMA_VERSION: u32 = 1;
}

pub fn current_streak(completed: &BTreeSet<DayKey>, today: DayKey) -> u32 {
    let mut cursor = if completed.contains(&today) {
        Some(today)
    } else {
        today.previous()
    };

    let mut run = 0;
    while let Some(day) = cursor {
        if !completed.contains(&day) {
            break;
        }
        run += 1;
        cursor = day.previous();
    }
    run
}

pub fn longest_run(completed: &BTreeSet<DayKey>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut last: Option<DayKey> = None;

    for day in completed {
        run = match last {
            Some(prev) if prev.next() == *day => run + 1,
            _ => 1,
        };
        best = best.max(run);
        last = Some(*day);
    }
    best
}

pub struct StreakEngine {
    store: Arc<dyn KeyValueStore>,
    progress: Arc<ProgressStore>,
    lock: Mutex<()>,
}

impl StreakEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, progress: Arc<ProgressStore>) -> Self {
        Self {
            store,
            progress,
            lock: Mutex::new(()),
        }
    }

    /// Last persisted streak, without recomputing.
    pub fn cached(&self) -> Option<Streak> {
        self.load_cache().map(|c| c.streak)
    }

    fn load_cache(&self) -> Option<StreakCache> {
        match local_db_model::load::<StreakCache>(self.store.as_ref(), STREAK_KEY) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Streak cache unavailable: {e}");
                None
            }
        }
    }

    /// Streak as of `today`. The cached value is returned as is when it was
    /// computed for `today` and no completion has been recorded since.
    pub fn refresh(&self, today: DayKey) -> Streak {
        let _guard = self.lock.lock();
        let revision = self.progress.history_revision();
        let cache = self.load_cache();

        if let (Some(cache), Some(revision)) = (&cache, revision) {
            if cache.computed_for == today && cache.revision == Some(revision) {
                return cache.streak;
            }
        }

        let completed = self.progress.completed_day_offsets();
        let current = current_streak(&completed, today);
        let previous_best = cache.map_or(0, |c| c.streak.best);
        let streak = Streak {
            current,
            best: previous_best.max(longest_run(&completed)).max(current),
        };

        let cache = StreakCache {
            streak,
            computed_for: today,
            revision,
        };
        if let Err(e) = local_db_model::save(self.store.as_ref(), STREAK_KEY, &cache) {
            warn!("Streak cache not persisted: {e}");
        }
        debug!("Streak for day {today}: {streak:?}");
        streak
    }

    pub fn mark_completed(
        &self,
        day: DayKey,
        grid_size: usize,
        today: DayKey,
    ) -> EngineResult<Streak> {
        self.progress.mark_completed(day, grid_size)?;
        Ok(self.refresh(today))
    }
}

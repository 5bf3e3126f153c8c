//! The engine facade used by the host UI and the FFI layer.
//!
//! One call per user action: the facade resolves today, regenerates the
//! puzzle, records progress, refreshes streak and hints on completion, and
//! republishes the widget snapshot. The UI only renders what comes back.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::calendar::{Clock, DayKey, DayKeyCalendar};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::generator::{GridPosition, Puzzle, PuzzleGenerator};
use crate::hints::{HintEconomy, HintState};
use crate::local_db_state::{KeyValueStore, LmdbStore, MemoryStore};
use crate::progress::{AppProgressRecord, ProgressStore};
use crate::score::{score, Score};
use crate::settings::{check_grid_size, AppSettings, HintMode, SettingsStore};
use crate::shared_state::{SharedPuzzleState, SharedStateSync};
use crate::streak::{Streak, StreakEngine};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionOutcome {
    Found { word: String },
    AlreadyFound { word: String },
    /// The line is valid but spells none of the puzzle's words.
    NotAWord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub outcome: SelectionOutcome,
    pub score: Score,
    pub completed: bool,
    /// Present when this selection completed the puzzle.
    pub streak: Option<Streak>,
    pub reward_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintOutcome {
    pub cell: Option<GridPosition>,
    pub state: HintState,
}

pub struct PuzzleEngine {
    clock: Arc<dyn Clock>,
    calendar: Arc<DayKeyCalendar>,
    generator: PuzzleGenerator,
    progress: Arc<ProgressStore>,
    streaks: StreakEngine,
    hints: HintEconomy,
    shared: SharedStateSync,
    settings_store: SettingsStore,
    settings: RwLock<AppSettings>,
    publish_lock: Mutex<()>,
    stores: Vec<Arc<dyn KeyValueStore>>,
    persistent: bool,
}

impl PuzzleEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        shared_store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        let calendar = Arc::new(DayKeyCalendar::new(Arc::clone(&store), Arc::clone(&clock)));
        let progress = Arc::new(ProgressStore::new(Arc::clone(&store), Arc::clone(&clock)));
        let settings_store = SettingsStore::new(Arc::clone(&store));
        let settings = settings_store.load();

        let shared = SharedStateSync::new(Arc::clone(&shared_store), Arc::clone(&calendar));
        shared.set_refresh_time(settings.daily_refresh_time);

        Self {
            streaks: StreakEngine::new(Arc::clone(&store), Arc::clone(&progress)),
            hints: HintEconomy::new(Arc::clone(&store), config.hint_policy()),
            generator: PuzzleGenerator::new(config.placement_attempts),
            clock,
            calendar,
            progress,
            shared,
            settings_store,
            settings: RwLock::new(settings),
            publish_lock: Mutex::new(()),
            stores: vec![store, shared_store],
            persistent: true,
        }
    }

    /// Opens the LMDB stores named in `config`, or in-memory stores when it
    /// names none.
    pub fn open(config: &EngineConfig, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        config.validate()?;

        let Some(db_path) = &config.db_path else {
            let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
            let mut engine = Self::new(Arc::clone(&store), store, clock, config);
            engine.persistent = false;
            return Ok(engine);
        };

        let store: Arc<dyn KeyValueStore> =
            Arc::new(LmdbStore::open_with_map_size(db_path, config.map_size_mb)?);
        let shared_store: Arc<dyn KeyValueStore> = match &config.shared_db_path {
            Some(path) if path != db_path => {
                Arc::new(LmdbStore::open_with_map_size(path, config.map_size_mb)?)
            }
            _ => Arc::clone(&store),
        };
        Ok(Self::new(store, shared_store, clock, config))
    }

    /// Like [`open`](Self::open), but a backend that fails to open leaves the
    /// engine running in memory for this session. The error is handed back so
    /// the host can tell the user progress will not be kept.
    pub fn open_or_in_memory(
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<(Self, Option<EngineError>)> {
        config.validate()?;
        match Self::open(config, Arc::clone(&clock)) {
            Ok(engine) => Ok((engine, None)),
            Err(e @ EngineError::PersistenceUnavailable(_)) => {
                warn!("Falling back to in-memory storage: {e}");
                let fallback = EngineConfig {
                    db_path: None,
                    shared_db_path: None,
                    ..config.clone()
                };
                Ok((Self::open(&fallback, clock)?, Some(e)))
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn calendar(&self) -> &DayKeyCalendar {
        &self.calendar
    }

    /// Puzzle index active right now, honouring the daily refresh time.
    pub fn today_key(&self) -> DayKey {
        self.shared.active_index(&self.clock.now())
    }

    pub fn settings(&self) -> AppSettings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, settings: AppSettings) -> EngineResult<AppSettings> {
        let saved = self.settings_store.save(settings)?;
        self.shared.set_refresh_time(saved.daily_refresh_time);
        *self.settings.write() = saved.clone();
        Ok(saved)
    }

    /// Puzzle for `day` at `grid_size`. Sizes outside the supported range are
    /// rejected before anything is generated.
    pub fn puzzle(&self, day: DayKey, grid_size: usize) -> EngineResult<Arc<Puzzle>> {
        check_grid_size(grid_size)?;
        Ok(self.generator.puzzle(day, grid_size))
    }

    pub fn progress(&self, day: DayKey, grid_size: usize) -> EngineResult<AppProgressRecord> {
        check_grid_size(grid_size)?;
        Ok(self
            .progress
            .load_record(day, grid_size)
            .unwrap_or_else(|| AppProgressRecord::new(day, grid_size)))
    }

    pub fn score(&self, day: DayKey, grid_size: usize) -> EngineResult<Score> {
        let puzzle = self.puzzle(day, grid_size)?;
        Ok(score(&puzzle, &self.progress(day, grid_size)?.found_words))
    }

    /// Applies a drag from `start` to `end`. Out-of-grid cells are rejected
    /// with [`EngineError::InvalidSelection`] and change nothing; lines that
    /// spell nothing or repeat a found word are reported, not errors.
    pub fn submit_selection(
        &self,
        day: DayKey,
        grid_size: usize,
        start: GridPosition,
        end: GridPosition,
    ) -> EngineResult<SelectionResult> {
        let puzzle = self.puzzle(day, grid_size)?;

        let Some(placed) = puzzle.resolve_selection(start, end)? else {
            let record = self.progress(day, grid_size)?;
            return Ok(self.unchanged(SelectionOutcome::NotAWord, &puzzle, &record));
        };

        let now = self.clock.now().with_timezone(&Utc);
        let (record, (outcome, newly_completed)) =
            self.progress.update(day, grid_size, |record| {
                if record.found_words.contains(&placed.word) {
                    let outcome = SelectionOutcome::AlreadyFound {
                        word: placed.word.clone(),
                    };
                    return (outcome, false);
                }

                record.found_words.insert(placed.word.clone());
                record
                    .solved_positions
                    .extend(placed.positions(puzzle.size));
                record.started_at.get_or_insert(now);
                record.updated_at = Some(now);

                let newly_completed =
                    score(&puzzle, &record.found_words).is_complete() && !record.completed;
                if newly_completed {
                    record.completed = true;
                    record.completed_at = Some(now);
                }
                let outcome = SelectionOutcome::Found {
                    word: placed.word.clone(),
                };
                (outcome, newly_completed)
            })?;

        if matches!(outcome, SelectionOutcome::AlreadyFound { .. }) {
            return Ok(self.unchanged(outcome, &puzzle, &record));
        }

        let mut streak = None;
        let mut reward_granted = false;
        if newly_completed {
            let today = self.today_key();
            info!("Completed day {day} at {grid_size}x{grid_size}");
            streak = Some(self.streaks.refresh(today));
            reward_granted = self.hints.reward_completion(day, today)?;
        }

        self.publish(day, grid_size)?;

        Ok(SelectionResult {
            outcome,
            score: score(&puzzle, &record.found_words),
            completed: record.completed,
            streak,
            reward_granted,
        })
    }

    fn unchanged(
        &self,
        outcome: SelectionOutcome,
        puzzle: &Puzzle,
        record: &AppProgressRecord,
    ) -> SelectionResult {
        SelectionResult {
            outcome,
            score: score(puzzle, &record.found_words),
            completed: record.completed,
            streak: None,
            reward_granted: false,
        }
    }

    /// Mirrors the stored record for `(day, grid_size)` into the widget
    /// snapshot when that day is the puzzle currently on rotation. The record
    /// is re-read under the publish lock, so the last publisher always writes
    /// the latest progress.
    fn publish(&self, day: DayKey, grid_size: usize) -> EngineResult<()> {
        let _guard = self.publish_lock.lock();
        let now = self.clock.now();
        if day != self.shared.active_index(&now) {
            return Ok(());
        }
        let record = self
            .progress
            .load_record(day, grid_size)
            .unwrap_or_else(|| AppProgressRecord::new(day, grid_size));
        let mut state =
            SharedPuzzleState::empty(day, grid_size, self.shared.rotation_boundary(&now));
        state.found_words = record.found_words;
        state.solved_positions = record.solved_positions;
        self.shared.save_state(&state)
    }

    /// Clears progress for the puzzle and its widget snapshot. A day already
    /// completed stays in the streak history.
    pub fn restart(&self, day: DayKey, grid_size: usize) -> EngineResult<()> {
        check_grid_size(grid_size)?;
        let _guard = self.publish_lock.lock();
        self.progress.reset(day, grid_size)?;
        self.shared.clear_progress(day, grid_size)
    }

    /// Reveals the first cell of the next unfound word, charging the daily
    /// budget when hints are limited. Nothing is charged when there is
    /// nothing left to reveal.
    pub fn use_hint(&self, day: DayKey, grid_size: usize) -> EngineResult<HintOutcome> {
        let today = self.today_key();
        let puzzle = self.puzzle(day, grid_size)?;
        let target = puzzle.hint_cell(&self.progress(day, grid_size)?.found_words);

        let cell = match (self.settings.read().hint_mode, target) {
            (HintMode::Disabled, _) | (_, None) => None,
            (HintMode::Unlimited, Some(cell)) => Some(cell),
            (HintMode::Limited, Some(cell)) => {
                if self.hints.spend_hint(today)? {
                    Some(cell)
                } else {
                    None
                }
            }
        };

        Ok(HintOutcome {
            cell,
            state: self.hints.state(today),
        })
    }

    pub fn hint_state(&self) -> HintState {
        self.hints.state(self.today_key())
    }

    pub fn streak(&self) -> Streak {
        self.streaks.refresh(self.today_key())
    }

    pub fn shared_state(&self, preferred_grid_size: usize) -> EngineResult<SharedPuzzleState> {
        check_grid_size(preferred_grid_size)?;
        Ok(self.shared.load_state(&self.clock.now(), preferred_grid_size))
    }

    pub fn flush(&self) -> EngineResult<()> {
        for store in &self.stores {
            store.flush()?;
        }
        Ok(())
    }
}

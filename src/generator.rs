//! Deterministic daily puzzle generation.
//!
//! A puzzle is a pure function of `(day, grid size)`. The RNG is ChaCha8 seeded
//! from an xxh3 hash of those two values, and every draw is taken from a `u32`
//! range, so two devices (or the app and its widget) produce the same grid and
//! word list without talking to each other.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::calendar::DayKey;
use crate::dictionary;
use crate::error::{EngineError, EngineResult};

pub const MIN_WORD_LEN: usize = 3;
pub const MAX_WORDS_PER_PUZZLE: usize = 12;
pub const DEFAULT_PLACEMENT_ATTEMPTS: usize = 200;
const SEED_NAMESPACE: &str = "daily-wordsearch/v1";
const MAX_CACHED_PUZZLES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

impl GridPosition {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    fn offset(self, dr: isize, dc: isize, steps: usize, size: usize) -> Option<GridPosition> {
        let steps = isize::try_from(steps).ok()?;
        let row = isize::try_from(self.row).ok()? + dr * steps;
        let col = isize::try_from(self.col).ok()? + dc * steps;
        let row = usize::try_from(row).ok().filter(|r| *r < size)?;
        let col = usize::try_from(col).ok().filter(|c| *c < size)?;
        Some(GridPosition { row, col })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    East,
    West,
    South,
    North,
    SouthEast,
    NorthWest,
    SouthWest,
    NorthEast,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
        Direction::SouthEast,
        Direction::NorthWest,
        Direction::SouthWest,
        Direction::NorthEast,
    ];

    /// `(row, col)` step.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::East => (0, 1),
            Direction::West => (0, -1),
            Direction::South => (1, 0),
            Direction::North => (-1, 0),
            Direction::SouthEast => (1, 1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthWest => (1, -1),
            Direction::NorthEast => (-1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedWord {
    pub word: String,
    pub start: GridPosition,
    pub direction: Direction,
    pub length: usize,
}

impl PlacedWord {
    /// Cells covered by the word, first letter first. Empty if the placement
    /// leaves a grid of `size`.
    pub fn positions(&self, size: usize) -> Vec<GridPosition> {
        cell_path(self.start, self.direction, self.length, size).unwrap_or_default()
    }

    pub fn end(&self, size: usize) -> Option<GridPosition> {
        let (dr, dc) = self.direction.delta();
        self.start.offset(dr, dc, self.length.checked_sub(1)?, size)
    }
}

fn cell_path(
    start: GridPosition,
    direction: Direction,
    length: usize,
    size: usize,
) -> Option<Vec<GridPosition>> {
    let (dr, dc) = direction.delta();
    (0..length)
        .map(|i| start.offset(dr, dc, i, size))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub day: DayKey,
    pub size: usize,
    pub grid: Vec<Vec<char>>,
    pub words: Vec<PlacedWord>,
}

impl Puzzle {
    pub fn letter_at(&self, pos: GridPosition) -> Option<char> {
        self.grid.get(pos.row)?.get(pos.col).copied()
    }

    pub fn word_list(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|w| w.word.as_str())
    }

    fn check_bounds(&self, pos: GridPosition) -> EngineResult<()> {
        if pos.row >= self.size || pos.col >= self.size {
            return Err(EngineError::InvalidSelection {
                row: pos.row,
                col: pos.col,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Maps a drag from `start` to `end` onto a placed word. Either reading
    /// direction matches. Lines that are not horizontal, vertical or diagonal,
    /// or that cover no placed word, resolve to `None`.
    pub fn resolve_selection(
        &self,
        start: GridPosition,
        end: GridPosition,
    ) -> EngineResult<Option<&PlacedWord>> {
        self.check_bounds(start)?;
        self.check_bounds(end)?;

        let dr = end.row.abs_diff(start.row);
        let dc = end.col.abs_diff(start.col);
        if dr != 0 && dc != 0 && dr != dc {
            return Ok(None);
        }

        Ok(self.words.iter().find(|w| match w.end(self.size) {
            Some(word_end) => {
                (w.start == start && word_end == end) || (w.start == end && word_end == start)
            }
            None => false,
        }))
    }

    /// First cell of the first word, in list order, that is not yet found.
    pub fn hint_cell(&self, found: &BTreeSet<String>) -> Option<GridPosition> {
        self.words
            .iter()
            .find(|w| !found.contains(&w.word))
            .map(|w| w.start)
    }

    /// Checks the structural invariants every generated puzzle must hold.
    pub fn validate(&self) -> EngineResult<()> {
        if self.grid.len() != self.size || self.grid.iter().any(|row| row.len() != self.size) {
            return Err(EngineError::InvalidGrid(format!(
                "grid is not {0}x{0}",
                self.size
            )));
        }
        if let Some(bad) = self.grid.iter().flatten().find(|c| !c.is_ascii_uppercase()) {
            return Err(EngineError::InvalidGrid(format!("unexpected cell '{bad}'")));
        }

        let mut seen = HashSet::new();
        for placed in &self.words {
            if !seen.insert(placed.word.as_str()) {
                return Err(EngineError::InvalidGrid(format!(
                    "duplicate word {}",
                    placed.word
                )));
            }
            if placed.length != placed.word.chars().count() || placed.length < MIN_WORD_LEN {
                return Err(EngineError::InvalidGrid(format!(
                    "bad length for {}",
                    placed.word
                )));
            }
            let path = cell_path(placed.start, placed.direction, placed.length, self.size)
                .ok_or_else(|| {
                    EngineError::InvalidGrid(format!("{} leaves the grid", placed.word))
                })?;
            for (pos, expected) in path.into_iter().zip(placed.word.chars()) {
                if self.letter_at(pos) != Some(expected) {
                    return Err(EngineError::InvalidGrid(format!(
                        "{} does not read from the grid at ({}, {})",
                        placed.word, pos.row, pos.col
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Seed for `(day, size)`. Stable across platforms and releases.
pub fn puzzle_seed(day: DayKey, size: usize) -> u64 {
    xxh3_64(format!("{SEED_NAMESPACE}:{}:{size}", day.get()).as_bytes())
}

pub fn words_per_puzzle(size: usize) -> usize {
    if size < MIN_WORD_LEN {
        return 0;
    }
    (size - 1).min(MAX_WORDS_PER_PUZZLE)
}

/// Maps an arbitrary navigation index onto a playable day. Indices clamp to
/// `[0, today]`: nothing before installation, nothing from the future.
pub fn normalized_puzzle_index(index: i64, today: DayKey) -> DayKey {
    let max = i64::from(today.get());
    DayKey(u32::try_from(index.clamp(0, max)).unwrap_or(today.get()))
}

fn draw(rng: &mut ChaCha8Rng, upper: usize) -> usize {
    let upper = u32::try_from(upper).unwrap_or(u32::MAX);
    rng.random_range(0..upper) as usize
}

fn try_place(
    rng: &mut ChaCha8Rng,
    cells: &mut [Vec<Option<char>>],
    word: &str,
    size: usize,
    attempts: usize,
) -> Option<PlacedWord> {
    let letters: Vec<char> = word.chars().collect();

    for _ in 0..attempts {
        let direction = Direction::ALL[draw(rng, Direction::ALL.len())];
        let start = GridPosition::new(draw(rng, size), draw(rng, size));
        let Some(path) = cell_path(start, direction, letters.len(), size) else {
            continue;
        };

        let fits = path
            .iter()
            .zip(&letters)
            .all(|(p, ch)| cells[p.row][p.col].map_or(true, |c| c == *ch));
        // A placement lying entirely on existing letters would make two words
        // share one line.
        let adds_letters = path.iter().any(|p| cells[p.row][p.col].is_none());
        if !fits || !adds_letters {
            continue;
        }

        for (p, ch) in path.iter().zip(&letters) {
            cells[p.row][p.col] = Some(*ch);
        }
        return Some(PlacedWord {
            word: word.to_string(),
            start,
            direction,
            length: letters.len(),
        });
    }
    None
}

/// Builds the puzzle for `(day, size)`. Never fails: words that cannot be
/// placed within `attempts` tries are dropped, and grids too small for any
/// word come back filled but with an empty word list.
pub fn generate(day: DayKey, size: usize, attempts: usize) -> Puzzle {
    let mut rng = ChaCha8Rng::seed_from_u64(puzzle_seed(day, size));
    let mut cells: Vec<Vec<Option<char>>> = vec![vec![None; size]; size];
    let mut words = Vec::new();

    let target = words_per_puzzle(size);
    let mut pool: Vec<&'static str> = dictionary::words_fitting(size, MIN_WORD_LEN).collect();

    while words.len() < target && !pool.is_empty() {
        let word = pool.swap_remove(draw(&mut rng, pool.len()));
        match try_place(&mut rng, &mut cells, word, size, attempts) {
            Some(placed) => words.push(placed),
            None => debug!("Dropped {word} from day {day} ({size}x{size})"),
        }
    }

    let grid = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.unwrap_or_else(|| char::from(b'A' + draw(&mut rng, 26) as u8)))
                .collect()
        })
        .collect();

    Puzzle {
        day,
        size,
        grid,
        words,
    }
}

/// Puzzle source with a small memo. Generation is pure, so two threads
/// racing on the same key just produce the same value twice.
pub struct PuzzleGenerator {
    attempts: usize,
    cache: RwLock<HashMap<(DayKey, usize), Arc<Puzzle>>>,
}

impl Default for PuzzleGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEMENT_ATTEMPTS)
    }
}

impl PuzzleGenerator {
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts: attempts.max(1),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn puzzle(&self, day: DayKey, size: usize) -> Arc<Puzzle> {
        if let Some(hit) = self.cache.read().get(&(day, size)) {
            return Arc::clone(hit);
        }

        let puzzle = Arc::new(generate(day, size, self.attempts));
        debug_assert!(puzzle.validate().is_ok(), "generator broke a grid invariant");

        let mut cache = self.cache.write();
        if cache.len() >= MAX_CACHED_PUZZLES {
            cache.clear();
        }
        Arc::clone(cache.entry((day, size)).or_insert(puzzle))
    }
}

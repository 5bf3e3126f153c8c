use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::generator::Puzzle;

/// Progress through one puzzle. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub total_words: usize,
    pub found_words: usize,
    /// `found_words / total_words` in `[0, 1]`; `0` for a puzzle with no words.
    pub percentage: f64,
}

impl Score {
    pub fn is_complete(&self) -> bool {
        self.total_words > 0 && self.found_words == self.total_words
    }
}

/// Found words that are not part of `puzzle` are ignored.
pub fn score(puzzle: &Puzzle, found: &BTreeSet<String>) -> Score {
    let total_words = puzzle.words.len();
    let found_words = puzzle
        .word_list()
        .filter(|w| found.contains(*w))
        .count();
    let percentage = if total_words == 0 {
        0.0
    } else {
        found_words as f64 / total_words as f64
    };

    Score {
        total_words,
        found_words,
        percentage,
    }
}

//! # Daily Word-Search Core
//!
//! Offline-first domain engine for a daily word-search app, designed for FFI
//! integration with a native host app and its home-screen widget. State lives
//! in LMDB so both processes can open the same environment.
//!
//! ## Features
//!
//! - **Deterministic puzzles**: every device builds the same grid for a given
//!   day and grid size, with no network and no stored puzzle
//! - **Calendar day keys**: days are counted in local calendar days since
//!   installation, stable across daylight-saving changes
//! - **Progress, streaks and hints**: per-day records, monotonic best streak,
//!   a daily hint budget with a once-per-day completion bonus
//! - **Widget snapshot**: a single atomically replaced value with a daily
//!   rotation boundary
//! - **Safe error handling**: no `unwrap()` calls in production code
//!
//! ## Quick Start
//!
//! ```no_run
//! use daily_wordsearch_core::{create_engine, engine_today, free_c_string};
//! use std::ffi::CString;
//!
//! let config = CString::new(r#"{"db_path":"wordsearch_data"}"#).unwrap();
//! let engine = create_engine(config.as_ptr());
//!
//! let today = engine_today(engine);
//! free_c_string(today as *mut _);
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_engine`] - Open the stores and build an engine
//! - [`engine_today`] - Today's puzzle, progress and score
//! - [`engine_puzzle`] - Any day's puzzle
//! - [`engine_submit_selection`] - Apply a drag across the grid
//! - [`engine_restart`] - Clear a puzzle's progress
//! - [`engine_use_hint`] - Reveal a cell, charging the hint budget
//! - [`engine_streak`] - Current and best streak
//! - [`engine_shared_state`] - Widget snapshot
//! - [`engine_settings`] / [`engine_update_settings`] - App settings
//! - [`free_c_string`] - Release a string returned by this library
//! - [`close_engine`] - Flush and release the engine

pub mod calendar;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod generator;
pub mod hints;
pub mod local_db_model;
pub mod local_db_state;
pub mod progress;
pub mod score;
pub mod settings;
pub mod shared_state;
pub mod streak;
mod app_response;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::calendar::{DayKey, SystemClock};
use crate::config::EngineConfig;
use crate::engine::PuzzleEngine;
use crate::generator::{GridPosition, Puzzle};
use crate::progress::AppProgressRecord;
use crate::score::{score, Score};
use crate::settings::AppSettings;

pub use crate::error::{EngineError, EngineResult};

/// Payload of [`engine_today`].
#[derive(Debug, Serialize)]
struct TodayView<'a> {
    day: DayKey,
    puzzle: &'a Puzzle,
    progress: AppProgressRecord,
    score: Score,
}

/// Payload accepted by [`engine_submit_selection`].
#[derive(Debug, Deserialize)]
struct SelectionRequest {
    day: DayKey,
    grid_size: usize,
    start: GridPosition,
    end: GridPosition,
}

/// Creates an engine from a JSON [`EngineConfig`].
///
/// If the LMDB environment cannot be opened the engine still starts, backed
/// by memory for this session, and a warning is logged. Progress made in that
/// state is lost on exit.
///
/// # Parameters
///
/// * `config_json` - A null-terminated C string containing the configuration
///
/// # Returns
///
/// Returns a pointer to the [`PuzzleEngine`] on success, or a null pointer if
/// the pointer is null, the string is not valid UTF-8 or the configuration is
/// rejected. Release it with [`close_engine`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use daily_wordsearch_core::create_engine;
///
/// let config = CString::new(r#"{"db_path":"wordsearch_data","daily_hint_allotment":3}"#).unwrap();
/// let engine = create_engine(config.as_ptr());
///
/// if !engine.is_null() {
///     // Engine ready
/// }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_engine(config_json: *const c_char) -> *mut PuzzleEngine {
    if config_json.is_null() {
        warn!("Null config pointer passed to create_engine");
        return std::ptr::null_mut();
    }

    let json = match unsafe { CStr::from_ptr(config_json).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = match EngineConfig::from_json(json) {
        Ok(config) => config,
        Err(e) => {
            warn!("❌ Rejected engine configuration: {e}");
            return std::ptr::null_mut();
        }
    };

    match PuzzleEngine::open_or_in_memory(&config, Arc::new(SystemClock)) {
        Ok((engine, degraded)) => {
            match degraded {
                None => info!("✅ Engine initialized successfully"),
                Some(e) => warn!("Engine running without persistence: {e}"),
            }
            Box::into_raw(Box::new(engine))
        }
        Err(e) => {
            warn!("❌ Failed to initialize engine: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Returns today's puzzle together with its saved progress and score.
///
/// The grid size comes from the saved settings.
///
/// # Safety
///
/// `engine` must be a pointer returned by [`create_engine`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_today(engine: *mut PuzzleEngine) -> *const c_char {
    let engine = match engine_ref(engine, "engine_today") {
        Ok(e) => e,
        Err(err) => return err,
    };

    let day = engine.today_key();
    let grid_size = engine.settings().grid_size;
    let puzzle = match engine.puzzle(day, grid_size) {
        Ok(p) => p,
        Err(e) => return response_to_c_string(&AppResponse::from(e)),
    };
    let progress = match engine.progress(day, grid_size) {
        Ok(p) => p,
        Err(e) => return response_to_c_string(&AppResponse::from(e)),
    };
    let view = TodayView {
        day,
        puzzle: &puzzle,
        score: score(&puzzle, &progress.found_words),
        progress,
    };
    ok_json(&view)
}

/// Returns the puzzle for `day` at `grid_size`. Pure: the same arguments
/// always produce the same grid. Sizes outside 5..=12 return a
/// `ValidationError`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_puzzle(engine: *mut PuzzleEngine, day: u32, grid_size: u32) -> *const c_char {
    let engine = match engine_ref(engine, "engine_puzzle") {
        Ok(e) => e,
        Err(err) => return err,
    };
    match engine.puzzle(DayKey(day), grid_size as usize) {
        Ok(puzzle) => ok_json(puzzle.as_ref()),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Applies a selection across the grid.
///
/// # JSON Format
///
/// ```json
/// {
///   "day": 12,
///   "grid_size": 8,
///   "start": { "row": 0, "col": 0 },
///   "end": { "row": 0, "col": 4 }
/// }
/// ```
///
/// # Returns
///
/// The serialized [`SelectionResult`](crate::engine::SelectionResult), or a
/// `ValidationError` when a cell lies outside the grid.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_submit_selection(
    engine: *mut PuzzleEngine,
    json_ptr: *const c_char,
) -> *const c_char {
    let engine = match engine_ref(engine, "engine_submit_selection") {
        Ok(e) => e,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let request: SelectionRequest = match serde_json::from_str(&json_str) {
        Ok(r) => r,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match engine.submit_selection(request.day, request.grid_size, request.start, request.end) {
        Ok(result) => ok_json(&result),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Clears found words and solved cells for a puzzle. Completed days stay
/// counted toward the streak.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_restart(engine: *mut PuzzleEngine, day: u32, grid_size: u32) -> *const c_char {
    let engine = match engine_ref(engine, "engine_restart") {
        Ok(e) => e,
        Err(err) => return err,
    };

    match engine.restart(DayKey(day), grid_size as usize) {
        Ok(()) => response_to_c_string(&AppResponse::success(format!(
            "Puzzle {day}:{grid_size} restarted"
        ))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Reveals the first cell of the next unfound word.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_use_hint(engine: *mut PuzzleEngine, day: u32, grid_size: u32) -> *const c_char {
    let engine = match engine_ref(engine, "engine_use_hint") {
        Ok(e) => e,
        Err(err) => return err,
    };

    match engine.use_hint(DayKey(day), grid_size as usize) {
        Ok(outcome) => ok_json(&outcome),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_streak(engine: *mut PuzzleEngine) -> *const c_char {
    let engine = match engine_ref(engine, "engine_streak") {
        Ok(e) => e,
        Err(err) => return err,
    };
    ok_json(&engine.streak())
}

/// Returns the widget snapshot for the puzzle on rotation now.
///
/// Meant for the widget process, which opens the same shared directory and
/// only ever reads.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_shared_state(engine: *mut PuzzleEngine, grid_size: u32) -> *const c_char {
    let engine = match engine_ref(engine, "engine_shared_state") {
        Ok(e) => e,
        Err(err) => return err,
    };
    match engine.shared_state(grid_size as usize) {
        Ok(state) => ok_json(&state),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_settings(engine: *mut PuzzleEngine) -> *const c_char {
    let engine = match engine_ref(engine, "engine_settings") {
        Ok(e) => e,
        Err(err) => return err,
    };
    ok_json(&engine.settings())
}

/// Saves new settings. Out-of-range fields are clamped; the stored result
/// is returned.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn engine_update_settings(
    engine: *mut PuzzleEngine,
    json_ptr: *const c_char,
) -> *const c_char {
    let engine = match engine_ref(engine, "engine_update_settings") {
        Ok(e) => e,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let settings: AppSettings = match serde_json::from_str(&json_str) {
        Ok(s) => s,
        Err(e) => return response_to_c_string(&AppResponse::from(e)),
    };

    match engine.update_settings(settings) {
        Ok(saved) => ok_json(&saved),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Releases a string returned by any function in this library.
///
/// # Safety
///
/// `ptr` must come from this library and must not be used afterwards.
/// Passing null is a no-op.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_c_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}

/// Flushes the stores and releases the engine.
///
/// Call before a hot restart or when the host shuts down. The pointer must
/// not be used afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_engine(engine: *mut PuzzleEngine) -> *const c_char {
    if engine.is_null() {
        let error = AppResponse::BadRequest("Null engine pointer passed to close_engine".to_string());
        return response_to_c_string(&error);
    }

    let engine = unsafe { Box::from_raw(engine) };
    let flushed = engine.flush();
    drop(engine);

    match flushed {
        Ok(()) => response_to_c_string(&AppResponse::success("Engine closed successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

fn engine_ref<'a>(engine: *mut PuzzleEngine, caller: &str) -> Result<&'a PuzzleEngine, *const c_char> {
    match unsafe { engine.as_ref() } {
        Some(e) => Ok(e),
        None => {
            let error = AppResponse::BadRequest(format!("Null engine pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Serializes `value` into an `Ok` envelope.
fn ok_json<T: Serialize + ?Sized>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Failed to serialize result: {e}"));
            response_to_c_string(&error)
        }
    }
}

/// Converts an [`AppResponse`] to a C string owned by the caller (release
/// with [`free_c_string`]). Null if serialization fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String, answering null pointers and
/// invalid UTF-8 with a `BadRequest` envelope.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

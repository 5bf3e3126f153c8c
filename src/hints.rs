//! Daily hint budget.
//!
//! State is keyed by today's day key. A day with no stored state has the full
//! allotment and an unclaimed reward, so rolling over to a new day resets the
//! budget without any migration step.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::calendar::DayKey;
use crate::error::EngineResult;
use crate::local_db_model::{self, Versioned};
use crate::local_db_state::KeyValueStore;

pub const DEFAULT_DAILY_ALLOTMENT: u32 = 3;
pub const DEFAULT_COMPLETION_BONUS: u32 = 1;

const HINT_PREFIX: &str = "hints:";

fn hint_key(today: DayKey) -> String {
    format!("{HINT_PREFIX}{}", today.get())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintPolicy {
    pub daily_allotment: u32,
    pub completion_bonus: u32,
}

impl Default for HintPolicy {
    fn default() -> Self {
        Self {
            daily_allotment: DEFAULT_DAILY_ALLOTMENT,
            completion_bonus: DEFAULT_COMPLETION_BONUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintState {
    pub remaining: u32,
    pub reward_claimed: bool,
    /// Day whose completion earned today's reward.
    pub rewarded_day: Option<DayKey>,
}

impl HintState {
    /// State of a day nobody has touched yet.
    pub fn fresh(policy: &HintPolicy) -> Self {
        Self {
            remaining: policy.daily_allotment,
            reward_claimed: false,
            rewarded_day: None,
        }
    }
}

impl Versioned for HintState {
    const SCHEMA_VERSION: u32 = 1;
}

pub struct HintEconomy {
    store: Arc<dyn KeyValueStore>,
    policy: HintPolicy,
    lock: Mutex<()>,
}

impl HintEconomy {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: HintPolicy) -> Self {
        Self {
            store,
            policy,
            lock: Mutex::new(()),
        }
    }

    pub fn state(&self, today: DayKey) -> HintState {
        match local_db_model::load::<HintState>(self.store.as_ref(), &hint_key(today)) {
            Ok(state) => state.unwrap_or_else(|| HintState::fresh(&self.policy)),
            Err(e) => {
                warn!("Hint state unavailable, assuming a fresh day: {e}");
                HintState::fresh(&self.policy)
            }
        }
    }

    /// Stored state for `today`, and whether it existed before this call.
    fn stored_state(&self, today: DayKey) -> EngineResult<(HintState, bool)> {
        let stored = local_db_model::load::<HintState>(self.store.as_ref(), &hint_key(today))?;
        let existed = stored.is_some();
        Ok((stored.unwrap_or_else(|| HintState::fresh(&self.policy)), existed))
    }

    /// Saves `today`'s state. The first write of a new day drops the entries
    /// of earlier days.
    fn persist(&self, today: DayKey, state: &HintState, existed: bool) -> EngineResult<()> {
        local_db_model::save(self.store.as_ref(), &hint_key(today), state)?;
        if !existed {
            self.prune_before(today);
        }
        Ok(())
    }

    fn prune_before(&self, today: DayKey) {
        let entries = match self.store.scan_prefix(HINT_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping hint pruning: {e}");
                return;
            }
        };
        for (key, _) in entries {
            let Some(day) = key
                .strip_prefix(HINT_PREFIX)
                .and_then(|d| d.parse::<u32>().ok())
            else {
                continue;
            };
            if day >= today.get() {
                continue;
            }
            match self.store.delete(&key) {
                Ok(_) => debug!("Pruned hint state for day {day}"),
                Err(e) => warn!("Failed to prune {key}: {e}"),
            }
        }
    }

    /// Takes one hint. `Ok(false)` when the balance is already zero.
    pub fn spend_hint(&self, today: DayKey) -> EngineResult<bool> {
        let _guard = self.lock.lock();
        let (mut state, existed) = self.stored_state(today)?;
        if state.remaining == 0 {
            return Ok(false);
        }
        state.remaining -= 1;
        self.persist(today, &state, existed)?;
        Ok(true)
    }

    /// Grants the completion bonus for finishing `day`, once per `today`.
    /// Replaying a completion returns `Ok(false)` and changes nothing.
    pub fn reward_completion(&self, day: DayKey, today: DayKey) -> EngineResult<bool> {
        let _guard = self.lock.lock();
        let (mut state, existed) = self.stored_state(today)?;
        if state.reward_claimed {
            return Ok(false);
        }
        state.remaining = state.remaining.saturating_add(self.policy.completion_bonus);
        state.reward_claimed = true;
        state.rewarded_day = Some(day);
        self.persist(today, &state, existed)?;
        info!("Granted {} bonus hint(s) for day {day}", self.policy.completion_bonus);
        Ok(true)
    }

    pub fn was_rewarded(&self, today: DayKey) -> bool {
        self.state(today).reward_claimed
    }
}

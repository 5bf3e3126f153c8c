//! Day keys and the installation anchor.
//!
//! A [`DayKey`] counts whole local calendar days since the app was first
//! launched. Differences are taken between calendar dates, never between
//! instants divided by 86 400, so a daylight-saving shift cannot move a
//! timestamp onto a neighbouring key.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Days, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::local_db_model::{self, Versioned};
use crate::local_db_state::KeyValueStore;

const INSTALLATION_KEY: &str = "meta:installation_date";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DayKey(pub u32);

impl DayKey {
    pub const ZERO: DayKey = DayKey(0);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn previous(self) -> Option<DayKey> {
        self.0.checked_sub(1).map(DayKey)
    }

    pub fn next(self) -> DayKey {
        DayKey(self.0.saturating_add(1))
    }
}

impl Display for DayKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of "now". Everything time-dependent in the engine asks a clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the device's local timezone.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Settable clock for tests and previews.
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}

/// Whole calendar days from `install` to `target`, each read in its own
/// local offset. Targets before the install day clamp to day 0.
pub fn day_offset<A: TimeZone, B: TimeZone>(install: &DateTime<A>, target: &DateTime<B>) -> DayKey {
    let days = target
        .date_naive()
        .signed_duration_since(install.date_naive())
        .num_days();
    if days <= 0 {
        return DayKey::ZERO;
    }
    DayKey(u32::try_from(days).unwrap_or(u32::MAX))
}

/// Start of the local day `key` days after `install`, in `install`'s zone.
/// Left inverse of [`day_offset`].
pub fn date<Tz: TimeZone>(install: &DateTime<Tz>, key: DayKey) -> DateTime<Tz> {
    let day = install
        .date_naive()
        .checked_add_days(Days::new(u64::from(key.0)))
        .unwrap_or(NaiveDate::MAX);
    start_of_local_day(&install.timezone(), day)
}

/// First existing instant of `day` in `tz`. Zones that skip midnight on a
/// transition day start at the first hour that exists.
pub fn start_of_local_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Tz> {
    for hour in 0..24 {
        let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
            continue;
        };
        if let Some(start) = tz.from_local_datetime(&day.and_time(time)).earliest() {
            return start;
        }
    }
    tz.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstallationRecord {
    installed_at: DateTime<FixedOffset>,
}

impl Versioned for InstallationRecord {
    const SCHEMA_VERSION: u32 = 1;
}

/// Resolves day keys against the persisted first-launch timestamp.
pub struct DayKeyCalendar {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    installed_at: Mutex<Option<DateTime<FixedOffset>>>,
}

impl DayKeyCalendar {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            installed_at: Mutex::new(None),
        }
    }

    /// The first-launch timestamp. Written once, the first time it is asked
    /// for; an existing value is never replaced. If storage is unavailable the
    /// current time is used for this session without being persisted.
    pub fn installation_date(&self) -> DateTime<FixedOffset> {
        let mut cached = self.installed_at.lock();
        if let Some(at) = *cached {
            return at;
        }

        let resolved = match local_db_model::load::<InstallationRecord>(
            self.store.as_ref(),
            INSTALLATION_KEY,
        ) {
            Ok(Some(record)) => record.installed_at,
            Ok(None) => {
                let record = InstallationRecord {
                    installed_at: self.clock.now(),
                };
                match local_db_model::save(self.store.as_ref(), INSTALLATION_KEY, &record) {
                    Ok(()) => info!("Recorded installation date {}", record.installed_at),
                    Err(e) => warn!("Installation date kept in memory only: {e}"),
                }
                record.installed_at
            }
            Err(e) => {
                // Do not write: the stored anchor may still exist once the
                // backend comes back.
                warn!("Installation date unreadable, using now for this session: {e}");
                return self.clock.now();
            }
        };

        *cached = Some(resolved);
        resolved
    }

    pub fn today_key(&self) -> DayKey {
        self.day_key_at(&self.clock.now())
    }

    pub fn day_key_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> DayKey {
        day_offset(&self.installation_date(), at)
    }

    pub fn date_for(&self, key: DayKey) -> DateTime<FixedOffset> {
        date(&self.installation_date(), key)
    }
}

//! Bucket time alignment
//!
//! A bucket is the wall-clock start of the rotation interval an instant
//! falls into. Truncation happens on the wall clock of the configured zone
//! as if that wall clock were UTC, so a one-day interval in `UTC+3` starts
//! at local midnight rather than at 03:00 local. This is intended: buckets
//! follow civil time whenever the interval and the zone offset disagree.

use std::fmt;
use std::time::Duration;

use chrono::{
    DateTime, Duration as ChronoDuration, DurationRound, FixedOffset, Local, NaiveDateTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Error, Result};

/// Zone whose wall clock names and aligns buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// The host's local time zone
    Local,
    /// Coordinated universal time
    Utc,
    /// A fixed offset, in seconds east of UTC
    Fixed(i32),
}

impl Default for Zone {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => write!(f, "local"),
            Zone::Utc => write!(f, "utc"),
            Zone::Fixed(secs) => {
                let sign = if *secs < 0 { '-' } else { '+' };
                let abs = secs.unsigned_abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}

impl Zone {
    /// Check that a fixed offset is representable
    pub fn validate(&self) -> Result<()> {
        match self {
            Zone::Fixed(secs) => FixedOffset::east_opt(*secs)
                .map(|_| ())
                .ok_or_else(|| Error::config(format!("Invalid fixed offset: {}s", secs))),
            _ => Ok(()),
        }
    }

    /// Wall clock reading of `instant` in this zone
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Zone::Utc => instant.naive_utc(),
            Zone::Local => instant.with_timezone(&Local).naive_local(),
            Zone::Fixed(secs) => match FixedOffset::east_opt(*secs) {
                Some(offset) => instant.with_timezone(&offset).naive_local(),
                None => instant.naive_utc(),
            },
        }
    }

    /// Instant at which this zone's wall clock shows `wall`.
    ///
    /// Ambiguous readings resolve to the earlier instant; readings that fall
    /// into a DST gap have no instant.
    pub fn to_instant(&self, wall: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::Utc => Some(Utc.from_utc_datetime(&wall)),
            Zone::Local => Local
                .from_local_datetime(&wall)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
            Zone::Fixed(secs) => FixedOffset::east_opt(*secs)?
                .from_local_datetime(&wall)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

fn step(interval: Duration) -> Result<ChronoDuration> {
    ChronoDuration::from_std(interval)
        .map_err(|e| Error::timestamp(format!("Interval out of range: {}", e)))
}

/// Truncate a wall clock reading to the start of its bucket
pub fn bucket_start(wall: NaiveDateTime, interval: Duration) -> Result<NaiveDateTime> {
    wall.duration_trunc(step(interval)?)
        .map_err(|e| Error::timestamp(format!("Cannot align {} to interval: {}", wall, e)))
}

/// Bucket the clock's current instant falls into
pub fn current_bucket(clock: &dyn Clock, zone: Zone, interval: Duration) -> Result<NaiveDateTime> {
    bucket_start(zone.wall_clock(clock.now()), interval)
}

/// Start of the bucket following `bucket`
pub fn next_boundary(bucket: NaiveDateTime, interval: Duration) -> Result<NaiveDateTime> {
    bucket
        .checked_add_signed(step(interval)?)
        .ok_or_else(|| Error::timestamp(format!("Bucket after {} is not representable", bucket)))
}

/// How long to sleep from `now` until `boundary`; zero when already past
pub fn time_until(now: NaiveDateTime, boundary: NaiveDateTime) -> Duration {
    (boundary - now).to_std().unwrap_or(Duration::ZERO)
}

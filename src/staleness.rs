//! Escalation of records whose group has stopped refreshing them.

use chrono::{DateTime, Utc};

use crate::{KeyValue, Severity, StatusRecord, TIME_SINCE_UPDATE_KEY, UPDATE_STATUS_KEY};

/// Seconds without an update after which a record is lagging.
pub const LAGGING_AFTER_SECS: f64 = 20.0;

/// Seconds without an update after which a record is stale.
pub const STALE_AFTER_SECS: f64 = 35.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Freshness {
    Ok,
    Lagging,
    Stale,
}

impl Freshness {
    /// Both bounds are exclusive: a record exactly 20 s old is still fresh.
    pub fn from_elapsed(elapsed_secs: f64) -> Freshness {
        if elapsed_secs > STALE_AFTER_SECS {
            Freshness::Stale
        } else if elapsed_secs > LAGGING_AFTER_SECS {
            Freshness::Lagging
        } else {
            Freshness::Ok
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Freshness::Ok => "OK",
            Freshness::Lagging => "Lagging",
            Freshness::Stale => "Stale",
        }
    }

    /// Lowest level a record of this freshness may be published with.
    pub fn floor(self) -> Severity {
        match self {
            Freshness::Ok => Severity::Ok,
            Freshness::Lagging => Severity::Warn,
            Freshness::Stale => Severity::Error,
        }
    }
}

pub fn elapsed_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = now - since;
    elapsed
        .num_microseconds()
        .map(|micros| micros as f64 / 1_000_000.0)
        .unwrap_or(elapsed.num_milliseconds() as f64 / 1000.0)
}

/// Rewrites the two reserved entries of `record` and escalates its level by freshness.
///
/// Probe-produced entries are left untouched.
pub fn apply(record: &mut StatusRecord, now: DateTime<Utc>) -> Freshness {
    let elapsed = elapsed_secs(record.last_update, now);
    let freshness = Freshness::from_elapsed(elapsed);

    record.level = record.level.combine(freshness.floor());

    let status = KeyValue::new(UPDATE_STATUS_KEY, freshness.label());
    let since = KeyValue::new(TIME_SINCE_UPDATE_KEY, format!("{elapsed:.3}"));

    if record.values.len() >= 2 {
        record.values[0] = status;
        record.values[1] = since;
    } else {
        record.values.clear();
        record.values.extend([status, since]);
    }

    freshness
}

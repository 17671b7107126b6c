pub mod actors;
pub mod clock;
pub mod config;
pub mod monitor;
pub mod monitors;
pub mod probes;
pub mod service;
pub mod sink;
pub mod staleness;
pub mod tools;
pub mod util;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the first reserved slot of every [`StatusRecord`].
pub const UPDATE_STATUS_KEY: &str = "Update Status";

/// Key of the second reserved slot of every [`StatusRecord`].
pub const TIME_SINCE_UPDATE_KEY: &str = "Time Since Last Update";

/// Severity of a diagnostic, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Ok = 0,
    Warn = 1,
    Error = 2,
}

impl Severity {
    /// Combination is always the maximum of both inputs.
    pub fn combine(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// Caps the level at [`Severity::Warn`].
    pub fn clamp_to_warn(self) -> Severity {
        self.min(Severity::Warn)
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warn => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromIterator<Severity> for Severity {
    fn from_iter<I: IntoIterator<Item = Severity>>(iter: I) -> Self {
        iter.into_iter().fold(Severity::Ok, Severity::combine)
    }
}

/// A single leveled diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The subsystem groups a monitor keeps a record for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Temperature,
    Usage,
    Nfs,
}

impl GroupKind {
    pub fn title(self) -> &'static str {
        match self {
            GroupKind::Temperature => "CPU Temperature",
            GroupKind::Usage => "CPU Usage",
            GroupKind::Nfs => "NFS IO",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Latest aggregated state of one subsystem group.
///
/// `values` always starts with the two reserved entries ([`UPDATE_STATUS_KEY`] and
/// [`TIME_SINCE_UPDATE_KEY`]); probe diagnostics follow in merge order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub name: String,
    pub hardware_id: String,
    pub level: Severity,
    pub message: String,
    pub values: Vec<KeyValue>,
    pub last_update: DateTime<Utc>,
}

impl StatusRecord {
    /// Startup content, shown until the first pass of the group completes.
    pub fn placeholder(
        name: impl Into<String>,
        hardware_id: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            hardware_id: hardware_id.into(),
            level: Severity::Warn,
            message: String::from("No Data"),
            values: vec![
                KeyValue::new(UPDATE_STATUS_KEY, "No Data"),
                KeyValue::new(TIME_SINCE_UPDATE_KEY, "N/A"),
            ],
            last_update: created,
        }
    }

    /// Replaces the content with a finished group pass stamped at `now`.
    pub fn apply_update(&mut self, update: GroupUpdate, now: DateTime<Utc>) {
        let GroupUpdate {
            level,
            message,
            values,
        } = update;

        let mut merged = Vec::with_capacity(values.len() + 2);
        merged.push(KeyValue::new(UPDATE_STATUS_KEY, "OK"));
        merged.push(KeyValue::new(TIME_SINCE_UPDATE_KEY, "0"));
        merged.extend(values);

        self.level = level;
        self.message = message;
        self.values = merged;
        self.last_update = now;
    }

    /// Probe-produced diagnostics, without the reserved entries.
    pub fn probe_values(&self) -> &[KeyValue] {
        self.values.get(2..).unwrap_or_default()
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}

/// Result of one pass of a check group, ready to be merged into its record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupUpdate {
    pub level: Severity,
    pub message: String,
    pub values: Vec<KeyValue>,
}

/// All records of a monitor at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stamp: DateTime<Utc>,
    pub records: Vec<StatusRecord>,
}

impl Snapshot {
    pub fn record(&self, name: &str) -> Option<&StatusRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    /// Highest level across every record.
    pub fn level(&self) -> Severity {
        self.records.iter().map(|record| record.level).collect()
    }
}

//! Check groups: the probes that share one status record and one cadence.
//!
//! A group runs its probes in a fixed order and folds their reports into a single
//! [`GroupUpdate`]. Groups hold no lock; merging the update into the shared record is
//! the job of [`Monitor`](crate::monitor::Monitor).

pub mod nfs;
pub mod temperature;
pub mod usage;

use async_trait::async_trait;

use crate::probes::ProbeReport;
use crate::tools::HostTools;
use crate::{GroupKind, GroupUpdate};

pub use nfs::NfsChecks;
pub use temperature::TemperatureChecks;
pub use usage::UsageChecks;

#[async_trait]
pub trait CheckGroup: Send {
    fn kind(&self) -> GroupKind;

    /// Runs every probe of the group once.
    async fn run_pass(&mut self, tools: &dyn HostTools) -> GroupUpdate;
}

/// The message of a group is its distinct probe messages, or the level label if there
/// are none.
pub(crate) fn summarize(report: ProbeReport) -> GroupUpdate {
    let messages = report.distinct_messages();
    let message = if messages.is_empty() {
        report.level.label().to_string()
    } else {
        messages.join(", ")
    };

    GroupUpdate {
        level: report.level,
        message,
        values: report.values,
    }
}

//! Per-core utilization from `mpstat -P ALL 1 1`.
//!
//! `mpstat` occasionally reports absurd usage figures for a single sample. Those are
//! replaced by the last accepted reading of the same core, which is why this probe keeps
//! state between passes in [`UsageHistory`].

use std::collections::HashMap;

use tracing::warn;

use super::{ProbeError, ProbeReport, guarded, parse_float};
use crate::Severity;
use crate::tools::HostTools;

pub const COMMAND: &[&str] = &["mpstat", "-P", "ALL", "1", "1"];

/// Usage figures above this are treated as a glitch of the tool.
const IMPLAUSIBLE_USAGE: f64 = 1000.0;

const LOADED_USAGE: f64 = 90.0;
const OVERLOADED_USAGE: f64 = 100.0;

/// Last accepted usage reading, per core.
#[derive(Debug, Clone, Default)]
pub struct UsageHistory {
    previous: HashMap<String, f64>,
}

impl UsageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self, core: &str) -> Option<f64> {
        self.previous.get(core).copied()
    }

    /// Returns the usage to report for `core`, substituting the previous reading for an
    /// implausible one, and remembers it.
    fn accept(&mut self, core: &str, usage: f64) -> f64 {
        let accepted = if usage > IMPLAUSIBLE_USAGE {
            let previous = self.previous(core).unwrap_or_default();
            warn!(
                "read cpu usage of {usage} percent on core {core}, reverting to previous reading of {previous} percent"
            );
            previous
        } else {
            usage
        };

        self.previous.insert(core.to_string(), accepted);
        accepted
    }
}

pub async fn check(tools: &dyn HostTools, history: &mut UsageHistory) -> ProbeReport {
    let report = match tools.run(COMMAND).await {
        Ok(stdout) => guarded("mpstat", || parse(&stdout, history)),
        Err(e) => failure(ProbeReport::new(), &e),
    };

    clamped(report)
}

/// Classifies an mpstat report.
///
/// The aggregate level is WARN when at most two cores are left unloaded on a machine
/// with more than two cores, and never exceeds WARN.
pub fn parse(output: &str, history: &mut UsageHistory) -> ProbeReport {
    let mut report = ProbeReport::new();

    match parse_rows(output, history, &mut report) {
        Ok(CoreTally { cores, loaded }) => {
            if cores - loaded <= 2 && cores > 2 {
                report.escalate(Severity::Warn);
            }
            clamped(report)
        }
        Err(e) => clamped(failure(report, &e)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CoreTally {
    cores: usize,
    loaded: usize,
}

fn clamped(mut report: ProbeReport) -> ProbeReport {
    report.level = report.level.clamp_to_warn();
    report
}

fn failure(mut report: ProbeReport, e: &ProbeError) -> ProbeReport {
    warn!("mpstat check failed: {e}");
    report.push("mpstat Exception", e.to_string());
    report.escalate(Severity::Error);
    report
}

fn core_label(level: Severity) -> &'static str {
    match level {
        Severity::Ok => "OK",
        Severity::Warn => "High Load",
        Severity::Error => "Very High Load",
    }
}

fn parse_rows(
    output: &str,
    history: &mut UsageHistory,
    report: &mut ProbeReport,
) -> Result<CoreTally, ProbeError> {
    let mut tally = CoreTally::default();

    for row in output.lines().skip(3) {
        let columns: Vec<&str> = row.split_whitespace().collect();
        if columns.len() < 10 || columns[0].starts_with("Average") {
            continue;
        }

        let core = columns[2];
        let (user, nice, system) = (columns[3], columns[4], columns[5]);
        let idle = columns[columns.len() - 2];

        let usage = history.accept(core, parse_float(user)? + parse_float(nice)?);

        tally.cores += 1;
        let mut core_level = Severity::Ok;
        if usage > LOADED_USAGE {
            tally.loaded += 1;
            core_level = Severity::Warn;
        }
        if usage > OVERLOADED_USAGE {
            core_level = Severity::Error;
        }

        report.push(format!("CPU {core} Status"), core_label(core_level));
        report.push(format!("CPU {core} User"), user);
        report.push(format!("CPU {core} Nice"), nice);
        report.push(format!("CPU {core} System"), system);
        report.push(format!("CPU {core} Idle"), idle);
    }

    Ok(tally)
}

//! Network filesystem I/O rates from `iostat -n`.
//!
//! Values are only reported; no thresholds apply to them.

use tracing::warn;

use super::{ProbeReport, guarded};
use crate::Severity;
use crate::tools::HostTools;

pub const COMMAND: &[&str] = &["iostat", "-n"];

const COLUMNS: [&str; 6] = [
    "Read Blks/s",
    "Write Blks/s",
    "Read Blk dir/s",
    "Write Blks dir/s",
    "Read Blks srv/s",
    "Write Blks srv/s",
];

pub async fn check(tools: &dyn HostTools) -> ProbeReport {
    match tools.run(COMMAND).await {
        Ok(stdout) => guarded("nfs", || parse(&stdout)),
        Err(e) => {
            warn!("iostat failed: {e}");
            let mut report = ProbeReport::new();
            report.push("Exception", e.to_string());
            report.message("Exception");
            report.escalate(Severity::Error);
            report
        }
    }
}

/// Reports six rates for every filesystem row after the three header lines.
pub fn parse(output: &str) -> ProbeReport {
    let mut report = ProbeReport::new();

    for row in output.lines().skip(3) {
        let columns: Vec<&str> = row.split_whitespace().collect();
        let Some((filesystem, rates)) = columns.split_first() else {
            continue;
        };
        if rates.len() < COLUMNS.len() {
            continue;
        }

        for (label, rate) in COLUMNS.iter().zip(rates) {
            report.push(format!("{filesystem} {label}"), *rate);
        }
    }

    report
}

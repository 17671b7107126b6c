//! Memory usage from `free -m`.

use tracing::warn;

use super::{ProbeError, ProbeReport, guarded, parse_float};
use crate::Severity;
use crate::tools::HostTools;

pub const COMMAND: &[&str] = &["free", "-m"];

const STATUS_KEY: &str = "Memory Status";

pub async fn check(tools: &dyn HostTools) -> ProbeReport {
    match tools.run(COMMAND).await {
        Ok(stdout) => guarded("memory", || parse(&stdout)),
        Err(e) => failure(&e),
    }
}

/// Classifies a `free -m` report by the free column of its second line.
pub fn parse(report: &str) -> ProbeReport {
    parse_table(report).unwrap_or_else(|e| failure(&e))
}

fn failure(e: &ProbeError) -> ProbeReport {
    warn!("memory usage check failed: {e}");
    let mut report = ProbeReport::new();
    report.push(STATUS_KEY, format!("Memory Usage Check Error: {e}"));
    report.escalate(Severity::Error);
    report
}

fn parse_table(table: &str) -> Result<ProbeReport, ProbeError> {
    let row = table
        .lines()
        .nth(1)
        .ok_or_else(|| ProbeError::Parse(String::from("missing memory row")))?;

    let columns: Vec<&str> = row.split_whitespace().collect();
    let [_, total, used, free, ..] = columns.as_slice() else {
        return Err(ProbeError::Parse(format!("short memory row '{}'", row.trim())));
    };

    let free_mb = parse_float(free)?;

    let level = if free_mb < 1.0 {
        Severity::Error
    } else if free_mb < 25.0 {
        Severity::Warn
    } else {
        Severity::Ok
    };

    let status = match level {
        Severity::Ok => "OK",
        Severity::Warn => "Low Memory",
        Severity::Error => "Very Low Memory",
    };

    let mut report = ProbeReport::new();
    report.push(STATUS_KEY, status);
    report.push("Total Memory", *total);
    report.push("Used Memory", *used);
    report.push("Free Memory", *free);
    report.escalate(level);

    Ok(report)
}

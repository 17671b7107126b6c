//! Load average from `uptime`.

use tracing::warn;

use super::{ProbeError, ProbeReport, guarded, parse_float};
use crate::Severity;
use crate::tools::HostTools;

pub const COMMAND: &[&str] = &["uptime"];

const STATUS_KEY: &str = "Load Average Status";

pub async fn check(tools: &dyn HostTools) -> ProbeReport {
    let report = match tools.run(COMMAND).await {
        Ok(stdout) => guarded("load average", || parse(&stdout)),
        Err(e) => failure(&e),
    };

    clamped(report)
}

/// Classifies a one-line load summary.
///
/// The returned level never exceeds WARN, whatever the readings are.
pub fn parse(summary: &str) -> ProbeReport {
    clamped(parse_fields(summary).unwrap_or_else(|e| failure(&e)))
}

fn clamped(mut report: ProbeReport) -> ProbeReport {
    report.level = report.level.clamp_to_warn();
    report
}

fn failure(e: &ProbeError) -> ProbeReport {
    warn!("load average check failed: {e}");
    let mut report = ProbeReport::new();
    report.push(STATUS_KEY, e.to_string());
    report.escalate(Severity::Error);
    report
}

fn status_label(level: Severity) -> &'static str {
    match level {
        Severity::Ok => "OK",
        Severity::Warn => "High Load",
        Severity::Error => "Very High Load",
    }
}

fn parse_fields(summary: &str) -> Result<ProbeReport, ProbeError> {
    let fields: Vec<&str> = summary.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(ProbeError::Parse(format!(
            "expected at least 7 fields in load summary, got {}",
            fields.len()
        )));
    }

    let field = |from_end: usize| fields[fields.len() - from_end].trim_end_matches(',');
    let load1 = field(3);
    let load5 = field(2);
    let load15 = field(1);
    let users = field(7);

    let (one, five, fifteen) = (parse_float(load1)?, parse_float(load5)?, parse_float(load15)?);

    let mut level = Severity::Ok;
    if one > 25.0 || five > 18.0 {
        level = Severity::Warn;
    }
    if one > 35.0 || five > 25.0 || fifteen > 20.0 {
        level = Severity::Error;
    }

    let mut report = ProbeReport::new();
    report.push(STATUS_KEY, status_label(level));
    report.push("1 min Load Average", load1);
    report.push("5 min Load Average", load5);
    report.push("15 min Load Average", load15);
    report.push("Number of Users", users);
    report.escalate(level);

    Ok(report)
}

//! Core clock speeds from `/proc/cpuinfo`.

use std::path::Path;

use tracing::{instrument, warn};

use super::{ProbeReport, guarded, is_numeric};
use crate::Severity;
use crate::tools::HostTools;

pub const CPUINFO: &str = "/proc/cpuinfo";

#[instrument(skip(tools))]
pub async fn check(tools: &dyn HostTools, enforce_speed: bool) -> ProbeReport {
    match tools.read_to_string(Path::new(CPUINFO)).await {
        Ok(cpuinfo) => guarded("clock speed", || parse(&cpuinfo, enforce_speed)),
        Err(e) => {
            warn!("unable to read clock speeds: {e}");
            let mut report = ProbeReport::new();
            report.push("Clock speed error", e.detail());
            report.message("Clock speed error");
            report.escalate(Severity::Error);
            report
        }
    }
}

/// Classifies the `MHz` lines of a cpuinfo listing.
///
/// Speeds are truncated at the decimal point. Without `enforce_speed` the readings are
/// still reported but the level is always OK.
pub fn parse(cpuinfo: &str, enforce_speed: bool) -> ProbeReport {
    let mut report = ProbeReport::new();

    for (index, line) in cpuinfo.lines().filter(|line| line.contains("MHz")).enumerate() {
        let Some((_, reading)) = line.split_once(':') else {
            continue;
        };

        let speed = reading.trim().split('.').next().unwrap_or_default();
        report.push(format!("Core {index} Speed"), speed);

        if !is_numeric(speed) {
            report.escalate(Severity::Error);
            continue;
        }

        let mhz: f64 = speed.parse().unwrap_or_default();
        if mhz > 2150.0 && mhz < 2240.0 {
            report.escalate(Severity::Warn);
        }
        if mhz <= 2150.0 {
            report.escalate(Severity::Error);
        }
    }

    if !enforce_speed {
        report.level = Severity::Ok;
    }

    match report.level {
        Severity::Warn => report.message("Core slowing"),
        Severity::Error => report.message("Core throttled"),
        Severity::Ok => {}
    }

    report
}

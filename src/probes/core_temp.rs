//! Per-core temperatures from the sysfs `temp1_input` files.

use std::path::{Path, PathBuf};

use tracing::{debug, error, instrument, warn};

use super::{ProbeReport, format_reading, guarded, is_numeric};
use crate::Severity;
use crate::tools::HostTools;

pub const DISCOVERY_COMMAND: &[&str] = &["find", "/sys/devices", "-name", "temp1_input"];

/// Finds the temperature inputs once at startup.
///
/// A failed discovery is logged and yields no sources, which turns the probe into a no-op.
#[instrument(skip_all)]
pub async fn discover(tools: &dyn HostTools) -> Vec<PathBuf> {
    match tools.run(DISCOVERY_COMMAND).await {
        Ok(stdout) => {
            let sources = sources_from_listing(&stdout);
            debug!("discovered {} core temperature sources", sources.len());
            sources
        }
        Err(e) => {
            error!("error finding core temperature locations: {e}");
            vec![]
        }
    }
}

/// Entries shorter than five characters cannot be sysfs paths and are dropped.
pub fn sources_from_listing(listing: &str) -> Vec<PathBuf> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| line.len() >= 5)
        .map(PathBuf::from)
        .collect()
}

/// Reads every source and classifies the readings.
///
/// Unlike the other probes this one is fail-fast: one unreadable source discards the
/// whole pass.
#[instrument(skip_all, fields(sources = sources.len()))]
pub async fn check(tools: &dyn HostTools, sources: &[impl AsRef<Path>]) -> ProbeReport {
    let mut readings = Vec::with_capacity(sources.len());

    for source in sources {
        match tools.read_to_string(source.as_ref()).await {
            Ok(content) => readings.push(content),
            Err(e) => {
                warn!("unable to read {}: {e}", source.as_ref().display());
                let mut report = ProbeReport::new();
                report.push("Core Temp Error", e.detail());
                report.message("Core Temp Error");
                report.escalate(Severity::Error);
                return report;
            }
        }
    }

    guarded("core temperature", || classify(&readings))
}

/// Classifies raw millidegree readings, one per core in source order.
pub fn classify<S: AsRef<str>>(readings: &[S]) -> ProbeReport {
    let mut report = ProbeReport::new();

    for (index, raw) in readings.iter().enumerate() {
        let key = format!("Core {index} Temp");
        let reading = raw.as_ref().trim();

        if !is_numeric(reading) {
            report.push(key, reading);
            report.escalate(Severity::Error);
            continue;
        }

        let millidegrees: f64 = reading.parse().unwrap_or_default();
        let celsius = millidegrees / 1000.0;
        report.push(key, format_reading(celsius));

        if (85.0..90.0).contains(&celsius) {
            report.escalate(Severity::Warn);
            report.message("Warm");
        }
        if celsius >= 90.0 {
            report.escalate(Severity::Error);
            report.message("Hot");
        }
    }

    report
}

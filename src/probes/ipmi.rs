//! Sensor readings from the baseboard management controller (`ipmitool sdr`).
//!
//! Each row of the dump looks like `CPU0 Temp        | 45 degrees C      | ok`.

use tracing::{instrument, warn};

use super::{ProbeError, ProbeReport, guarded, is_numeric};
use crate::Severity;
use crate::tools::HostTools;

pub const COMMAND: &[&str] = &["sudo", "ipmitool", "sdr"];

const CPU_WARM: &str = "CPU Warm";
const CPU_HOT: &str = "CPU Hot";

const BOARD_SENSORS: [&str; 3] = ["MB Temp", "BP Temp", "FP Temp"];

#[instrument(skip_all)]
pub async fn check(tools: &dyn HostTools) -> ProbeReport {
    match tools.run(COMMAND).await {
        Ok(stdout) => guarded("ipmi", || parse(&stdout)),
        Err(e) => {
            warn!("ipmitool failed: {e}");
            let mut report = ProbeReport::new();
            report.push("IPMI Error", e.detail());
            report.message("ipmitool Error");
            report.escalate(Severity::Error);
            report
        }
    }
}

/// Classifies a full `ipmitool sdr` dump.
pub fn parse(dump: &str) -> ProbeReport {
    let mut report = ProbeReport::new();

    if dump.split('\n').count() < 2 {
        report.push("ipmitool status", "No output");
        report.message("No ipmitool response");
        report.escalate(Severity::Error);
        return report;
    }

    if let Err(e) = parse_rows(dump, &mut report) {
        report.push("Exception", e.to_string());
        report.message("Exception");
        report.escalate(Severity::Error);
    }

    report
}

fn parse_rows(dump: &str, report: &mut ProbeReport) -> Result<(), ProbeError> {
    for line in dump.split('\n') {
        if line.len() < 2 {
            continue;
        }

        let mut columns = line.split('|');
        let name = columns.next().unwrap_or_default().trim();
        let value = columns
            .next()
            .ok_or_else(|| ProbeError::Parse(format!("no value column in row '{}'", line.trim())))?
            .trim();

        if name.starts_with("CPU") && name.ends_with("Temp") {
            cpu_temperature(report, name, value);
        } else if BOARD_SENSORS.contains(&name) {
            board_temperature(report, name, value);
        } else if (name.starts_with("CPU") && name.ends_with("Fan")) || name == "MB Fan" {
            fan_speed(report, name, value);
        } else if name.starts_with("CPU") && name.ends_with("hot") {
            hot_alarm(report, name, value);
        }
    }

    Ok(())
}

fn strip_degrees(value: &str) -> Option<&str> {
    value.strip_suffix("degrees C").map(str::trim)
}

fn cpu_temperature(report: &mut ProbeReport, name: &str, value: &str) {
    let Some(reading) = strip_degrees(value).filter(|reading| is_numeric(reading)) else {
        // unreadable CPU sensors are reported as is and do not change the level
        report.push(name, value);
        return;
    };

    report.push(name, reading);
    let temperature: f64 = reading.parse().unwrap_or_default();

    if (80.0..89.0).contains(&temperature) {
        report.escalate(Severity::Warn);
        if !report.has_message(CPU_HOT) && !report.has_message(CPU_WARM) {
            report.message(CPU_WARM);
        }
    }

    if temperature >= 89.0 {
        report.escalate(Severity::Error);
        report.messages.retain(|message| message != CPU_WARM);
        if !report.has_message(CPU_HOT) {
            report.message(CPU_HOT);
        }
    }
}

fn board_temperature(report: &mut ProbeReport, name: &str, value: &str) {
    let Some(reading) = strip_degrees(value) else {
        report.push(name, value);
        return;
    };

    report.push(name, reading);
    let device = name.split_whitespace().next().unwrap_or(name);

    if !is_numeric(reading) {
        report.escalate(Severity::Error);
        report.message(format!("{device} Error"));
        return;
    }

    let temperature: f64 = reading.parse().unwrap_or_default();
    if (60.0..75.0).contains(&temperature) {
        report.escalate(Severity::Warn);
        report.message(format!("{device} Warm"));
    }
    if temperature >= 75.0 {
        report.escalate(Severity::Error);
        report.message(format!("{device} Hot"));
    }
}

fn fan_speed(report: &mut ProbeReport, name: &str, value: &str) {
    let Some(rpm) = value.strip_suffix("RPM").map(str::trim) else {
        return;
    };

    if is_numeric(rpm) {
        report.push(name, rpm);
    } else {
        report.push(name, value);
    }
}

fn hot_alarm(report: &mut ProbeReport, name: &str, value: &str) {
    if value == "0x01" {
        report.push(name, "OK");
    } else {
        report.push(name, "Hot");
        report.escalate(Severity::Error);
        report.message("CPU Hot Alarm");
    }
}

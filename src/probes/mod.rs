//! Probes turn the raw text of one external source into leveled diagnostics.
//!
//! Every probe is split in two halves:
//!
//! - a pure `parse`/`classify` function over the tool's text, and
//! - an async `check` entry point that fetches the text through [`HostTools`](crate::tools::HostTools).
//!
//! The entry points never fail. Tool failures, malformed text and even panics inside a
//! parser are folded into the returned [`ProbeReport`] as an ERROR diagnostic, so one
//! broken tool cannot stop its siblings or the scheduler.

pub mod clock_speed;
pub mod core_temp;
pub mod ipmi;
pub mod load;
pub mod memory;
pub mod mpstat;
pub mod nfs;

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

use crate::{KeyValue, Severity};

/// Failure taxonomy of a probe.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    /// The external command could not be run or exited unsuccessfully
    #[error("{tool} failed{}: {stderr}", exit_suffix(.status))]
    ToolInvocation {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The text did not have the expected shape
    #[error("unexpected output: {0}")]
    Parse(String),

    /// A value expected to be numeric was not
    #[error("non-numeric reading '{0}'")]
    NonNumeric(String),

    /// Anything else, including a panic inside a parser
    #[error("{0}")]
    Unhandled(String),
}

impl ProbeError {
    /// The most useful text to show in a diagnostic: the tool's error stream when there is
    /// one, the error description otherwise.
    pub fn detail(&self) -> String {
        match self {
            ProbeError::ToolInvocation { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

fn exit_suffix(status: &Option<i32>) -> String {
    status
        .map(|code| format!(" with exit code {code}"))
        .unwrap_or_default()
}

/// Output of one probe: diagnostics, escalation messages and a level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub values: Vec<KeyValue>,
    pub messages: Vec<String>,
    pub level: Severity,
}

impl ProbeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push(KeyValue::new(key, value));
    }

    pub fn escalate(&mut self, level: Severity) {
        self.level = self.level.combine(level);
    }

    pub fn message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn has_message(&self, message: &str) -> bool {
        self.messages.iter().any(|m| m == message)
    }

    /// Appends `other` after the current content.
    pub fn absorb(&mut self, other: ProbeReport) {
        self.values.extend(other.values);
        self.messages.extend(other.messages);
        self.escalate(other.level);
    }

    /// Messages without repetitions, in order of first appearance.
    pub fn distinct_messages(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.messages.len());
        for message in &self.messages {
            if !seen.contains(&message.as_str()) {
                seen.push(message.as_str());
            }
        }
        seen
    }
}

/// Runs a parser, converting a panic into an ERROR report.
pub(crate) fn guarded(probe: &str, parse: impl FnOnce() -> ProbeReport) -> ProbeReport {
    match catch_unwind(AssertUnwindSafe(parse)) {
        Ok(report) => report,
        Err(panic) => {
            let detail = panic_detail(panic.as_ref());
            warn!("{probe} probe panicked: {detail}");

            let mut report = ProbeReport::new();
            report.push("Exception", ProbeError::Unhandled(detail).to_string());
            report.message("Exception");
            report.escalate(Severity::Error);
            report
        }
    }
}

pub(crate) fn panic_detail(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

/// A reading counts as numeric only if it is a non-empty run of ASCII digits.
pub(crate) fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Formats a float so whole numbers keep one decimal place (`45.0`, `84.999`).
pub(crate) fn format_reading(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub(crate) fn parse_float(text: &str) -> Result<f64, ProbeError> {
    text.parse::<f64>()
        .map_err(|_| ProbeError::NonNumeric(text.to_string()))
}

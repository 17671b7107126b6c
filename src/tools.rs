//! Access to the external text producers the probes parse.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::trace;

use crate::probes::ProbeError;

/// Source of raw tool output.
///
/// Implementations must be `Send + Sync` since every check group runs on its own task
/// and shares one instance.
#[async_trait]
pub trait HostTools: Send + Sync {
    /// Runs `argv` to completion and returns its standard output.
    ///
    /// A non-zero exit status is reported as [`ProbeError::ToolInvocation`] carrying the
    /// tool's standard error.
    async fn run(&self, argv: &[&str]) -> Result<String, ProbeError>;

    async fn read_to_string(&self, path: &Path) -> Result<String, ProbeError>;
}

/// Runs the real tools of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTools;

#[async_trait]
impl HostTools for SystemTools {
    async fn run(&self, argv: &[&str]) -> Result<String, ProbeError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ProbeError::Unhandled(String::from("empty command line")));
        };

        trace!("running {}", argv.join(" "));

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| ProbeError::ToolInvocation {
                tool: program.to_string(),
                status: None,
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProbeError::ToolInvocation {
                tool: program.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, ProbeError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProbeError::ToolInvocation {
                tool: path.display().to_string(),
                status: None,
                stderr: e.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Output(String),
    Failure { status: i32, stderr: String },
}

/// Canned tool output keyed by command line or file path.
///
/// Anything not scripted fails like a missing tool. Every lookup is counted, which makes
/// this the fake used by the scheduler tests.
#[derive(Debug, Default)]
pub struct ScriptedTools {
    commands: Mutex<HashMap<String, Scripted>>,
    files: Mutex<HashMap<PathBuf, Scripted>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(self, argv: &[&str], stdout: impl Into<String>) -> Self {
        self.set_output(argv, stdout);
        self
    }

    pub fn with_failure(self, argv: &[&str], status: i32, stderr: impl Into<String>) -> Self {
        lock(&self.commands).insert(
            argv.join(" "),
            Scripted::Failure {
                status,
                stderr: stderr.into(),
            },
        );
        self
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.set_file(path, content);
        self
    }

    /// Replaces the output of `argv`, also while the tools are in use.
    pub fn set_output(&self, argv: &[&str], stdout: impl Into<String>) {
        lock(&self.commands).insert(argv.join(" "), Scripted::Output(stdout.into()));
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        lock(&self.files).insert(path.into(), Scripted::Output(content.into()));
    }

    /// How often `argv` (or a file path) was requested.
    pub fn calls(&self, key: &str) -> usize {
        lock(&self.calls).get(key).copied().unwrap_or_default()
    }

    fn count(&self, key: &str) {
        *lock(&self.calls).entry(key.to_string()).or_default() += 1;
    }
}

#[async_trait]
impl HostTools for ScriptedTools {
    async fn run(&self, argv: &[&str]) -> Result<String, ProbeError> {
        let key = argv.join(" ");
        self.count(&key);

        match lock(&self.commands).get(&key) {
            Some(Scripted::Output(stdout)) => Ok(stdout.clone()),
            Some(Scripted::Failure { status, stderr }) => Err(ProbeError::ToolInvocation {
                tool: argv.first().unwrap_or(&"").to_string(),
                status: Some(*status),
                stderr: stderr.clone(),
            }),
            None => Err(ProbeError::ToolInvocation {
                tool: argv.first().unwrap_or(&"").to_string(),
                status: None,
                stderr: format!("{key}: command not found"),
            }),
        }
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, ProbeError> {
        let key = path.display().to_string();
        self.count(&key);

        match lock(&self.files).get(path) {
            Some(Scripted::Output(content)) => Ok(content.clone()),
            _ => Err(ProbeError::ToolInvocation {
                tool: key.clone(),
                status: None,
                stderr: format!("{key}: No such file or directory"),
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! One self-rearming actor per check group.
//!
//! ## Cadence
//!
//! ```text
//! spawn → pass → wait 5s → pass → wait 5s → ...
//!          ↑
//!          └─── RunNow (re-arms the timer once it finishes)
//! ```
//!
//! The wait starts when a pass completes, so a slow tool delays only its own group. A
//! pass that is running when the token is cancelled finishes and is merged; no further
//! pass is started.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use crate::config::ResolvedConfig;
use crate::monitor::Monitor;
use crate::monitors::{CheckGroup, NfsChecks, TemperatureChecks, UsageChecks};
use crate::probes::panic_detail;
use crate::tools::HostTools;
use crate::{GroupKind, GroupUpdate, KeyValue, Severity};

use super::messages::CheckCommand;

/// Delay between the end of one pass and the start of the next.
pub const CHECK_PERIOD: Duration = Duration::from_secs(5);

/// Actor that runs the passes of a single check group
pub struct CheckActor {
    group: Box<dyn CheckGroup>,
    kind: GroupKind,
    monitor: Monitor,
    tools: Arc<dyn HostTools>,
    command_rx: mpsc::Receiver<CheckCommand>,
    cancel: CancellationToken,
    period: Duration,
}

impl CheckActor {
    pub fn new(
        group: Box<dyn CheckGroup>,
        monitor: Monitor,
        tools: Arc<dyn HostTools>,
        command_rx: mpsc::Receiver<CheckCommand>,
        cancel: CancellationToken,
        period: Duration,
    ) -> Self {
        Self {
            kind: group.kind(),
            group,
            monitor,
            tools,
            command_rx,
            cancel,
            period,
        }
    }

    /// Runs until the cancellation token fires.
    #[instrument(skip(self), fields(group = %self.kind))]
    pub async fn run(mut self) {
        debug!("starting check actor");

        let mut next_pass = Instant::now();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("cancelled, not re-arming");
                    break;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        CheckCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            let level = self.run_pass().await;
                            let _ = respond_to.send(level);
                            next_pass = Instant::now() + self.period;
                        }
                    }
                }

                _ = sleep_until(next_pass) => {
                    self.run_pass().await;
                    next_pass = Instant::now() + self.period;
                }
            }
        }

        debug!("check actor stopped");
    }

    /// Runs the group once and merges the result. A panicking pass becomes an ERROR update.
    async fn run_pass(&mut self) -> Severity {
        trace!("starting pass");

        let pass = AssertUnwindSafe(self.group.run_pass(self.tools.as_ref())).catch_unwind();
        let update = match pass.await {
            Ok(update) => update,
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                error!("pass panicked: {detail}");
                GroupUpdate {
                    level: Severity::Error,
                    message: String::from("Exception"),
                    values: vec![KeyValue::new("Exception", detail)],
                }
            }
        };

        let level = update.level;
        self.monitor.merge(self.kind, update).await;
        level
    }
}

/// Handle for controlling a [`CheckActor`]
#[derive(Clone)]
pub struct CheckHandle {
    sender: mpsc::Sender<CheckCommand>,
    kind: GroupKind,
}

impl CheckHandle {
    /// Spawns the actor; its first pass starts right away.
    pub fn spawn(
        group: Box<dyn CheckGroup>,
        monitor: Monitor,
        tools: Arc<dyn HostTools>,
        cancel: CancellationToken,
        period: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let kind = group.kind();

        let actor = CheckActor::new(group, monitor, tools, cmd_rx, cancel, period);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                kind,
            },
            task,
        )
    }

    /// Runs a pass immediately and returns the level that was merged.
    pub async fn run_now(&self) -> Result<Severity> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CheckCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive pass result")
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }
}

/// Owns the check actors of one monitor.
pub struct Scheduler {
    handles: Vec<CheckHandle>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Discovers core temperature sources and starts the temperature, usage and (if
    /// enabled) NFS groups.
    pub async fn start(
        config: &ResolvedConfig,
        monitor: Monitor,
        tools: Arc<dyn HostTools>,
    ) -> Self {
        let temperature = TemperatureChecks::discover(config, tools.as_ref()).await;
        debug!(
            "discovered {} core temperature sources",
            temperature.sources().len()
        );

        let mut groups: Vec<Box<dyn CheckGroup>> =
            vec![Box::new(temperature), Box::new(UsageChecks::new())];
        if config.check_nfs {
            groups.push(Box::new(NfsChecks));
        }

        Self::with_groups(groups, monitor, tools, CHECK_PERIOD)
    }

    pub fn with_groups(
        groups: Vec<Box<dyn CheckGroup>>,
        monitor: Monitor,
        tools: Arc<dyn HostTools>,
        period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();

        let (handles, tasks) = groups
            .into_iter()
            .map(|group| {
                CheckHandle::spawn(
                    group,
                    monitor.clone(),
                    tools.clone(),
                    cancel.child_token(),
                    period,
                )
            })
            .unzip();

        Self {
            handles,
            tasks,
            cancel,
        }
    }

    pub fn handle(&self, kind: GroupKind) -> Option<&CheckHandle> {
        self.handles.iter().find(|handle| handle.kind == kind)
    }

    pub fn handles(&self) -> &[CheckHandle] {
        &self.handles
    }

    /// Parent token of every actor; cancelling it stops them all.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels every actor and waits for them to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for task in self.tasks {
            if let Err(e) = task.await {
                error!("check actor terminated abnormally: {e}");
            }
        }

        debug!("scheduler stopped");
    }
}

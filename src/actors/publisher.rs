//! Rate-limited snapshot publication.
//!
//! The publish loop fires about once per second. Each cycle copies the staleness-annotated
//! records out of the [`Monitor`] and hands them to the sink once the lock is released.
//! A cycle that comes less than [`MIN_PUBLISH_INTERVAL`] after the previous transmitted
//! snapshot is suppressed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use crate::monitor::Monitor;
use crate::sink::{PublishSink, SinkError};

use super::messages::PublisherCommand;

/// Minimum wall-clock time between two transmitted snapshots.
pub const MIN_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// Period of the publish loop.
pub const PUBLISH_PERIOD: Duration = Duration::from_secs(1);

pub struct Publisher {
    monitor: Monitor,
    sink: Arc<dyn PublishSink>,
    last_published: Option<DateTime<Utc>>,
}

impl Publisher {
    pub fn new(monitor: Monitor, sink: Arc<dyn PublishSink>) -> Self {
        Self {
            monitor,
            sink,
            last_published: None,
        }
    }

    pub fn last_published(&self) -> Option<DateTime<Utc>> {
        self.last_published
    }

    fn suppressed(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_published else {
            return false;
        };
        (now - last).to_std().is_ok_and(|since| since < MIN_PUBLISH_INTERVAL)
    }

    /// Returns `Ok(false)` if the publish was suppressed by the rate limit.
    ///
    /// A snapshot that the sink failed to take still counts as published for rate limiting.
    #[instrument(skip(self))]
    pub async fn publish(&mut self) -> Result<bool, SinkError> {
        let now = self.monitor.now();
        if self.suppressed(now) {
            trace!("suppressing publish, previous one was less than {MIN_PUBLISH_INTERVAL:?} ago");
            return Ok(false);
        }

        let snapshot = self.monitor.snapshot().await;
        self.last_published = Some(snapshot.stamp);

        self.sink.publish(&snapshot).await?;
        trace!(
            "published snapshot with {} records at level {}",
            snapshot.records.len(),
            snapshot.level()
        );
        Ok(true)
    }
}

/// Actor driving a [`Publisher`] on a fixed period
pub struct PublisherActor {
    publisher: Publisher,
    command_rx: mpsc::Receiver<PublisherCommand>,
    cancel: CancellationToken,
    period: Duration,
}

impl PublisherActor {
    pub fn new(
        publisher: Publisher,
        command_rx: mpsc::Receiver<PublisherCommand>,
        cancel: CancellationToken,
        period: Duration,
    ) -> Self {
        Self {
            publisher,
            command_rx,
            cancel,
            period,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting publisher actor");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("cancelled");
                    break;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PublisherCommand::PublishNow { respond_to } => {
                            debug!("received PublishNow command");
                            let _ = respond_to.send(self.publisher.publish().await);
                        }
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.publisher.publish().await {
                        error!("failed to publish snapshot: {e}");
                    }
                }
            }
        }

        debug!("publisher actor stopped");
    }
}

/// Handle for controlling a [`PublisherActor`]
#[derive(Clone)]
pub struct PublisherHandle {
    sender: mpsc::Sender<PublisherCommand>,
    cancel: CancellationToken,
}

impl PublisherHandle {
    pub fn spawn(
        publisher: Publisher,
        period: Duration,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = PublisherActor::new(publisher, cmd_rx, cancel.clone(), period);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                cancel,
            },
            task,
        )
    }

    /// Publishes right away unless the rate limit suppresses it.
    pub async fn publish_now(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PublisherCommand::PublishNow { respond_to: tx })
            .await
            .context("failed to send PublishNow command")?;

        let published = rx.await.context("failed to receive publish result")??;
        Ok(published)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

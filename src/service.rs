//! Process lifecycle: attach to the bus, monitor until told to stop, tear everything down.

use std::future::Future;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info};

use crate::actors::publisher::PUBLISH_PERIOD;
use crate::actors::{Publisher, PublisherHandle, Scheduler};
use crate::clock::Clock;
use crate::config::{BusConfig, ResolvedConfig};
use crate::monitor::Monitor;
use crate::sink::{HttpSink, LogSink, PublishSink};
use crate::tools::HostTools;

/// Builds the sink for `bus` (stdout without one) and checks that it can be reached.
///
/// Every failure is logged and yields `None`; the caller is expected to exit quietly.
pub async fn attach_sink(bus: Option<&BusConfig>) -> Option<Arc<dyn PublishSink>> {
    let sink: Arc<dyn PublishSink> = match bus {
        Some(bus) => match HttpSink::from_config(bus) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                error!("could not set up the monitoring bus: {e}");
                return None;
            }
        },
        None => Arc::new(LogSink),
    };

    if let Err(e) = sink.attach().await {
        error!("could not attach to the monitoring bus: {e}");
        return None;
    }

    Some(sink)
}

/// Runs the check groups and the publisher until `shutdown` resolves.
///
/// Returns `false` without starting anything if the sink could not be attached.
pub async fn run(
    config: &ResolvedConfig,
    tools: Arc<dyn HostTools>,
    clock: Arc<dyn Clock>,
    shutdown: impl Future<Output = ()>,
) -> bool {
    let Some(sink) = attach_sink(config.bus.as_ref()).await else {
        return false;
    };

    let monitor = Monitor::new(config, clock);
    let scheduler = Scheduler::start(config, monitor.clone(), tools).await;

    let (publisher, publisher_task) = PublisherHandle::spawn(
        Publisher::new(monitor, sink),
        PUBLISH_PERIOD,
        scheduler.cancellation_token().child_token(),
    );

    info!("monitoring {} as '{}'", config.hostname, config.diag_hostname);

    shutdown.await;
    info!("shutting down");

    publisher.shutdown();
    if let Err(e) = publisher_task.await {
        error!("publisher terminated abnormally: {e}");
    }
    scheduler.shutdown().await;

    true
}

/// Resolves on SIGINT (ctrl-c) or SIGTERM.
///
/// The SIGTERM handler is installed before this returns, so a signal that arrives before the
/// future is first polled is not lost.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("could not listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => debug!("received ctrl-c"),
            _ = terminate.recv() => debug!("received SIGTERM"),
        }
    })
}

//! Commands accepted by the check and publisher actors.
//!
//! Every command that expects an answer carries a oneshot sender; the actor replies once
//! the requested work has finished.

use tokio::sync::oneshot;

use crate::Severity;
use crate::sink::SinkError;

/// Commands that can be sent to a [`CheckActor`](super::scheduler::CheckActor)
#[derive(Debug)]
pub enum CheckCommand {
    /// Run a pass right away instead of waiting for the timer.
    ///
    /// The timer is re-armed one period after this pass completes.
    RunNow {
        /// Level of the merged update
        respond_to: oneshot::Sender<Severity>,
    },
}

/// Commands that can be sent to a [`PublisherActor`](super::publisher::PublisherActor)
#[derive(Debug)]
pub enum PublisherCommand {
    /// Publish outside of the regular cycle, subject to the same rate limit.
    PublishNow {
        /// `Ok(false)` if the publish was suppressed
        respond_to: oneshot::Sender<Result<bool, SinkError>>,
    },
}

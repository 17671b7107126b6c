//! Actor-based scheduling and publication
//!
//! Each check group and the publisher run as independent tokio tasks. They never talk to
//! each other: check actors merge their results into the shared [`Monitor`] and the
//! publisher copies snapshots out of it.
//!
//! ## Architecture Overview
//!
//! ```text
//!   CheckActor (temperature) ──┐
//!   CheckActor (usage)       ──┼── merge ──▶ Monitor (one lock) ──▶ snapshot ──▶ PublisherActor ──▶ sink
//!   CheckActor (nfs)         ──┘
//! ```
//!
//! ## Communication Patterns
//!
//! - **Commands** (mpsc + oneshot reply): `RunNow`, `PublishNow`
//! - **Cancellation**: a [`CancellationToken`](tokio_util::sync::CancellationToken) per
//!   actor, children of the scheduler's token
//!
//! [`Monitor`]: crate::monitor::Monitor

pub mod messages;
pub mod publisher;
pub mod scheduler;

pub use publisher::{Publisher, PublisherHandle};
pub use scheduler::{CheckHandle, Scheduler};

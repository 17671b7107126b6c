//! The status records of one host behind a single lock.
//!
//! Every mutation (merging a group pass, rewriting staleness entries) and every snapshot
//! read happens while holding the lock. Probes run without it, and snapshots are copied
//! out so nothing is serialized or sent while it is held.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::clock::Clock;
use crate::config::ResolvedConfig;
use crate::staleness;
use crate::{GroupKind, GroupUpdate, Snapshot, StatusRecord};

#[derive(Debug)]
struct StatusArena {
    temperature: StatusRecord,
    usage: StatusRecord,
    nfs: Option<StatusRecord>,
}

impl StatusArena {
    fn get_mut(&mut self, kind: GroupKind) -> Option<&mut StatusRecord> {
        match kind {
            GroupKind::Temperature => Some(&mut self.temperature),
            GroupKind::Usage => Some(&mut self.usage),
            GroupKind::Nfs => self.nfs.as_mut(),
        }
    }

    /// Records in publication order.
    fn records_mut(&mut self) -> impl Iterator<Item = &mut StatusRecord> {
        [Some(&mut self.temperature), Some(&mut self.usage), self.nfs.as_mut()]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone)]
pub struct Monitor {
    records: Arc<Mutex<StatusArena>>,
    clock: Arc<dyn Clock>,
}

impl Monitor {
    /// Creates the placeholder records; the NFS record only exists if NFS is checked.
    pub fn new(config: &ResolvedConfig, clock: Arc<dyn Clock>) -> Self {
        let created = clock.now();
        let record = |kind: GroupKind| {
            StatusRecord::placeholder(
                format!("{} {}", config.diag_hostname, kind.title()),
                config.hostname.clone(),
                created,
            )
        };

        let arena = StatusArena {
            temperature: record(GroupKind::Temperature),
            usage: record(GroupKind::Usage),
            nfs: config.check_nfs.then(|| record(GroupKind::Nfs)),
        };

        Self {
            records: Arc::new(Mutex::new(arena)),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Stores a finished group pass. Returns `false` if the group has no record.
    pub async fn merge(&self, kind: GroupKind, update: GroupUpdate) -> bool {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let Some(record) = records.get_mut(kind) else {
            warn!("dropping update for untracked group {kind}");
            return false;
        };

        trace!("{kind}: merging update at level {}", update.level);
        record.apply_update(update, now);
        true
    }

    /// Copy of the current record of `kind`, without staleness applied.
    pub async fn record(&self, kind: GroupKind) -> Option<StatusRecord> {
        let mut records = self.records.lock().await;
        records.get_mut(kind).cloned()
    }

    /// Applies staleness to every record and copies them out.
    pub async fn snapshot(&self) -> Snapshot {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let records = records
            .records_mut()
            .map(|record| {
                staleness::apply(record, now);
                record.clone()
            })
            .collect();

        Snapshot {
            stamp: now,
            records,
        }
    }
}

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{CheckGroup, summarize};
use crate::probes::{ProbeReport, load, memory, mpstat};
use crate::tools::HostTools;
use crate::{GroupKind, GroupUpdate};

/// Per-core utilization, load average and memory, in that order.
#[derive(Debug, Clone, Default)]
pub struct UsageChecks {
    history: mpstat::UsageHistory,
}

impl UsageChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &mpstat::UsageHistory {
        &self.history
    }
}

#[async_trait]
impl CheckGroup for UsageChecks {
    fn kind(&self) -> GroupKind {
        GroupKind::Usage
    }

    #[instrument(skip_all)]
    async fn run_pass(&mut self, tools: &dyn HostTools) -> GroupUpdate {
        let mut report = ProbeReport::new();

        report.absorb(mpstat::check(tools, &mut self.history).await);
        report.absorb(load::check(tools).await);
        report.absorb(memory::check(tools).await);

        debug!("usage pass finished at level {}", report.level);
        summarize(report)
    }
}

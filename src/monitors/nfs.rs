use async_trait::async_trait;

use super::{CheckGroup, summarize};
use crate::probes::nfs;
use crate::tools::HostTools;
use crate::{GroupKind, GroupUpdate};

#[derive(Debug, Clone, Copy, Default)]
pub struct NfsChecks;

#[async_trait]
impl CheckGroup for NfsChecks {
    fn kind(&self) -> GroupKind {
        GroupKind::Nfs
    }

    async fn run_pass(&mut self, tools: &dyn HostTools) -> GroupUpdate {
        summarize(nfs::check(tools).await)
    }
}

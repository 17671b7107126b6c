use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{CheckGroup, summarize};
use crate::config::ResolvedConfig;
use crate::probes::{ProbeReport, clock_speed, core_temp, ipmi};
use crate::tools::HostTools;
use crate::{GroupKind, GroupUpdate};

/// IPMI sensors, sysfs core temperatures and clock speeds, in that order.
#[derive(Debug, Clone)]
pub struct TemperatureChecks {
    check_ipmi_tool: bool,
    check_core_temps: bool,
    enforce_clock_speed: bool,
    sources: Vec<PathBuf>,
}

impl TemperatureChecks {
    pub fn new(config: &ResolvedConfig, sources: Vec<PathBuf>) -> Self {
        Self {
            check_ipmi_tool: config.check_ipmi_tool,
            check_core_temps: config.check_core_temps,
            enforce_clock_speed: config.enforce_clock_speed,
            sources,
        }
    }

    /// Looks up the core temperature sources once, if core temperatures are checked at all.
    pub async fn discover(config: &ResolvedConfig, tools: &dyn HostTools) -> Self {
        let sources = if config.check_core_temps {
            core_temp::discover(tools).await
        } else {
            vec![]
        };
        Self::new(config, sources)
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

#[async_trait]
impl CheckGroup for TemperatureChecks {
    fn kind(&self) -> GroupKind {
        GroupKind::Temperature
    }

    #[instrument(skip_all)]
    async fn run_pass(&mut self, tools: &dyn HostTools) -> GroupUpdate {
        let mut report = ProbeReport::new();

        if self.check_ipmi_tool {
            report.absorb(ipmi::check(tools).await);
        }

        if self.check_core_temps {
            report.absorb(core_temp::check(tools, &self.sources).await);
        }

        report.absorb(clock_speed::check(tools, self.enforce_clock_speed).await);

        debug!("temperature pass finished at level {}", report.level);
        summarize(report)
    }
}

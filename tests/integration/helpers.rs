//! Helper functions for integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use node_monitor::clock::Clock;
use node_monitor::config::{Config, ResolvedConfig};
use node_monitor::monitor::Monitor;
use node_monitor::probes::{
    ProbeError, clock_speed, core_temp, ipmi, load, memory, mpstat, nfs,
};
use node_monitor::tools::{HostTools, ScriptedTools};

pub const IPMI: &str = "\
CPU0 Temp        | 45 degrees C      | ok
CPU1 Temp        | 47 degrees C      | ok
MB Temp          | 38 degrees C      | ok
CPU0 Fan         | 4200 RPM          | ok
";

pub const CORE_TEMP_SOURCE: &str = "/sys/devices/platform/coretemp.0/hwmon/hwmon1/temp1_input";

pub const CPUINFO: &str = "\
processor\t: 0
cpu MHz\t\t: 2660.000
processor\t: 1
cpu MHz\t\t: 2660.000
";

pub const UPTIME: &str = " 10:14:59 up 3 days,  2:01,  4 users,  load average: 0.52, 0.58, 0.59\n";

pub const FREE: &str = "              total        used        free      shared  buff/cache   available
Mem:          15895        4120        9000         402        7353       11020
";

pub const MPSTAT: &str = "\
Linux 5.15.0 (c1) \t01/16/2024 \t_x86_64_\t(2 CPU)

10:00:00 AM  CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle
10:00:01 AM  all    3.00    0.00    1.00    0.00    0.00    0.00    0.00    0.00    0.00   96.00
10:00:01 AM    0    2.00    0.00    1.00    0.00    0.00    0.00    0.00    0.00    0.00   97.00
";

pub const IOSTAT: &str = "\
Linux 2.6.24-24-server (c1) \t01/16/2024

Filesystem:   rBlk_nor/s   wBlk_nor/s   rBlk_dir/s   wBlk_dir/s   rBlk_svr/s   wBlk_svr/s     ops/s    rops/s    wops/s
fs1:/home           12.00         4.50         0.00         0.00        12.00         4.50      3.20      2.10      1.10
";

pub fn command(argv: &[&str]) -> String {
    argv.join(" ")
}

pub fn resolved_config(check_nfs: bool) -> ResolvedConfig {
    Config {
        check_nfs,
        ..Config::default()
    }
    .resolve(String::from("c1.cluster"), Some(String::from("c1")))
}

/// Tools that answer every probe with output of a quiet, healthy node.
pub fn healthy_tools() -> ScriptedTools {
    ScriptedTools::new()
        .with_output(ipmi::COMMAND, IPMI)
        .with_output(core_temp::DISCOVERY_COMMAND, format!("{CORE_TEMP_SOURCE}\n"))
        .with_file(CORE_TEMP_SOURCE, "45000\n")
        .with_file(clock_speed::CPUINFO, CPUINFO)
        .with_output(load::COMMAND, UPTIME)
        .with_output(memory::COMMAND, FREE)
        .with_output(mpstat::COMMAND, MPSTAT)
        .with_output(nfs::COMMAND, IOSTAT)
}

pub fn monitor(config: &ResolvedConfig, clock: impl Clock + 'static) -> Monitor {
    Monitor::new(config, Arc::new(clock))
}

/// Delegates to scripted tools, but one command takes `delay` to answer.
pub struct SlowTools {
    pub inner: ScriptedTools,
    slow_command: String,
    delay: Duration,
}

impl SlowTools {
    pub fn new(inner: ScriptedTools, slow: &[&str], delay: Duration) -> Self {
        Self {
            inner,
            slow_command: command(slow),
            delay,
        }
    }
}

#[async_trait]
impl HostTools for SlowTools {
    async fn run(&self, argv: &[&str]) -> Result<String, ProbeError> {
        if command(argv) == self.slow_command {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.run(argv).await
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, ProbeError> {
        self.inner.read_to_string(path).await
    }
}

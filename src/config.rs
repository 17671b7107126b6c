use std::path::Path;

use tracing::trace;

use crate::util;

/// Monitor configuration as read from the optional JSON file.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub check_core_temps: bool,

    #[serde(default = "default_true")]
    pub check_ipmi_tool: bool,

    #[serde(default = "default_true")]
    pub enforce_clock_speed: bool,

    #[serde(default)]
    pub check_nfs: bool,

    /// Monitoring bus to publish snapshots to (optional - defaults to stdout)
    pub bus: Option<BusConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_core_temps: true,
            check_ipmi_tool: true,
            enforce_clock_speed: true,
            check_nfs: false,
            bus: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct BusConfig {
    pub url: String,
    pub token: Option<String>,
}

/// Configuration with every value settled, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub check_core_temps: bool,
    pub check_ipmi_tool: bool,
    pub enforce_clock_speed: bool,
    pub check_nfs: bool,
    /// Used as hardware id of every record
    pub hostname: String,
    /// Prefix of every record name
    pub diag_hostname: String,
    pub bus: Option<BusConfig>,
}

impl Config {
    /// Applies `MONITOR_*` environment variables on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(flag) = util::get_flag(util::CHECK_CORE_TEMPS) {
            self.check_core_temps = flag;
        }
        if let Some(flag) = util::get_flag(util::CHECK_IPMI_TOOL) {
            self.check_ipmi_tool = flag;
        }
        if let Some(flag) = util::get_flag(util::ENFORCE_CLOCK_SPEED) {
            self.enforce_clock_speed = flag;
        }
        if let Some(flag) = util::get_flag(util::CHECK_NFS) {
            self.check_nfs = flag;
        }
        if let Some(url) = util::get_bus_url() {
            let token = util::get_bus_secret()
                .or_else(|| self.bus.as_ref().and_then(|bus| bus.token.clone()));
            self.bus = Some(BusConfig { url, token });
        }
        self
    }

    /// The diagnostic name defaults to the hostname.
    pub fn resolve(self, hostname: String, diag_hostname: Option<String>) -> ResolvedConfig {
        let Config {
            check_core_temps,
            check_ipmi_tool,
            enforce_clock_speed,
            check_nfs,
            bus,
        } = self;

        ResolvedConfig {
            check_core_temps,
            check_ipmi_tool,
            enforce_clock_speed,
            check_nfs,
            diag_hostname: diag_hostname.unwrap_or_else(|| hostname.clone()),
            hostname,
            bus,
        }
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Reads the file named by `MONITOR_CONFIG` (if any) and applies environment overrides.
pub fn load_config() -> anyhow::Result<Config> {
    let config = match util::get_config_path() {
        Some(path) => read_config_file(&path)?,
        None => Config::default(),
    };
    Ok(config.with_env_overrides())
}

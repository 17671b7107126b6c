use sysinfo::System;
use tracing::level_filters::LevelFilter;

const MONITOR_CONFIG: &str = "MONITOR_CONFIG";

pub fn get_config_path() -> Option<String> {
    std::env::var(MONITOR_CONFIG).ok()
}

pub const CHECK_CORE_TEMPS: &str = "MONITOR_CHECK_CORE_TEMPS";
pub const CHECK_IPMI_TOOL: &str = "MONITOR_CHECK_IPMI_TOOL";
pub const ENFORCE_CLOCK_SPEED: &str = "MONITOR_ENFORCE_CLOCK_SPEED";
pub const CHECK_NFS: &str = "MONITOR_CHECK_NFS";

/// Boolean flag from the environment, `None` if unset or unparsable.
pub fn get_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|value| parse_flag(&value))
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

const MONITOR_BUS_URL: &str = "MONITOR_BUS_URL";

pub fn get_bus_url() -> Option<String> {
    std::env::var(MONITOR_BUS_URL).ok().filter(|url| !url.is_empty())
}

const MONITOR_BUS_SECRET: &str = "MONITOR_BUS_SECRET";

pub fn get_bus_secret() -> Option<String> {
    std::env::var(MONITOR_BUS_SECRET).ok()
}

const DEFAULT_HOSTNAME: &str = "localhost";

pub fn get_hostname() -> String {
    System::host_name().unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
}

const MONITOR_LOG: &str = "MONITOR_LOG";

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

pub fn get_log_level() -> LevelFilter {
    let level_from_env = std::env::var(MONITOR_LOG);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| res.parse().unwrap_or(DEFAULT_LOG_LEVEL))
}

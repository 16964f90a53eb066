//! CLI command implementations.

pub mod config;
pub mod join;
pub mod resolve;

use pd_core::config::ConfigHandle;
use pd_core::constants;
use pd_core::error::PdResult;
use pd_transport::Origin;

/// Parse the origin argument, falling back to the default origin.
pub fn effective_origin(arg: Option<&str>) -> PdResult<Origin> {
    Origin::parse(arg.unwrap_or(constants::DEFAULT_ORIGIN))
}

/// The backend override to use: CLI flag, then env/config file.
pub async fn effective_override(config: &ConfigHandle, flag: Option<String>) -> Option<String> {
    match flag {
        Some(value) if !value.trim().is_empty() => Some(value),
        _ => config.read().await.effective_override(),
    }
}

/// The configured dev host, if any.
pub async fn configured_dev_host(config: &ConfigHandle) -> Option<String> {
    let dev_host = config.read().await.transport.dev_host.clone();
    if dev_host.trim().is_empty() {
        None
    } else {
        Some(dev_host)
    }
}

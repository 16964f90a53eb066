//! Config command - show the effective configuration.

use console::style;

use pd_core::config::{AppConfig, ConfigHandle};
use pd_core::error::PdResult;

/// Run the config command.
pub async fn run(config: ConfigHandle) -> PdResult<()> {
    let cfg = config.read().await;
    let path = AppConfig::default_config_path()?;

    println!(
        "Config file: {}{}",
        path.display(),
        if path.exists() {
            ""
        } else {
            " (not saved, showing defaults)"
        }
    );
    println!();

    println!("{}", style("[transport]").bold());
    println!(
        "  override_url             = {}",
        display_or_unset(&cfg.transport.override_url)
    );
    println!(
        "  dev_host                 = {}",
        display_or_unset(&cfg.transport.dev_host)
    );
    println!(
        "  reconnect_delay_secs     = {}",
        cfg.transport.reconnect_delay_secs
    );
    println!(
        "  relay_probe_interval_secs = {}",
        cfg.transport.relay_probe_interval_secs
    );
    println!(
        "  relay_probe_max_failures = {}",
        cfg.transport.relay_probe_max_failures
    );
    println!();

    println!("{}", style("[logging]").bold());
    println!("  level       = {}", cfg.logging.level);
    println!(
        "  directory   = {}",
        display_or_unset(&cfg.logging.directory)
    );
    println!("  json_output = {}", cfg.logging.json_output);

    if let Some(effective) = cfg.effective_override() {
        println!();
        println!(
            "Effective backend override: {}",
            style(effective).bold()
        );
    }

    Ok(())
}

fn display_or_unset(value: &str) -> String {
    if value.is_empty() {
        style("(unset)").dim().to_string()
    } else {
        value.to_string()
    }
}

//! Resolve command - debugging aid for the three network topologies.

use console::style;

use pd_core::config::ConfigHandle;
use pd_core::error::PdResult;
use pd_transport::endpoint;

/// Run the resolve command.
pub async fn run(
    config: ConfigHandle,
    origin: String,
    server: Option<String>,
    dev_host: Option<String>,
) -> PdResult<()> {
    let origin = super::effective_origin(Some(&origin))?;
    let override_url = super::effective_override(&config, server).await;
    let dev_host = match dev_host {
        Some(host) if !host.trim().is_empty() => Some(host),
        _ => super::configured_dev_host(&config).await,
    };

    let resolved = endpoint::resolve(&origin, override_url.as_deref(), dev_host.as_deref());

    println!("Origin:       {}://{}", match origin.scheme {
        pd_transport::OriginScheme::Http => "http",
        pd_transport::OriginScheme::Https => "https",
    }, origin.host);
    if let Some(tunnel) = origin.tunnel_id() {
        println!("Tunnel id:    {tunnel}");
    }
    println!("Endpoint:     {}", style(&resolved.resolved_url).bold());
    println!(
        "Transport:    {}",
        if resolved.is_relay_environment {
            style("sandboxed relay").yellow()
        } else {
            style("direct channel").green()
        }
    );
    if let Some(ref raw) = resolved.custom_override_url {
        println!("Override:     {raw}");
    }

    Ok(())
}

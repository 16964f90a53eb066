//! Join command - join an activity instance and stream its events.

use console::style;

use pd_core::config::ConfigHandle;
use pd_core::error::PdResult;
use pd_core::platform::Platform;
use pd_transport::{EventKind, SessionClient, TransportEvent};

/// Run the join command.
pub async fn run(
    config: ConfigHandle,
    instance: String,
    activity: Option<String>,
    user: Option<String>,
    username: Option<String>,
    origin: Option<String>,
    server: Option<String>,
) -> PdResult<()> {
    let origin = super::effective_origin(origin.as_deref())?;
    let override_url = super::effective_override(&config, server).await;
    let transport_config = config.read().await.transport.clone();

    let user_id = user.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let username = username.unwrap_or_else(Platform::hostname);

    let client = SessionClient::new(origin, transport_config);

    // Funnel bus events into a channel the select loop below can await
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for &kind in EventKind::all() {
        let tx = tx.clone();
        client.bus().subscribe(kind, move |event| {
            let _ = tx.send(event.clone());
            Ok(())
        });
    }

    println!(
        "{} Joining instance {} as {}...",
        style("[1/2]").bold().dim(),
        style(&instance).bold(),
        username
    );
    client
        .join_instance(
            &instance,
            activity.as_deref(),
            &user_id,
            &username,
            override_url.as_deref(),
        )
        .await?;

    let endpoint = client.endpoint().await;
    println!(
        "  {} Connected to {}",
        style("OK").green().bold(),
        endpoint.resolved_url
    );
    println!(
        "{} Streaming events... (Ctrl+C to leave)",
        style("[2/2]").bold().dim()
    );
    println!();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => print_event(&event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Leaving instance...");
                client.leave().await;
                break;
            }
        }
    }

    Ok(())
}

fn print_event(event: &TransportEvent) {
    match event {
        TransportEvent::Connected => {
            println!("  {} channel connected", style("[status]").cyan());
        }
        TransportEvent::Disconnected => {
            println!("  {} channel disconnected", style("[status]").cyan());
        }
        TransportEvent::ChatMessage { sender_id, text } => {
            println!(
                "  {} {}: {}",
                style("[chat]").cyan(),
                style(sender_id).bold(),
                text
            );
        }
        TransportEvent::UserJoined { user_id } => {
            println!("  {} {} joined", style("[presence]").green(), user_id);
        }
        TransportEvent::UserLeft { user_id } => {
            println!("  {} {} left", style("[presence]").yellow(), user_id);
        }
        TransportEvent::ServerError { text } => {
            println!("  {} {}", style("[server error]").red().bold(), text);
        }
    }
}

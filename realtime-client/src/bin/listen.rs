//! Connects to the attendance backend's notification channel and prints
//! everything it receives. Manual smoke tool:
//!
//! ```text
//! WORKPULSE_TOKEN=<bearer token> cargo run --bin listen
//! ```

use anyhow::Context;
use realtime_client::consumers::{ActivityFeed, UnreadBadge};
use realtime_client::{logging, RealtimeConfig, RealtimeService, ServerMessage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let token = std::env::var("WORKPULSE_TOKEN")
        .context("WORKPULSE_TOKEN must carry the bearer token for the realtime channel")?;
    let config = RealtimeConfig::from_env()?;
    tracing::info!(base_url = %config.base_url, "starting realtime listener");

    let service = RealtimeService::with_credential(config, &token)?;

    let badge = UnreadBadge::attach(service.registry());
    let feed = ActivityFeed::attach(service.registry());

    let printer = service.subscribe(|message: &ServerMessage| {
        println!("<- {}: {:?}", message.type_tag(), message);
    });

    let mut status_rx = service.watch_status();
    let status_task = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow();
            println!("-- status: {status}");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for ctrl-c")?;

    println!(
        "-- shutting down ({} unread, {} feed entries)",
        badge.unread(),
        feed.len()
    );
    service.unsubscribe(printer);
    service.teardown();
    status_task.abort();

    Ok(())
}

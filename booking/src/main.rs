//! Matchday command-line client.
//!
//! `matchday` lists upcoming events, `matchday event <id>` shows an event's
//! ticket types, `matchday history` lists the stored user's bookings and
//! `matchday chat <message>` asks Coach AI.

use anyhow::Context;
use matchday_assistant::Assistant;
use matchday_booking::{
    App, CallbackPaymentWidget, Config, Route, pricing::format_inr, session::SessionState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchday=info,matchday_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        api_base_url = %config.api.base_url,
        storage_dir = ?config.storage.dir,
        "Configuration loaded"
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);
    match command {
        Some("chat") => return chat(&config, &args[1..].join(" ")).await,
        None | Some("event" | "history") => {},
        Some(other) => anyhow::bail!("unknown command `{other}`"),
    }

    let app = build_app(&config)?;
    let outcome = match command {
        Some("event") => match args.get(1) {
            Some(event_id) => show_event(&app, event_id).await,
            None => Err(anyhow::anyhow!("usage: matchday event <event id>")),
        },
        Some("history") => show_history(&app).await,
        _ => show_catalog(&app).await,
    };
    app.shutdown(SHUTDOWN_TIMEOUT)
        .await
        .context("pending work did not finish")?;
    outcome
}

/// A terminal has no payment UI; every payment is dismissed
fn build_app(config: &Config) -> anyhow::Result<App> {
    let widget = CallbackPaymentWidget::new(|request, callbacks| {
        info!(order_id = %request.order_id, "Payments are not supported in the terminal");
        callbacks.dismiss();
    });
    App::with_http(config, Arc::new(widget)).context("failed to build client")
}

async fn chat(config: &Config, message: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!message.trim().is_empty(), "usage: matchday chat <message>");

    let assistant = Assistant::with_api_key(
        config.assistant.api_key.clone(),
        config.assistant.model.clone(),
        config.assistant.timeout(),
    );
    println!("{}", assistant.reply(message).await);
    Ok(())
}

async fn show_catalog(app: &App) -> anyhow::Result<()> {
    app.restore_session().await?;

    let mut updates = app.catalog.subscribe_actions();
    app.navigate(Route::Catalog).await?;
    tokio::time::timeout(LOAD_TIMEOUT, async {
        while app.catalog.state(|state| state.loading).await {
            if updates.recv().await.is_err() {
                break;
            }
        }
    })
    .await
    .context("timed out loading events")?;

    let (events, error) = app
        .catalog
        .state(|state| (state.events().to_vec(), state.error.clone()))
        .await;
    if let Some(error) = error {
        anyhow::bail!(error.user_message());
    }
    if events.is_empty() {
        println!("No events found.");
    }
    for event in events {
        println!(
            "{}  {}  {}  from {}  ({})",
            event.start.format("%a %d %b %H:%M"),
            event.name,
            event.location,
            format_inr(event.price_from),
            event.id
        );
    }
    Ok(())
}

async fn show_event(app: &App, event_id: &str) -> anyhow::Result<()> {
    let mut updates = app.checkout.subscribe_actions();
    app.navigate(Route::Event {
        event_id: event_id.to_string(),
    })
    .await?;
    tokio::time::timeout(LOAD_TIMEOUT, async {
        while app.checkout.state(|state| state.loading).await {
            if updates.recv().await.is_err() {
                break;
            }
        }
    })
    .await
    .context("timed out loading event")?;

    let (detail, error) = app
        .checkout
        .state(|state| (state.detail.clone(), state.error.clone()))
        .await;
    let Some(detail) = detail else {
        anyhow::bail!(error.map_or_else(|| "Event not found".to_string(), |e| e.user_message()));
    };

    println!("{}", detail.listing.name);
    println!("{}  {}", detail.listing.start.format("%a %d %b %Y %H:%M UTC"), detail.listing.location);
    if let Some(match_name) = &detail.match_name {
        println!("Match: {match_name}");
    }
    println!(
        "Platform fee {:.1}%, max {} tickets per order",
        detail.fees.fee_rate * 100.0,
        detail.max_tickets_per_order
    );
    for ticket in &detail.ticket_types {
        let availability = if ticket.can_increase() {
            format!("{} left", ticket.available_quantity())
        } else {
            "sold out".to_string()
        };
        println!("  {:<20} {:>12}  {}", ticket.label, format_inr(ticket.unit_price), availability);
    }
    Ok(())
}

async fn show_history(app: &App) -> anyhow::Result<()> {
    app.restore_session().await?;
    anyhow::ensure!(
        app.session.state(SessionState::is_authenticated).await,
        "not logged in"
    );

    let mut updates = app.history.subscribe_actions();
    app.navigate(Route::History).await?;
    tokio::time::timeout(LOAD_TIMEOUT, async {
        while app.history.state(|state| state.loading).await {
            if updates.recv().await.is_err() {
                break;
            }
        }
    })
    .await
    .context("timed out loading bookings")?;

    let (entries, error) = app
        .history
        .state(|state| (state.entries().to_vec(), state.error.clone()))
        .await;
    if let Some(error) = error {
        anyhow::bail!(error.user_message());
    }
    for entry in entries {
        println!(
            "{}  {}  {} tickets  {}  {}",
            entry.booking_id,
            entry.event_name,
            entry.ticket_count,
            format_inr(entry.amount),
            entry.status.label()
        );
    }
    Ok(())
}

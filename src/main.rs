use anyhow::Context;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::{
    config::AppConfig,
    db, events,
    payment::stripe::StripeGateway,
    router, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::load().context("failed to load configuration")?);
    info!(environment = %config.environment, "starting storefront-api");

    let db = Arc::new(
        db::establish_connection(&config)
            .await
            .context("failed to connect to database")?,
    );

    let (event_sender, event_rx) = events::channel(config.event_buffer);
    tokio::spawn(events::run_event_logger(event_rx));

    let provider = Arc::new(StripeGateway::new(config.stripe_secret_key.clone()));
    let state = Arc::new(AppState::new(
        db,
        config.clone(),
        Arc::new(event_sender),
        provider,
    ));

    spawn_sweeps(state.clone());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}

/// Background maintenance: abandoned-cart nudges and delivery promotion.
fn spawn_sweeps(state: Arc<AppState>) {
    let carts = state.services.carts.clone();
    let abandoned_after = state.config.abandoned_cart_hours;
    tokio::spawn(async move {
        // Hourly cadence bounds nudge latency; `notified_at` on the cart
        // keeps repeat runs from nudging the same idle cart again.
        let mut tick = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            if let Err(err) = carts.sweep_stale_carts(abandoned_after).await {
                error!("abandoned-cart sweep failed: {}", err);
            }
        }
    });

    let orders = state.services.orders.clone();
    let dwell_days = state.config.delivered_dwell_days;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            if let Err(err) = orders.promote_delivered(dwell_days).await {
                error!("delivery sweep failed: {}", err);
            }
        }
    });
}

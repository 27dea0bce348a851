//! outbound - maintenance entry point: refreshes the adaptive send limits
//! from the trailing bounce rate and prints the recent gate audit trail.

use anyhow::{Context, Result};

use outbound::config::Settings;
use outbound::services::{BounceProcessor, RateController};
use outbound::storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting outbound");

    let settings = Settings::default_path()
        .map(|path| Settings::load_or_default(&path))
        .unwrap_or_default();

    let data_dir = directories::ProjectDirs::from("com", "panbanda", "outbound")
        .context("could not determine a data directory")?
        .data_dir()
        .to_path_buf();
    std::fs::create_dir_all(&data_dir)?;
    let store = SqliteStore::open(data_dir.join("outbound.db"))
        .await
        .context("failed to open the send database")?;

    let fail_open = settings.delivery.fail_open_on_infra_error;
    let rate = RateController::new(store.clone(), settings.sending.clone(), fail_open);
    let bounces = BounceProcessor::new(store.clone());

    let bounce_rate = bounces.trailing_bounce_rate().await?;
    let state = rate.adapt(bounce_rate).await?;
    tracing::info!(
        bounce_rate,
        per_hour = state.emails_per_hour,
        per_day = state.emails_per_day,
        "adaptive limits refreshed"
    );

    for decision in store.recent_decisions(20).await? {
        tracing::info!(
            email = %decision.email,
            decision = decision.decision.as_str(),
            reason = decision.reason.as_deref().unwrap_or(""),
            "recent gate decision"
        );
    }

    Ok(())
}

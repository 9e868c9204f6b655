use keel_store::{StoreConfig, SweepConfig, db};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel_store=info,keel_sweep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting keel sweep...");

    let store_config = StoreConfig::from_env()?;
    let sweep = SweepConfig::from_env()?;

    let store = db::connect(&store_config).await?;
    db::run_migrations(&store).await?;

    tracing::info!(
        interval = ?sweep.interval,
        threshold = ?sweep.threshold,
        "sweeping stale builds"
    );

    store
        .builds()
        .run_sweep(&sweep, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await;

    tracing::info!("Shutting down keel sweep");
    store.close().await;
    Ok(())
}

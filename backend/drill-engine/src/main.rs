use phishdrill_engine::{
    config::{Config, LogFormat},
    metrics,
    models::Category,
    services::AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(config.log_format);

    tracing::info!("Starting phishing drill engine");
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let state = AppState::new(config).await?;

    for category in Category::ALL {
        let summaries = state.catalog.summaries(Some(category));
        tracing::info!("{}: {} definitions", category, summaries.len());
        for summary in summaries {
            tracing::debug!("  {} ({}) {}", summary.id, summary.medium, summary.title);
        }
    }

    let mut notifications = state.notifications.subscribe();
    let relay = tokio::spawn(async move {
        while let Ok(message) = notifications.recv().await {
            tracing::debug!("{} {}", message.event_type, message.payload);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    relay.abort();

    match metrics::render_metrics() {
        Ok(rendered) => tracing::debug!("Final metrics:\n{}", rendered),
        Err(e) => tracing::warn!("Failed to render metrics: {}", e),
    }
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "phishdrill_engine=debug".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Threadline - scripted messaging session
use std::env;
use threadline_core::{cli_app, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    info!("🚀 Starting Threadline demo session");
    info!("   Insight delay: {:?}", config.insight_delay);
    info!("   Records: {:?}", config.data_dir());

    cli_app::demo(config).await
}

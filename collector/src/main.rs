use clap::Parser;
use oob_state_collector::{start, Args, CollectorConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting out-of-band state collector");

    let config = match CollectorConfig::from_args(args).await {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    info!("UDP reports: {}", config.udp_addr);
    info!("HTTP metrics: {}", config.http_addr);

    if let Err(e) = start(config).await {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Shutting down");
}

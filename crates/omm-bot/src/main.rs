//! Offset market maker - entry point.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Perpetual-futures market maker quoting around an offset-median fair price.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via OMM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level filter, e.g. "info" or "omm=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS crypto provider must be in place before any WS connections.
    omm_stream::init_crypto();

    let args = Args::parse();
    init_logging(&args.log_level);

    info!("starting omm-bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("OMM_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    info!(config_path = %config_path, "loading configuration");
    let config = omm_bot::AppConfig::load(&config_path)?;
    info!(
        symbol = %config.symbol.venue_symbol,
        reference = %config.symbol.reference_symbol,
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let app = omm_bot::Application::new(config)?;
    app.run(cancel).await?;

    Ok(())
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(term) => term,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to install SIGTERM handler");
                        return;
                    }
                };
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, shutting down"),
                _ = term.recv() => info!("received SIGTERM, shutting down"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received ctrl-c, shutting down");
        }
        cancel.cancel();
    });
}

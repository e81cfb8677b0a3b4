//! Navigation relay daemon.
//!
//! Reads navigation notifications as JSON lines on stdin, serves their parsed
//! state over WebSocket, and writes navigation commands to stdout.

use clap::Parser;
use nav_extractor::{NavigationTextParser, NotificationLayout};
use nav_relay::{server, stdio, Config, StdioUpstream, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Navigation relay
#[derive(Parser, Debug)]
#[command(name = "nav-relay")]
#[command(about = "Relay turn-by-turn navigation state to a WebSocket client")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to try before the configured candidates
    #[arg(short, long)]
    port: Option<u16>,

    /// Language tag of the navigation app, e.g. "de-DE"
    #[arg(short, long)]
    locale: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_config_path);
    let mut config = match args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    if let Some(port) = args.port {
        config.server.ports.insert(0, port);
    }
    if let Some(tag) = args.locale {
        config.locale.tag = tag;
    }
    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }

    // Commands go to stdout, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    info!("Navigation relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {:?}", config_path);

    let locale = config.locale();
    info!("Parsing navigation text as {}", locale.tag);

    let (upstream, commands) = StdioUpstream::new();
    let upstream = Arc::new(upstream);
    let layout = NotificationLayout::new(NavigationTextParser::new(locale));
    let engine = SyncEngine::new(Arc::clone(&upstream), layout, config.sync_settings());

    let listener = server::bind_first_available(&config.server.bind, &config.server.ports).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let server_engine = engine.clone();

    tokio::select! {
        result = server::serve(listener, server_engine, &config.server.path) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        result = stdio::pump_events(stdin, upstream, engine) => {
            result?;
            info!("Upstream closed, shutting down");
        }
        result = stdio::write_commands(stdout, commands) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

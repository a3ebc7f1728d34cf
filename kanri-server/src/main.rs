//! # Kanri Server
//!
//! Entry point for the Kanri realtime broadcast server.
//!
//! ```bash
//! # Run with defaults
//! kanri-server
//!
//! # Run with environment variable overrides
//! KANRI_PORT=9090 kanri-server
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use kanri_api::auth::SessionServiceResolver;
use kanri_api::{ApiConfig, ApiServer};

/// Kanri realtime broadcast server
#[derive(Parser, Debug)]
#[command(name = "kanri-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host
    #[arg(long, env = "KANRI_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "KANRI_PORT", default_value_t = 8080)]
    port: u16,

    /// Base URL of the external session service
    #[arg(
        long,
        env = "KANRI_SESSION_SERVICE_URL",
        default_value = "http://127.0.0.1:3000"
    )]
    session_service_url: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(args.debug);

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        session_service_url: args.session_service_url.clone(),
        ..ApiConfig::default()
    };

    // Composition root: the resolver and the connection registry live here,
    // inside the server state, not in any global.
    let resolver = Arc::new(SessionServiceResolver::new(args.session_service_url));
    let server = ApiServer::new(config, resolver);

    info!("starting kanri realtime server");

    if let Err(e) = server.run_with_shutdown(shutdown_signal()).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("kanri realtime server stopped");
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the default
/// level.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves when the process receives a shutdown signal.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}

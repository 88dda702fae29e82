//! Tasklist server -- a small to-do web app.
//!
//! Tasks live in a Firestore collection; tips come from a hosted
//! text-generation model. Either backend may be left unconfigured, in which
//! case only the functionality that depends on it is disabled.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080
//! FIREBASE_CREDENTIALS_JSON="$(cat service-account.json)" \
//! GEMINI_API_KEY=... cargo run --bin tasklist
//!
//! # Local development without any cloud services
//! cargo run --bin tasklist -- --store memory --bind 127.0.0.1:3000
//!
//! # Against the Firestore emulator
//! FIRESTORE_EMULATOR_HOST=localhost:8081 cargo run --bin tasklist
//! ```

use std::sync::Arc;

use clap::Parser;
use tasklist::config::{CliArgs, TasklistConfig};
use tasklist::router::{self, AppState};
use tasklist::store::TaskGateway;
use tasklist::suggest::SuggestionGateway;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match TasklistConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting tasklist server");

    let state = Arc::new(AppState::new(
        TaskGateway::from_config(&config.store),
        SuggestionGateway::from_config(&config.suggest),
    ));

    match router::start_server(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "tasklist server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}

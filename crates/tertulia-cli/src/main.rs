//! Tertulia CLI: entry point.
//!
//! # Commands
//!
//! - `tertulia serve [--host] [--port] [--in-memory] [--logs]`: run the HTTP gateway
//! - `tertulia chat --model <id> -m <message> [--persona <text>]`: one-shot chat
//! - `tertulia status`: show configuration and credential status
//! - `tertulia onboard`: write a default config file

mod helpers;
mod onboard;
mod server;
mod status;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tertulia_core::config::load_config;
use tertulia_core::types::ChatRequest;
use tertulia_providers::{ChatDispatcher, EnvCredentials};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Tertulia: chat with historical characters through any LLM provider
#[derive(Parser)]
#[command(name = "tertulia", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Use a seeded in-memory store instead of the hosted database
        #[arg(long, default_value_t = false)]
        in_memory: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Send one message to a stored model and print the reply
    Chat {
        /// Model id
        #[arg(long)]
        model: String,

        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Character persona appended to the global rules
        #[arg(long)]
        persona: Option<String>,

        /// Use a seeded in-memory store instead of the hosted database
        #[arg(long, default_value_t = false)]
        in_memory: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and credential status
    Status,

    /// Write a default configuration file
    Onboard,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            in_memory,
            logs,
        } => {
            init_logging(logs, "info");
            server::run(host, port, in_memory).await
        }
        Commands::Chat {
            model,
            message,
            persona,
            in_memory,
            logs,
        } => {
            init_logging(logs, "warn");
            run_chat(model, message, persona, in_memory).await
        }
        Commands::Status => status::run(),
        Commands::Onboard => onboard::run(),
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(
    model_id: String,
    message: String,
    persona: Option<String>,
    in_memory: bool,
) -> Result<()> {
    let config = load_config(None);
    let timeout = Duration::from_secs(config.gateway.request_timeout_secs);
    let store = helpers::build_store(&config, in_memory, timeout)?;
    let dispatcher = ChatDispatcher::new(
        Arc::clone(&store),
        EnvCredentials::from_config(&config.providers),
        timeout,
    )?;

    let mut request = ChatRequest::new(model_id, message);
    if let Some(persona) = persona {
        request = request.with_system_prompt(persona);
    }

    info!(store = store.display_name(), model_id = %request.model_id, "one-shot chat");
    let reply = dispatcher
        .dispatch(&request)
        .await
        .context("chat failed")?;
    helpers::print_reply(&reply);
    Ok(())
}

/// Initialize tracing/logging.
///
/// `--logs` turns on debug output for the Tertulia crates; otherwise
/// `RUST_LOG` is honoured, falling back to `default_level`.
fn init_logging(verbose: bool, default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "tertulia_cli=debug,tertulia_core=debug,tertulia_store=debug,tertulia_providers=debug,info",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pactbridge - relay between Pact conversational messaging and RabbitMQ.
//!
//! This is the binary entry point for the relay.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pactbridge_config::{ConfigError, PactbridgeConfig};

/// Pactbridge - relay between Pact conversational messaging and RabbitMQ.
#[derive(Parser, Debug)]
#[command(name = "pactbridge", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gateway and both queue workers (default).
    Serve,
    /// Load and validate configuration, then print it with secrets redacted.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<PactbridgeConfig, Vec<ConfigError>> {
    match path {
        Some(path) => pactbridge_config::load_and_validate_path(path),
        None => pactbridge_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    // A missing .env is the normal case in production.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            pactbridge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("pactbridge: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => {
            println!("{config:#?}");
        }
    }
}

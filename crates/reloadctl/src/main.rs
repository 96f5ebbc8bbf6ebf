/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! reloadctl - command-line front end for bulk reload fulfillment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use config::ConfigLoader;

/// Fulfill bulk reload orders against the transaction gateway
#[derive(Parser)]
#[command(name = "reloadctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (can also be set via RELOADCTL_CONFIG environment variable)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a bulk request and wait until its order is finalized
    Run {
        /// JSON file holding the bulk request
        request: PathBuf,
    },
    /// Finalize an order again from its newest pin dump
    Finalize {
        /// Order id printed by `run`
        order_id: String,
    },
    /// Print the finalized pins of an order
    Pins {
        /// Order id printed by `run`
        order_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load reloadctl configuration")?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    reload_fulfillment::init_logging(Some(level));

    match cli.command {
        Commands::Run { request } => commands::run::run(&config, &request).await?,
        Commands::Finalize { order_id } => commands::finalize::run(&config, &order_id).await?,
        Commands::Pins { order_id } => commands::pins::run(&config, &order_id).await?,
    }

    Ok(())
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - rate-limited WhatsApp template broadcasts.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod engine;
mod send;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_core::{CampaignStatus, JobStatus};

/// Courier - rate-limited WhatsApp template broadcasts.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch recovered jobs and keep running until signalled.
    Serve,
    /// Create a campaign from a recipients file and follow it to completion.
    Send(send::SendArgs),
    /// Show one campaign.
    Status {
        campaign_id: String,
        #[arg(long)]
        json: bool,
    },
    /// List a campaign's jobs in input order.
    Jobs {
        campaign_id: String,
        /// Only jobs in this state (queued, processing, success, failed).
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        json: bool,
    },
    /// List campaigns, newest first.
    Campaigns {
        /// Only campaigns in this state (queued, processing, completed, failed).
        #[arg(long)]
        status: Option<CampaignStatus>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Send(args) => send::run_send(config, args).await,
        Commands::Status { campaign_id, json } => {
            status::run_status(&config, campaign_id, json).await
        }
        Commands::Jobs {
            campaign_id,
            status,
            json,
        } => status::run_jobs(&config, campaign_id, status, json).await,
        Commands::Campaigns {
            status,
            limit,
            json,
        } => status::run_campaigns(&config, status, limit, json).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

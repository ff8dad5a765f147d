//! Stockroom CLI - manage an offline-first product catalog from the terminal
//!
//! Edits are stored locally first and replayed against the backend when it
//! is reachable.

mod cli;
mod commands;
mod config;
mod error;
mod probe;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{AppContext, ProductChanges};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::failures::run_failures;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::update::run_update;
use crate::commands::watch::run_watch;
use crate::config::CliConfig;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockroom=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::new(CliConfig::load_effective()?, cli.db_path, cli.offline);

    match cli.command {
        Commands::Add { name, fields } => run_add(&name, fields, &ctx).await?,
        Commands::List { all, json } => run_list(all, json, &ctx).await?,
        Commands::Show { id, json } => run_show(&id, json, &ctx).await?,
        Commands::Update {
            id,
            name,
            fields,
            clear_image,
            enabled,
        } => {
            let changes = ProductChanges {
                name,
                fields,
                clear_image,
                enabled,
            };
            run_update(&id, changes, &ctx).await?;
        }
        Commands::Delete { id } => run_delete(&id, &ctx).await?,
        Commands::Sync { json } => run_sync(json, &ctx).await?,
        Commands::Status { json } => run_status(json, &ctx).await?,
        Commands::Failures { command } => run_failures(command, &ctx).await?,
        Commands::Watch { probe_interval } => run_watch(probe_interval, &ctx).await?,
        Commands::Config { command } => run_config(command, &ctx)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

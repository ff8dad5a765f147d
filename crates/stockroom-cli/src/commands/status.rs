use serde::Serialize;
use stockroom_core::sync::EngineStatus;

use crate::commands::common::{format_sync_timestamp, open_catalog, AppContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusItem<'a> {
    db_path: String,
    backend: Option<&'a str>,
    #[serde(flatten)]
    engine: EngineStatus,
}

pub async fn run_status(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, false).await?;
    let status = catalog.status().await?;
    let backend = ctx.config.api_base_url.as_deref();

    if as_json {
        let item = StatusItem {
            db_path: ctx.db_path.display().to_string(),
            backend,
            engine: status,
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("Database:   {}", ctx.db_path.display());
    println!("Backend:    {}", backend.unwrap_or("(not configured)"));
    println!(
        "Mode:       {}",
        if status.online { "online" } else { "offline" }
    );
    if status.pending_sync() {
        println!("Pending:    {} operation(s) waiting", status.pending_operations);
    } else {
        println!("Pending:    none");
    }
    println!("Failures:   {}", status.failures);
    println!(
        "Last sync:  {}",
        status
            .last_synced_at
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    );
    Ok(())
}

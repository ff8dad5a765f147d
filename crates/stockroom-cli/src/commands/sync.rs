use stockroom_core::sync::CycleOutcome;

use crate::commands::common::{format_report_lines, open_catalog, AppContext};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, true).await?;

    match catalog.sync_now().await? {
        CycleOutcome::Completed(report) if as_json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CycleOutcome::Completed(report) => {
            for line in format_report_lines(&report) {
                println!("{line}");
            }
        }
        CycleOutcome::Offline => println!("Offline; nothing was synced."),
        CycleOutcome::AlreadyRunning => println!("A sync is already running."),
    }
    Ok(())
}

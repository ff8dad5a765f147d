use crate::cli::FailureCommands;
use crate::commands::common::{
    failure_to_item, format_failure_lines, open_catalog, AppContext, FailureItem,
};
use crate::error::CliError;

pub async fn run_failures(
    command: Option<FailureCommands>,
    ctx: &AppContext,
) -> Result<(), CliError> {
    match command.unwrap_or(FailureCommands::List { json: false }) {
        FailureCommands::List { json } => run_failures_list(json, ctx).await,
        FailureCommands::Retry { id } => run_failures_retry(id, ctx).await,
        FailureCommands::Discard { id } => run_failures_discard(id, ctx).await,
    }
}

pub async fn run_failures_list(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, false).await?;
    let failures = catalog.failures().await?;

    if as_json {
        let json_items = failures
            .iter()
            .map(failure_to_item)
            .collect::<Vec<FailureItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if failures.is_empty() {
        println!("No rejected operations.");
        return Ok(());
    }

    for line in format_failure_lines(&failures) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_failures_retry(id: i64, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, false).await?;
    let operation = catalog.retry_failure(id).await?;
    println!(
        "Requeued {} {} as operation #{}",
        operation.action(),
        operation.target_id(),
        operation.seq
    );
    Ok(())
}

pub async fn run_failures_discard(id: i64, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, false).await?;
    let failure = catalog.discard_failure(id).await?;
    println!(
        "Discarded {} {}",
        failure.kind.action(),
        failure.kind.target_id()
    );
    Ok(())
}

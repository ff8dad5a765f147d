use std::sync::Arc;
use std::time::Duration;

use stockroom_core::sync::SyncScheduler;

use crate::commands::common::{open_catalog, AppContext};
use crate::error::CliError;
use crate::probe::ReachabilityProbe;

pub async fn run_watch(probe_interval_secs: u64, ctx: &AppContext) -> Result<(), CliError> {
    let catalog = open_catalog(ctx, true).await?;
    let engine = Arc::clone(catalog.engine());
    let config = engine.config().clone();
    let signal = engine.connectivity().clone();

    let probe = ReachabilityProbe::new(
        config.api_base_url.clone(),
        Duration::from_secs(probe_interval_secs.max(1)),
        config.request_timeout,
    )?;

    if !ctx.offline {
        signal.set_online(probe.check().await);
    }
    println!("Watching {} (Ctrl-C to stop)", config.api_base_url);

    let scheduler = SyncScheduler::new(engine);
    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    if ctx.offline {
        scheduler.run_until(shutdown).await;
    } else {
        tokio::select! {
            () = scheduler.run_until(shutdown) => {}
            () = probe.run(&signal) => {}
        }
    }

    println!("Stopped.");
    Ok(())
}

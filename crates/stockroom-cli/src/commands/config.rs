use stockroom_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::AppContext;
use crate::config::{default_config_path, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, ctx: &AppContext) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            token,
            collection,
            timeout,
            sync_interval,
        } => {
            let mut config = CliConfig::load()?;
            apply_init_options(
                &mut config,
                api_url,
                token,
                collection,
                timeout,
                sync_interval,
            )?;
            let path = config.save()?;
            println!("Saved {}", path.display());
            Ok(())
        }
        ConfigCommands::Show { json } => run_config_show(json, ctx),
    }
}

/// Merge `config init` flags into an existing config
#[allow(clippy::needless_pass_by_value)]
pub fn apply_init_options(
    config: &mut CliConfig,
    api_url: Option<String>,
    token: Option<String>,
    collection: Option<String>,
    timeout: Option<u64>,
    sync_interval: Option<u64>,
) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(api_url) {
        if !is_http_url(&url) {
            return Err(CliError::Config(format!(
                "API URL must include http:// or https://, got '{url}'"
            )));
        }
        config.api_base_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(token) = normalize_text_option(token) {
        config.api_token = Some(token);
    }
    if let Some(collection) = normalize_text_option(collection) {
        if collection.contains('/') {
            return Err(CliError::Config(format!(
                "invalid collection name '{collection}'"
            )));
        }
        config.collection = Some(collection);
    }
    if let Some(timeout) = timeout {
        if timeout == 0 {
            return Err(CliError::Config(
                "timeout must be greater than zero".to_string(),
            ));
        }
        config.request_timeout_secs = Some(timeout);
    }
    if sync_interval.is_some() {
        config.sync_interval_secs = sync_interval;
    }
    Ok(())
}

fn run_config_show(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let mut shown = ctx.config.clone();
    if shown.api_token.is_some() {
        shown.api_token = Some("********".to_string());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    println!("Config file:   {}", default_config_path().display());
    println!("Database:      {}", ctx.db_path.display());
    println!(
        "API URL:       {}",
        shown.api_base_url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "Collection:    {}",
        shown
            .collection
            .as_deref()
            .unwrap_or(stockroom_core::config::DEFAULT_COLLECTION)
    );
    println!(
        "Token:         {}",
        shown.api_token.as_deref().unwrap_or("(none)")
    );
    match ctx.config.engine_config() {
        Ok(engine) => {
            println!("Timeout:       {:?}", engine.request_timeout);
            println!(
                "Sync interval: {}",
                engine
                    .sync_interval
                    .map_or_else(|| "disabled".to_string(), |interval| format!("{interval:?}"))
            );
        }
        Err(CliError::BackendNotConfigured) => {}
        Err(error) => println!("Invalid:       {error}"),
    }
    Ok(())
}

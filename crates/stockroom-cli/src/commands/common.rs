use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use stockroom_core::config::EngineConfig;
use stockroom_core::connectivity::ConnectivitySignal;
use stockroom_core::models::SyncFailure;
use stockroom_core::remote::HttpRemoteCatalog;
use stockroom_core::services::{Catalog, LocalStore};
use stockroom_core::sync::{Delivery, SyncEngine, SyncReport};
use stockroom_core::{Product, ProductDraft, ProductId};

use crate::cli::ProductFields;
use crate::config::CliConfig;
use crate::error::CliError;

/// Global options every command receives
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: CliConfig,
    pub db_path: PathBuf,
    pub offline: bool,
}

impl AppContext {
    pub fn new(config: CliConfig, cli_db_path: Option<PathBuf>, offline: bool) -> Self {
        let db_path = config.resolve_db_path(cli_db_path);
        Self {
            config,
            db_path,
            offline,
        }
    }
}

pub type CliCatalog = Catalog<HttpRemoteCatalog>;

/// Open the local store and wire it to the configured backend.
///
/// Without a configured backend the catalog runs offline and every write is
/// queued, unless `require_backend` is set.
pub async fn open_catalog(ctx: &AppContext, require_backend: bool) -> Result<CliCatalog, CliError> {
    let (engine_config, online) = match ctx.config.engine_config() {
        Ok(config) => (config, !ctx.offline),
        Err(CliError::BackendNotConfigured) if !require_backend => {
            tracing::debug!("No backend configured; running offline");
            (EngineConfig::default(), false)
        }
        Err(error) => return Err(error),
    };

    let store = LocalStore::open_path(&ctx.db_path).await?;
    let remote = HttpRemoteCatalog::from_config(&engine_config)?;
    let engine = SyncEngine::new(
        store,
        remote,
        ConnectivitySignal::new(online),
        engine_config,
    );
    Ok(Catalog::new(Arc::new(engine)))
}

#[derive(Debug, Serialize)]
pub struct ProductItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub image: Option<String>,
    pub enabled: bool,
    pub sync_status: String,
    pub deleted: bool,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct FailureItem {
    pub id: i64,
    pub operation_seq: i64,
    pub action: String,
    pub target_id: String,
    pub reason: String,
    pub failed_at: i64,
    pub failed_at_iso: String,
}

pub fn product_to_item(product: &Product) -> ProductItem {
    let now_ms = Utc::now().timestamp_millis();
    ProductItem {
        id: product.id.to_string(),
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price,
        stock: product.stock,
        image: product.image.clone(),
        enabled: product.enabled,
        sync_status: product.sync_status.to_string(),
        deleted: product.is_deleted,
        updated_at: product.updated_at,
        relative_time: format_relative_time(product.updated_at, now_ms),
    }
}

pub fn failure_to_item(failure: &SyncFailure) -> FailureItem {
    FailureItem {
        id: failure.id,
        operation_seq: failure.operation_seq,
        action: failure.kind.action().to_string(),
        target_id: failure.kind.target_id().to_string(),
        reason: failure.reason.clone(),
        failed_at: failure.failed_at,
        failed_at_iso: format_sync_timestamp(failure.failed_at),
    }
}

pub fn format_product_lines(products: &[Product]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    products
        .iter()
        .map(|product| {
            let id = truncate(product.id.as_str(), 16);
            let name = truncate(&product.name, 32);
            let mut flags = Vec::new();
            if product.sync_status != stockroom_core::SyncStatus::Synced {
                flags.push(product.sync_status.to_string());
            }
            if product.is_deleted {
                flags.push("deleted".to_string());
            }
            if !product.enabled {
                flags.push("inactive".to_string());
            }
            let relative_time = format_relative_time(product.updated_at, now_ms);
            let line = format!(
                "{id:<16}  {name:<32}  {:>10.2}  {:>6}  {relative_time}",
                product.price, product.stock
            );
            if flags.is_empty() {
                line
            } else {
                format!("{line}  [{}]", flags.join(", "))
            }
        })
        .collect()
}

pub fn format_product_detail(product: &Product) -> Vec<String> {
    let mut lines = vec![
        format!("id:          {}", product.id),
        format!("name:        {}", product.name),
    ];
    if !product.description.is_empty() {
        lines.push(format!("description: {}", product.description));
    }
    lines.push(format!("price:       {:.2}", product.price));
    lines.push(format!("stock:       {}", product.stock));
    if let Some(image) = &product.image {
        lines.push(format!("image:       {image}"));
    }
    lines.push(format!(
        "active:      {}",
        if product.enabled { "yes" } else { "no" }
    ));
    lines.push(format!("sync:        {}", product.sync_status));
    lines.push(format!(
        "updated:     {}",
        format_sync_timestamp(product.updated_at)
    ));
    lines
}

pub fn format_failure_lines(failures: &[SyncFailure]) -> Vec<String> {
    failures
        .iter()
        .map(|failure| {
            format!(
                "#{:<4} {:<6} {:<16}  {}  {}",
                failure.id,
                failure.kind.action(),
                truncate(failure.kind.target_id().as_str(), 16),
                format_sync_timestamp(failure.failed_at),
                failure.reason
            )
        })
        .collect()
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Replayed {} operation(s): {} applied, {} deferred, {} rejected",
        report.applied + report.deferred + report.rejected.len(),
        report.applied,
        report.deferred,
        report.rejected.len()
    )];
    for (temp_id, server_id) in &report.remapped {
        lines.push(format!("  {temp_id} -> {server_id}"));
    }
    for rejected in &report.rejected {
        lines.push(format!(
            "  rejected {} {}: {}",
            rejected.action, rejected.target_id, rejected.reason
        ));
    }
    match &report.merge {
        Some(merge) => lines.push(format!(
            "Merged remote catalog: {} refreshed, {} kept local, {} removed, {} unchanged",
            merge.refreshed, merge.kept_local, merge.removed, merge.unchanged
        )),
        None => lines.push("Merge skipped: operations still queued".to_string()),
    }
    if report.interrupted {
        lines.push("Interrupted: connectivity lost".to_string());
    }
    lines
}

pub fn describe_delivery(delivery: &Delivery) -> String {
    match delivery {
        Delivery::Synced => "synced".to_string(),
        Delivery::Queued => "queued for sync".to_string(),
        Delivery::Rejected(reason) => format!("rejected by backend: {reason}"),
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated = text.chars().take(max_chars.saturating_sub(3)).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn normalize_product_id(id: &str) -> Result<ProductId, CliError> {
    id.parse::<ProductId>()
        .map_err(|_| CliError::EmptyProductId)
}

pub fn normalize_name(parts: &[String]) -> Option<String> {
    let name = parts.join(" ");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Build a draft for a new product
pub fn draft_from_fields(name: String, fields: ProductFields) -> ProductDraft {
    let mut draft = ProductDraft::new(name).with_enabled(!fields.disabled);
    if let Some(description) = fields.description {
        draft = draft.with_description(description.trim());
    }
    if let Some(price) = fields.price {
        draft = draft.with_price(price);
    }
    if let Some(stock) = fields.stock {
        draft = draft.with_stock(stock);
    }
    if let Some(image) = fields.image {
        draft = draft.with_image(image.trim());
    }
    draft
}

/// Field changes requested by `update`
#[derive(Debug, Default, Clone)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub fields: ProductFields,
    pub clear_image: bool,
    pub enabled: bool,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.fields.description.is_none()
            && self.fields.price.is_none()
            && self.fields.stock.is_none()
            && self.fields.image.is_none()
            && !self.fields.disabled
            && !self.clear_image
            && !self.enabled
    }

    /// Overlay the requested changes on the current fields
    pub fn apply_to(self, mut draft: ProductDraft) -> Result<ProductDraft, CliError> {
        if let Some(name) = self.name {
            draft.name = normalize_name(&[name]).ok_or(CliError::EmptyName)?;
        }
        if let Some(description) = self.fields.description {
            draft.description = description.trim().to_string();
        }
        if let Some(price) = self.fields.price {
            draft.price = price;
        }
        if let Some(stock) = self.fields.stock {
            draft.stock = stock;
        }
        if let Some(image) = self.fields.image {
            draft.image = stockroom_core::util::normalize_text_option(Some(image));
        }
        if self.clear_image {
            draft.image = None;
        }
        if self.fields.disabled {
            draft.enabled = false;
        }
        if self.enabled {
            draft.enabled = true;
        }
        Ok(draft)
    }
}

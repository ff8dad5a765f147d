use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stockroom_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to construct HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("No product name provided")]
    EmptyName,
    #[error("Product ID cannot be empty")]
    EmptyProductId,
    #[error("Product not found: {0}")]
    ProductNotFound(String),
    #[error("Nothing to update; pass at least one field")]
    NothingToUpdate,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Backend is not configured. Run `stockroom config init --api-url <URL>` or set STOCKROOM_API_URL."
    )]
    BackendNotConfigured,
}

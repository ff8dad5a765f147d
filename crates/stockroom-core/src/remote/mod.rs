//! Remote catalog client.
//!
//! The sync engine talks to the backend only through [`RemoteCatalog`]. Every
//! call reports failures already classified as transient, permanent or
//! authentication failures, so the engine never has to guess from
//! connectivity alone whether a request is worth retrying.

mod http;
mod memory;
mod wire;

use std::future::Future;

use thiserror::Error;

use crate::models::{Product, ProductDraft, ProductId, SyncStatus};

pub use http::HttpRemoteCatalog;
pub use memory::{CallKind, MemoryRemoteCatalog, RemoteCall};
pub use wire::{decode_entity, decode_list, encode_payload};

/// A failed remote call, classified for the replay loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network unreachable, timeout, 5xx, 408 or 429
    #[error("{0}")]
    Transient(String),

    /// Rejected by the backend (validation, other 4xx, malformed response)
    #[error("{message}")]
    Permanent {
        status: Option<u16>,
        message: String,
    },

    /// 401 or 403
    #[error("{0}")]
    Unauthorized(String),
}

impl RemoteError {
    /// Whether the same request may succeed on a later attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }
}

/// A product as returned by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProduct {
    /// Server-assigned identifier
    pub id: ProductId,
    pub fields: ProductDraft,
}

impl RemoteProduct {
    pub fn new(id: ProductId, fields: ProductDraft) -> Self {
        Self { id, fields }
    }

    /// Local record mirroring this server state
    pub fn into_product(self) -> Product {
        Product::from_draft(self.id, self.fields, SyncStatus::Synced)
    }
}

/// Transport used by the sync engine to reach the authoritative catalog.
///
/// `delete` must succeed when the product is already gone so replaying an
/// acknowledged delete has no further effect.
pub trait RemoteCatalog: Send + Sync {
    fn create(
        &self,
        collection: &str,
        payload: &ProductDraft,
    ) -> impl Future<Output = Result<RemoteProduct, RemoteError>> + Send;

    fn update(
        &self,
        collection: &str,
        id: &ProductId,
        payload: &ProductDraft,
    ) -> impl Future<Output = Result<RemoteProduct, RemoteError>> + Send;

    fn delete(
        &self,
        collection: &str,
        id: &ProductId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn list(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<RemoteProduct>, RemoteError>> + Send;
}

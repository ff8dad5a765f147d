//! Product model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Identifier of a catalog product.
///
/// Either a server identifier (opaque, assigned by the remote catalog) or a
/// temporary identifier generated locally for products created offline.
/// Temporary identifiers carry the [`ProductId::TEMPORARY_PREFIX`] prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Reserved prefix that marks locally generated identifiers
    pub const TEMPORARY_PREFIX: &'static str = "tmp-";

    /// Wrap an identifier as-is
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh temporary identifier (prefix + UUID v7)
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{}{}", Self::TEMPORARY_PREFIX, Uuid::now_v7()))
    }

    /// Whether this identifier was generated locally and never synced
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(Self::TEMPORARY_PREFIX)
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProductId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("product id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Synchronization state of a local product record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local record matches the last acknowledged server state
    #[default]
    Synced,
    /// Local record carries edits not yet acknowledged by the server
    Pending,
    /// Local and remote state disagree and need a decision
    Conflict,
}

impl SyncStatus {
    /// Stored/displayed name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "conflict" => Ok(Self::Conflict),
            other => Err(Error::InvalidInput(format!("unknown sync status '{other}'"))),
        }
    }
}

/// User-editable product fields, also the payload of queued operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl ProductDraft {
    /// Create a draft with the given name and default values
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price: 0.0,
            stock: 0,
            image: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reject values the catalog cannot hold
    pub fn validate(&self) -> Result<(), Error> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        if self.stock < 0 {
            return Err(Error::InvalidInput(format!(
                "stock must be non-negative, got {}",
                self.stock
            )));
        }
        Ok(())
    }
}

/// A catalog item as held in the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Server or temporary identifier
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    /// Encoded image payload or reference
    pub image: Option<String>,
    pub enabled: bool,
    pub sync_status: SyncStatus,
    /// Deleted locally, waiting for the remote delete to be acknowledged
    pub is_deleted: bool,
    /// Last modification (Unix ms)
    pub updated_at: i64,
}

impl Product {
    /// Build a record from user-editable fields
    pub fn from_draft(id: ProductId, draft: ProductDraft, sync_status: SyncStatus) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            price: draft.price,
            stock: draft.stock,
            image: draft.image,
            enabled: draft.enabled,
            sync_status,
            is_deleted: false,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// The user-editable fields of this record
    pub fn draft(&self) -> ProductDraft {
        ProductDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            image: self.image.clone(),
            enabled: self.enabled,
        }
    }

    /// Replace the user-editable fields and bump the modification time
    pub fn apply_draft(&mut self, draft: ProductDraft) {
        self.name = draft.name;
        self.description = draft.description;
        self.price = draft.price;
        self.stock = draft.stock;
        self.image = draft.image;
        self.enabled = draft.enabled;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Copy of this record under another identifier
    #[must_use]
    pub fn with_id(&self, id: ProductId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }
}

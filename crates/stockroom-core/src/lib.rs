//! stockroom-core - Core library for Stockroom
//!
//! This crate contains the offline-first catalog engine shared by every
//! Stockroom front end: the product model, the libSQL-backed local store and
//! pending operation log, the remote catalog client, and the sync engine that
//! replays queued edits and merges authoritative server state.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Operation, OperationKind, Product, ProductDraft, ProductId, SyncStatus};

//! Database layer for Stockroom

mod connection;
mod failure_repository;
mod id_mapping_repository;
mod meta_repository;
mod migrations;
mod operation_log;
mod product_repository;

pub use connection::Database;
pub use failure_repository::LibSqlSyncFailureRepository;
pub use id_mapping_repository::LibSqlIdMappingRepository;
pub use meta_repository::{LibSqlSyncMetaRepository, SyncMetaRepository};
pub use operation_log::{LibSqlOperationLog, OperationLog};
pub use product_repository::{LibSqlProductRepository, ProductRepository};

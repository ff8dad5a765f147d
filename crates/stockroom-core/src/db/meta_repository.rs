//! Sync metadata repository implementation

use crate::error::Result;
use libsql::Connection;

const LAST_SYNCED_AT: &str = "last_synced_at";

/// Trait for sync metadata storage (async)
#[allow(async_fn_in_trait)]
pub trait SyncMetaRepository {
    /// Time of the last completed pull-and-merge (Unix ms)
    async fn last_synced_at(&self) -> Result<Option<i64>>;

    async fn set_last_synced_at(&self, at: i64) -> Result<()>;
}

/// libSQL implementation of `SyncMetaRepository`
pub struct LibSqlSyncMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_meta WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

impl SyncMetaRepository for LibSqlSyncMetaRepository<'_> {
    async fn last_synced_at(&self) -> Result<Option<i64>> {
        Ok(self
            .get_value(LAST_SYNCED_AT)
            .await?
            .and_then(|value| value.parse().ok()))
    }

    async fn set_last_synced_at(&self, at: i64) -> Result<()> {
        self.set_value(LAST_SYNCED_AT, &at.to_string()).await
    }
}

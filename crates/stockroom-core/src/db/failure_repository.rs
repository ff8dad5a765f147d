//! Sync failure repository implementation

use crate::error::Result;
use crate::models::{Operation, OperationKind, ProductId, SyncFailure};
use crate::util::unix_millis_now;
use libsql::{Connection, Row};

use super::operation_log::{decode_payload, encode_payload};

/// libSQL storage for permanently rejected operations
pub struct LibSqlSyncFailureRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncFailureRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a rejected operation
    pub async fn record(&self, operation: &Operation, reason: &str) -> Result<SyncFailure> {
        let failed_at = unix_millis_now();
        let kind = &operation.kind;
        self.conn
            .execute(
                "INSERT INTO sync_failures
                    (operation_seq, action, target_id, payload, reason, failed_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                libsql::params![
                    operation.seq,
                    kind.action().as_str(),
                    kind.target_id().as_str(),
                    encode_payload(kind.payload())?,
                    reason,
                    failed_at
                ],
            )
            .await?;

        Ok(SyncFailure {
            id: self.conn.last_insert_rowid(),
            operation_seq: operation.seq,
            kind: kind.clone(),
            reason: reason.to_string(),
            failed_at,
        })
    }

    /// All outstanding failures, oldest first
    pub async fn list(&self) -> Result<Vec<SyncFailure>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, operation_seq, action, target_id, payload, reason, failed_at
                 FROM sync_failures ORDER BY id",
                (),
            )
            .await?;
        let mut failures = Vec::new();
        while let Some(row) = rows.next().await? {
            failures.push(Self::parse_failure(&row)?);
        }
        Ok(failures)
    }

    pub async fn get(&self, id: i64) -> Result<Option<SyncFailure>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, operation_seq, action, target_id, payload, reason, failed_at
                 FROM sync_failures WHERE id = ?",
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_failure(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_failures WHERE id = ?", [id])
            .await?;
        Ok(rows > 0)
    }

    /// Whether an outstanding failure targets `id` as given
    pub async fn references(&self, id: &ProductId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM sync_failures WHERE target_id = ?)",
                [id.as_str()],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_failures", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn parse_failure(row: &Row) -> Result<SyncFailure> {
        let action: String = row.get(2)?;
        let target: String = row.get(3)?;
        let payload = decode_payload(row.get_value(4)?)?;
        Ok(SyncFailure {
            id: row.get(0)?,
            operation_seq: row.get(1)?,
            kind: OperationKind::from_parts(action.parse()?, ProductId::new(target), payload)?,
            reason: row.get(5)?,
            failed_at: row.get(6)?,
        })
    }
}

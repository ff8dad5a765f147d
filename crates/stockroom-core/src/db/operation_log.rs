//! Pending operation log
//!
//! Append-only queue of mutations waiting to be acknowledged by the remote
//! catalog. The insertion sequence is the only ordering signal; entries are
//! never rewritten, only removed once the sync engine has settled them.

use crate::error::{Error, Result};
use crate::models::{Operation, OperationKind, ProductDraft, ProductId};
use crate::util::unix_millis_now;
use libsql::{Connection, Row, Value};

/// Trait for operation log storage (async)
#[allow(async_fn_in_trait)]
pub trait OperationLog {
    /// Append an operation and return it with its sequence number
    async fn enqueue(&self, kind: &OperationKind) -> Result<Operation>;

    /// All queued operations in enqueue order
    async fn peek_all(&self) -> Result<Vec<Operation>>;

    /// Remove the given sequence numbers; returns how many were removed
    async fn remove_all(&self, seqs: &[i64]) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool>;

    async fn len(&self) -> Result<usize>;
}

/// libSQL implementation of `OperationLog`
pub struct LibSqlOperationLog<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOperationLog<'a> {
    /// Create a new log with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether any queued operation targets `id` as given
    pub async fn references(&self, id: &ProductId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM pending_operations WHERE target_id = ?)",
                [id.as_str()],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    async fn has_create_for(&self, temp_id: &ProductId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM pending_operations
                               WHERE target_id = ? AND action = 'create')",
                [temp_id.as_str()],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    fn parse_operation(row: &Row) -> Result<Operation> {
        let seq: i64 = row.get(0)?;
        let action: String = row.get(1)?;
        let target: String = row.get(2)?;
        let payload = decode_payload(row.get_value(3)?)?;
        let kind = OperationKind::from_parts(action.parse()?, ProductId::new(target), payload)?;
        Ok(Operation {
            seq,
            kind,
            enqueued_at: row.get(4)?,
        })
    }
}

impl OperationLog for LibSqlOperationLog<'_> {
    async fn enqueue(&self, kind: &OperationKind) -> Result<Operation> {
        if let OperationKind::Create { temp_id, .. } = kind {
            if self.has_create_for(temp_id).await? {
                return Err(Error::IdentifierConflict(format!(
                    "a create for {temp_id} is already queued"
                )));
            }
        }

        let enqueued_at = unix_millis_now();
        self.conn
            .execute(
                "INSERT INTO pending_operations (action, target_id, payload, enqueued_at)
                 VALUES (?, ?, ?, ?)",
                libsql::params![
                    kind.action().as_str(),
                    kind.target_id().as_str(),
                    encode_payload(kind.payload())?,
                    enqueued_at
                ],
            )
            .await?;
        let seq = self.conn.last_insert_rowid();
        tracing::debug!("Queued {} for {} as #{seq}", kind.action(), kind.target_id());

        Ok(Operation {
            seq,
            kind: kind.clone(),
            enqueued_at,
        })
    }

    async fn peek_all(&self) -> Result<Vec<Operation>> {
        let mut rows = self
            .conn
            .query(
                "SELECT seq, action, target_id, payload, enqueued_at
                 FROM pending_operations ORDER BY seq",
                (),
            )
            .await?;
        let mut operations = Vec::new();
        while let Some(row) = rows.next().await? {
            operations.push(Self::parse_operation(&row)?);
        }
        Ok(operations)
    }

    async fn remove_all(&self, seqs: &[i64]) -> Result<usize> {
        let mut removed = 0;
        for seq in seqs {
            removed += self
                .conn
                .execute("DELETE FROM pending_operations WHERE seq = ?", [*seq])
                .await?;
        }
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn len(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_operations", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// JSON column value for an optional payload
pub(crate) fn encode_payload(payload: Option<&ProductDraft>) -> Result<Value> {
    Ok(match payload {
        Some(payload) => Value::Text(serde_json::to_string(payload)?),
        None => Value::Null,
    })
}

pub(crate) fn decode_payload(value: Value) -> Result<Option<ProductDraft>> {
    match value {
        Value::Text(json) => Ok(Some(serde_json::from_str(&json)?)),
        _ => Ok(None),
    }
}

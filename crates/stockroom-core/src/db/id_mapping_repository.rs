//! Temporary-to-server identifier mappings

use crate::error::Result;
use crate::models::ProductId;
use crate::util::unix_millis_now;
use libsql::Connection;

/// libSQL storage for acknowledged creates (`temp_id -> server_id`)
pub struct LibSqlIdMappingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlIdMappingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn record(&self, temp_id: &ProductId, server_id: &ProductId) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO id_mappings (temp_id, server_id, mapped_at) VALUES (?, ?, ?)",
                libsql::params![temp_id.as_str(), server_id.as_str(), unix_millis_now()],
            )
            .await?;
        Ok(())
    }

    /// Server id assigned to `temp_id`, if its create was acknowledged
    pub async fn get(&self, temp_id: &ProductId) -> Result<Option<ProductId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT server_id FROM id_mappings WHERE temp_id = ?",
                [temp_id.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(ProductId::new(row.get::<String>(0)?))),
            None => Ok(None),
        }
    }

    /// Every recorded mapping, oldest first
    pub async fn list(&self) -> Result<Vec<(ProductId, ProductId)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT temp_id, server_id FROM id_mappings ORDER BY mapped_at, rowid",
                (),
            )
            .await?;
        let mut mappings = Vec::new();
        while let Some(row) = rows.next().await? {
            mappings.push((
                ProductId::new(row.get::<String>(0)?),
                ProductId::new(row.get::<String>(1)?),
            ));
        }
        Ok(mappings)
    }
}

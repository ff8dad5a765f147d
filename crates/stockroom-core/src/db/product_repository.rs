//! Product repository implementation

use crate::error::Result;
use crate::models::{Product, ProductId, SyncStatus};
use libsql::{Connection, Row, Value};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock, image, enabled, sync_status, is_deleted, updated_at";

/// Trait for product storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ProductRepository {
    /// Get a product by ID, soft-deleted ones included
    async fn get(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Insert or replace the record keyed by `product.id`
    async fn put(&self, product: &Product) -> Result<()>;

    /// Remove a record; absent ids are not an error
    async fn delete(&self, id: &ProductId) -> Result<bool>;

    /// All records in insertion order
    async fn list(&self) -> Result<Vec<Product>>;

    /// Records that are not soft-deleted, in insertion order
    async fn list_visible(&self) -> Result<Vec<Product>>;

    /// Update only the sync status of a record
    async fn set_sync_status(&self, id: &ProductId, status: SyncStatus) -> Result<bool>;
}

/// libSQL implementation of `ProductRepository`
pub struct LibSqlProductRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlProductRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a product from a database row
    fn parse_product(row: &Row) -> Result<Product> {
        let id: String = row.get(0)?;
        let status: String = row.get(7)?;
        let image = match row.get_value(5)? {
            Value::Text(image) if !image.is_empty() => Some(image),
            _ => None,
        };
        Ok(Product {
            id: ProductId::new(id),
            name: row.get(1)?,
            description: row.get(2)?,
            price: row.get(3)?,
            stock: row.get(4)?,
            image,
            enabled: row.get::<i64>(6)? != 0,
            sync_status: status.parse().unwrap_or_default(),
            is_deleted: row.get::<i64>(8)? != 0,
            updated_at: row.get(9)?,
        })
    }

    async fn query_products(&self, sql: &str) -> Result<Vec<Product>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(Self::parse_product(&row)?);
        }
        Ok(products)
    }
}

impl ProductRepository for LibSqlProductRepository<'_> {
    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::parse_product(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn put(&self, product: &Product) -> Result<()> {
        let image = product.image.clone().map_or(Value::Null, Value::Text);
        // Upsert keeps the rowid, so insertion order survives edits
        self.conn
            .execute(
                "INSERT INTO products
                    (id, name, description, price, stock, image, enabled, sync_status, is_deleted, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    price = excluded.price,
                    stock = excluded.stock,
                    image = excluded.image,
                    enabled = excluded.enabled,
                    sync_status = excluded.sync_status,
                    is_deleted = excluded.is_deleted,
                    updated_at = excluded.updated_at",
                libsql::params![
                    product.id.as_str(),
                    product.name.as_str(),
                    product.description.as_str(),
                    product.price,
                    product.stock,
                    image,
                    i64::from(product.enabled),
                    product.sync_status.as_str(),
                    i64::from(product.is_deleted),
                    product.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM products WHERE id = ?", [id.as_str()])
            .await?;
        Ok(rows > 0)
    }

    async fn list(&self) -> Result<Vec<Product>> {
        self.query_products(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY rowid"
        ))
        .await
    }

    async fn list_visible(&self) -> Result<Vec<Product>> {
        self.query_products(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_deleted = 0 ORDER BY rowid"
        ))
        .await
    }

    async fn set_sync_status(&self, id: &ProductId, status: SyncStatus) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE products SET sync_status = ? WHERE id = ?",
                [status.as_str(), id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }
}

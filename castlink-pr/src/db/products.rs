//! Product database operations
//!
//! Products are created by upstream ingestion; this pipeline only reads
//! unresolved rows and stamps resolution attempts.

use castlink_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Product listing awaiting performer resolution
#[derive(Debug, Clone)]
pub struct Product {
    pub guid: Uuid,
    /// ASP the listing was ingested from
    pub source_name: String,
    /// ASP-native product code, resolution input
    pub original_product_id: String,
    /// Cross-ASP identity assigned by ingestion
    pub normalized_product_id: String,
    pub title: Option<String>,
}

impl Product {
    pub fn new(
        source_name: impl Into<String>,
        original_product_id: impl Into<String>,
        normalized_product_id: impl Into<String>,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            source_name: source_name.into(),
            original_product_id: original_product_id.into(),
            normalized_product_id: normalized_product_id.into(),
            title: None,
        }
    }
}

/// Upsert a product row (identity keyed on normalized_product_id)
pub async fn save_product(pool: &SqlitePool, product: &Product) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (
            guid, source_name, original_product_id, normalized_product_id, title,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(normalized_product_id) DO UPDATE SET
            title = excluded.title,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(product.guid.to_string())
    .bind(&product.source_name)
    .bind(&product.original_product_id)
    .bind(&product.normalized_product_id)
    .bind(&product.title)
    .execute(pool)
    .await?;

    Ok(())
}

/// Products with no performer link yet, never-attempted first
pub async fn list_unresolved(pool: &SqlitePool, limit: u32) -> Result<Vec<Product>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, source_name, original_product_id, normalized_product_id, title
        FROM products p
        WHERE NOT EXISTS (
            SELECT 1 FROM product_performers pp WHERE pp.product_id = p.guid
        )
        ORDER BY p.last_attempt_at IS NOT NULL, p.last_attempt_at, p.created_at
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        let guid_str: String = row.get("guid");
        products.push(Product {
            guid: Uuid::parse_str(&guid_str)
                .map_err(|e| castlink_common::Error::Internal(format!("Invalid UUID: {e}")))?,
            source_name: row.get("source_name"),
            original_product_id: row.get("original_product_id"),
            normalized_product_id: row.get("normalized_product_id"),
            title: row.get("title"),
        });
    }

    Ok(products)
}

/// Stamp a resolution attempt so truncated runs rotate through the backlog
pub async fn mark_attempt(pool: &SqlitePool, product_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE products SET last_attempt_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
         WHERE guid = ?",
    )
    .bind(product_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

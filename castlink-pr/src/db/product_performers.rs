//! Product/performer association
//!
//! One row per (product, performer) pair, "this performer appears in this
//! product". Links are commutative and idempotent; re-linking an existing
//! pair is a no-op.

use castlink_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Result of a link attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOutcome {
    /// False when the pair already existed
    pub created: bool,
}

/// Idempotently associate a performer with a product
pub async fn link(
    pool: &SqlitePool,
    product_id: Uuid,
    performer_id: Uuid,
) -> Result<LinkOutcome> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO product_performers (product_id, performer_id, created_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(product_id, performer_id) DO NOTHING
        "#,
    )
    .bind(product_id.to_string())
    .bind(performer_id.to_string())
    .execute(pool)
    .await?
    .rows_affected();

    Ok(LinkOutcome {
        created: inserted == 1,
    })
}

/// Performer ids linked to a product
pub async fn performers_for_product(pool: &SqlitePool, product_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT performer_id FROM product_performers WHERE product_id = ? ORDER BY performer_id",
    )
    .bind(product_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id,)| {
            Uuid::parse_str(&id).map_err(|e| {
                castlink_common::Error::Internal(format!("Invalid UUID in product_performers: {e}"))
            })
        })
        .collect()
}

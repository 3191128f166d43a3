//! Lookup cache persistence
//!
//! Memoizes what each external index answered for a canonical code variant,
//! so re-resolution never repeats a network query. One row per
//! (code, source); the latest crawl overwrites, never appends. Entries are
//! not authoritative: every hit still passes the name validator before
//! being trusted. No TTL here, staleness is handled by the collaborators'
//! re-crawl cadence.

use castlink_common::Result;
use sqlx::SqlitePool;

/// Cached candidate names for (code, source), if the pair was ever queried.
///
/// `Some(vec![])` is a memoized empty answer; `None` means never queried.
pub async fn get(pool: &SqlitePool, code: &str, source: &str) -> Result<Option<Vec<String>>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT names FROM lookup_cache WHERE code = ? AND source = ?")
            .bind(code)
            .bind(source)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Upsert the candidate list for (code, source)
pub async fn put(pool: &SqlitePool, code: &str, source: &str, names: &[String]) -> Result<()> {
    let json = serde_json::to_string(names)?;

    sqlx::query(
        r#"
        INSERT INTO lookup_cache (code, source, names, fetched_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(code, source) DO UPDATE SET
            names = excluded.names,
            fetched_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(code)
    .bind(source)
    .bind(&json)
    .execute(pool)
    .await?;

    Ok(())
}

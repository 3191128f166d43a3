//! Performer identity store
//!
//! Canonical performer records plus secondary-spelling aliases. Creation is
//! safe under concurrent invocation: the name column carries a uniqueness
//! constraint and `get_or_create` falls back to a re-select when an insert
//! loses the race, so two resolvers racing on the same new name converge on
//! one row without external locking.

use castlink_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Canonical performer record
#[derive(Debug, Clone)]
pub struct Performer {
    pub guid: Uuid,
    pub name: String,
    /// SQLite CURRENT_TIMESTAMP text, lexicographically ordered
    pub created_at: String,
}

fn row_to_performer(row: &sqlx::sqlite::SqliteRow) -> Result<Performer> {
    let guid_str: String = row.get("guid");
    Ok(Performer {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in performers: {e}")))?,
        name: row.get("name"),
        created_at: row.get("created_at"),
    })
}

/// Look up a performer by canonical name
pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Performer>> {
    let row = sqlx::query("SELECT guid, name, created_at FROM performers WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_performer).transpose()
}

/// Look up the performer an alias spelling maps to
pub async fn find_by_alias(pool: &SqlitePool, alias: &str) -> Result<Option<Performer>> {
    let row = sqlx::query(
        r#"
        SELECT p.guid, p.name, p.created_at
        FROM performer_aliases a
        JOIN performers p ON p.guid = a.performer_id
        WHERE a.alias = ?
        "#,
    )
    .bind(alias)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_performer).transpose()
}

/// Resolve a normalized name to a performer id, creating the record on
/// first sight.
///
/// Lookup order: canonical name, then alias, then insert. The insert uses
/// `ON CONFLICT DO NOTHING` + re-select so a lost race returns the winner's
/// id instead of failing.
pub async fn get_or_create(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    if let Some(existing) = find_by_name(pool, name).await? {
        return Ok(existing.guid);
    }
    if let Some(existing) = find_by_alias(pool, name).await? {
        tracing::debug!(alias = %name, canonical = %existing.name, "Resolved via alias");
        return Ok(existing.guid);
    }

    let guid = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO performers (guid, name, created_at, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(guid.to_string())
    .bind(name)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        tracing::info!(name = %name, guid = %guid, "Created performer");
        return Ok(guid);
    }

    // Lost a creation race; the winner's row must exist now
    match find_by_name(pool, name).await? {
        Some(existing) => Ok(existing.guid),
        None => Err(Error::Internal(format!(
            "Performer '{name}' vanished after insert conflict"
        ))),
    }
}

/// Register an alias spelling for a performer. Returns false if the alias
/// was already present.
pub async fn add_alias(pool: &SqlitePool, alias: &str, performer_id: Uuid) -> Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO performer_aliases (alias, performer_id, created_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(alias) DO NOTHING
        "#,
    )
    .bind(alias)
    .bind(performer_id.to_string())
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted == 1)
}

/// All performer rows, for the cleanup engine's scan phase
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Performer>> {
    let rows = sqlx::query("SELECT guid, name, created_at FROM performers")
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_performer).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        castlink_common::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn get_or_create_returns_same_id_for_same_name() {
        let pool = setup_pool().await;
        let first = get_or_create(&pool, "さくら").await.unwrap();
        let second = get_or_create(&pool, "さくら").await.unwrap();
        assert_eq!(first, second);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM performers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn alias_resolves_to_canonical_performer() {
        let pool = setup_pool().await;
        let canonical = get_or_create(&pool, "橋本 ありな").await.unwrap();
        assert!(add_alias(&pool, "橋本ありな", canonical).await.unwrap());

        let via_alias = get_or_create(&pool, "橋本ありな").await.unwrap();
        assert_eq!(via_alias, canonical);

        // No second performer row was created for the alias spelling
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM performers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn insert_conflict_falls_back_to_reselect() {
        let pool = setup_pool().await;
        // Simulate the losing side of a race: the row already exists under
        // a different guid when the insert runs.
        let winner = Uuid::new_v4();
        sqlx::query("INSERT INTO performers (guid, name) VALUES (?, ?)")
            .bind(winner.to_string())
            .bind("まゆみ")
            .execute(&pool)
            .await
            .unwrap();

        let resolved = get_or_create(&pool, "まゆみ").await.unwrap();
        assert_eq!(resolved, winner);
    }

    #[tokio::test]
    async fn duplicate_alias_reports_not_created() {
        let pool = setup_pool().await;
        let id = get_or_create(&pool, "さくら").await.unwrap();
        assert!(add_alias(&pool, "サクラ", id).await.unwrap());
        assert!(!add_alias(&pool, "サクラ", id).await.unwrap());
    }
}

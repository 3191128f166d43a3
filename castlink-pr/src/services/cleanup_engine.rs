//! Performer dedup and data-quality cleanup
//!
//! Batch maintenance over the performer registry. Spelling drift creates
//! multiple performer rows that canonicalize to the same name; crawl
//! garbage creates rows that fail validation outright. This engine merges
//! the former, purges the latter, scrubs invalid names out of the lookup
//! cache, and removes dangling aliases. Re-running it with nothing to
//! repair is a no-op.
//!
//! Merges are transactionally scoped per cluster, so the engine may run
//! concurrently with the resolver; it must not run concurrently with
//! itself.

use crate::db::performers::{self, Performer};
use crate::services::name_validator::NameValidator;
use castlink_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Counts of everything one cleanup run repaired
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub duplicate_clusters: u64,
    pub duplicates_merged: u64,
    pub links_repointed: u64,
    pub conflicting_links_dropped: u64,
    pub invalid_performers_removed: u64,
    pub invalid_links_removed: u64,
    pub cache_rows_scrubbed: u64,
    pub dangling_aliases_removed: u64,
}

/// Batch dedup/cleanup job over the performer registry
pub struct CleanupEngine {
    db: SqlitePool,
    validator: NameValidator,
}

impl CleanupEngine {
    pub fn new(db: SqlitePool, validator: NameValidator) -> Self {
        Self { db, validator }
    }

    /// Run all cleanup passes and report counts
    pub async fn run(&self) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        self.merge_duplicates(&mut report).await?;
        self.purge_invalid_performers(&mut report).await?;
        self.scrub_invalid_cache(&mut report).await?;
        self.remove_dangling_aliases(&mut report).await?;

        tracing::info!(
            duplicate_clusters = report.duplicate_clusters,
            duplicates_merged = report.duplicates_merged,
            links_repointed = report.links_repointed,
            conflicting_links_dropped = report.conflicting_links_dropped,
            invalid_performers_removed = report.invalid_performers_removed,
            invalid_links_removed = report.invalid_links_removed,
            cache_rows_scrubbed = report.cache_rows_scrubbed,
            dangling_aliases_removed = report.dangling_aliases_removed,
            "Cleanup run complete"
        );

        Ok(report)
    }

    /// Group performers by canonical name and merge each >1 cluster into a
    /// deterministic survivor.
    async fn merge_duplicates(&self, report: &mut CleanupReport) -> Result<()> {
        let all = performers::list_all(&self.db).await?;

        let mut clusters: HashMap<String, Vec<Performer>> = HashMap::new();
        for performer in all {
            // Rows that fail validation are the purge pass's problem
            if let Some(canonical) = self.validator.normalize(&performer.name) {
                clusters.entry(canonical).or_default().push(performer);
            }
        }

        for (canonical, mut members) in clusters {
            if members.len() < 2 {
                continue;
            }
            // Survivor: earliest created, guid as tie-break. Deterministic
            // across the whole run.
            members.sort_by(|a, b| {
                (a.created_at.as_str(), a.guid).cmp(&(b.created_at.as_str(), b.guid))
            });
            let survivor = members.remove(0);

            tracing::info!(
                canonical = %canonical,
                survivor = %survivor.guid,
                duplicates = members.len(),
                "Merging duplicate performer cluster"
            );
            report.duplicate_clusters += 1;
            self.merge_cluster(&survivor, &members, report).await?;
        }

        Ok(())
    }

    /// Fold duplicate rows into the survivor inside one transaction.
    ///
    /// Per duplicate the order is fixed: first drop its links that would
    /// collide with an existing survivor link, then re-point the remainder,
    /// then retire the row. Re-pointing before clearing collisions would
    /// violate the (product, performer) uniqueness constraint.
    async fn merge_cluster(
        &self,
        survivor: &Performer,
        duplicates: &[Performer],
        report: &mut CleanupReport,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let survivor_id = survivor.guid.to_string();

        for dup in duplicates {
            let dup_id = dup.guid.to_string();

            let dropped = sqlx::query(
                r#"
                DELETE FROM product_performers
                WHERE performer_id = ?
                  AND product_id IN (
                      SELECT product_id FROM product_performers WHERE performer_id = ?
                  )
                "#,
            )
            .bind(&dup_id)
            .bind(&survivor_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            let repointed = sqlx::query(
                "UPDATE product_performers SET performer_id = ? WHERE performer_id = ?",
            )
            .bind(&survivor_id)
            .bind(&dup_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            // Aliases follow the links: drop any that would shadow the
            // survivor's canonical name, re-point the rest, and keep the
            // duplicate's drifted spelling reachable as an alias.
            sqlx::query("DELETE FROM performer_aliases WHERE performer_id = ? AND alias = ?")
                .bind(&dup_id)
                .bind(&survivor.name)
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE performer_aliases SET performer_id = ? WHERE performer_id = ?")
                .bind(&survivor_id)
                .bind(&dup_id)
                .execute(&mut *tx)
                .await?;

            if dup.name != survivor.name {
                sqlx::query(
                    r#"
                    INSERT INTO performer_aliases (alias, performer_id, created_at)
                    VALUES (?, ?, CURRENT_TIMESTAMP)
                    ON CONFLICT(alias) DO NOTHING
                    "#,
                )
                .bind(&dup.name)
                .bind(&survivor_id)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("DELETE FROM performers WHERE guid = ?")
                .bind(&dup_id)
                .execute(&mut *tx)
                .await?;

            report.conflicting_links_dropped += dropped;
            report.links_repointed += repointed;
            report.duplicates_merged += 1;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove performers whose stored name fails validation, links first
    async fn purge_invalid_performers(&self, report: &mut CleanupReport) -> Result<()> {
        let all = performers::list_all(&self.db).await?;

        for performer in all {
            if self.validator.is_valid(&performer.name) {
                continue;
            }

            tracing::info!(
                guid = %performer.guid,
                name = %performer.name,
                "Purging invalid performer"
            );

            let mut tx = self.db.begin().await?;
            let id = performer.guid.to_string();

            let links = sqlx::query("DELETE FROM product_performers WHERE performer_id = ?")
                .bind(&id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            sqlx::query("DELETE FROM performer_aliases WHERE performer_id = ?")
                .bind(&id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM performers WHERE guid = ?")
                .bind(&id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            report.invalid_links_removed += links;
            report.invalid_performers_removed += 1;
        }

        Ok(())
    }

    /// Drop invalid names out of cached candidate lists so they are never
    /// re-offered; rows left empty (or undecodable) are deleted.
    async fn scrub_invalid_cache(&self, report: &mut CleanupReport) -> Result<()> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT code, source, names FROM lookup_cache")
                .fetch_all(&self.db)
                .await?;

        for (code, source, json) in rows {
            let names: Vec<String> = match serde_json::from_str(&json) {
                Ok(names) => names,
                Err(_) => {
                    // Undecodable payload: the row can never be served
                    sqlx::query("DELETE FROM lookup_cache WHERE code = ? AND source = ?")
                        .bind(&code)
                        .bind(&source)
                        .execute(&self.db)
                        .await?;
                    report.cache_rows_scrubbed += 1;
                    continue;
                }
            };

            let kept: Vec<String> = names
                .iter()
                .filter(|n| self.validator.is_valid(n))
                .cloned()
                .collect();

            // Memoized empty answers have nothing invalid in them and stay
            if kept.len() == names.len() {
                continue;
            }

            if kept.is_empty() {
                sqlx::query("DELETE FROM lookup_cache WHERE code = ? AND source = ?")
                    .bind(&code)
                    .bind(&source)
                    .execute(&self.db)
                    .await?;
            } else {
                crate::db::lookup_cache::put(&self.db, &code, &source, &kept).await?;
            }

            tracing::debug!(
                code = %code,
                source = %source,
                dropped = names.len() - kept.len(),
                "Scrubbed invalid names from cache row"
            );
            report.cache_rows_scrubbed += 1;
        }

        Ok(())
    }

    /// Aliases must reference an existing performer
    async fn remove_dangling_aliases(&self, report: &mut CleanupReport) -> Result<()> {
        let removed = sqlx::query(
            r#"
            DELETE FROM performer_aliases
            WHERE performer_id NOT IN (SELECT guid FROM performers)
            "#,
        )
        .execute(&self.db)
        .await?
        .rows_affected();

        report.dangling_aliases_removed += removed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::lookup_cache;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        castlink_common::db::init_schema(&pool).await.unwrap();
        pool
    }

    fn engine(pool: &SqlitePool) -> CleanupEngine {
        CleanupEngine::new(pool.clone(), NameValidator::default())
    }

    #[tokio::test]
    async fn clean_registry_is_a_noop() {
        let pool = setup_pool().await;
        crate::db::performers::get_or_create(&pool, "さくら").await.unwrap();

        let report = engine(&pool).run().await.unwrap();
        assert_eq!(report, CleanupReport::default());
    }

    #[tokio::test]
    async fn invalid_performer_is_purged_with_links() {
        let pool = setup_pool().await;
        let bad = crate::db::performers::get_or_create(&pool, "page two").await.unwrap();
        // Make the stored name invalid after creation (simulates legacy rows)
        sqlx::query("UPDATE performers SET name = '<<素人>>' WHERE guid = ?")
            .bind(bad.to_string())
            .execute(&pool)
            .await
            .unwrap();
        crate::db::product_performers::link(&pool, uuid::Uuid::new_v4(), bad)
            .await
            .unwrap();

        let report = engine(&pool).run().await.unwrap();
        assert_eq!(report.invalid_performers_removed, 1);
        assert_eq!(report.invalid_links_removed, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM performers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn invalid_cache_names_are_scrubbed() {
        let pool = setup_pool().await;
        lookup_cache::put(
            &pool,
            "GVH-802",
            "wikidex",
            &["さくら".to_string(), "ランキング".to_string()],
        )
        .await
        .unwrap();
        lookup_cache::put(&pool, "BDSX-1902", "wikidex", &["素人".to_string()])
            .await
            .unwrap();

        let report = engine(&pool).run().await.unwrap();
        assert_eq!(report.cache_rows_scrubbed, 2);

        // Partially valid row keeps the valid name, fully invalid row is gone
        let kept = lookup_cache::get(&pool, "GVH-802", "wikidex").await.unwrap().unwrap();
        assert_eq!(kept, vec!["さくら".to_string()]);
        assert_eq!(lookup_cache::get(&pool, "BDSX-1902", "wikidex").await.unwrap(), None);
    }

    #[tokio::test]
    async fn dangling_alias_is_removed() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO performer_aliases (alias, performer_id) VALUES (?, ?)")
            .bind("サクラ")
            .bind(uuid::Uuid::new_v4().to_string())
            .execute(&pool)
            .await
            .unwrap();

        let report = engine(&pool).run().await.unwrap();
        assert_eq!(report.dangling_aliases_removed, 1);
    }
}

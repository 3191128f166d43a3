//! Crawler hand-off ingestion
//!
//! Crawlers own fetching and parsing the external indexes; they hand this
//! pipeline already-extracted `(source, code, names)` tuples, optionally
//! with the index's own alias list. Ingestion validates everything and
//! upserts the lookup cache under the code's canonical form — invalid
//! names are dropped here and never stored.
//!
//! Input format: one JSON object per line.

use crate::db::{lookup_cache, performers};
use crate::normalize;
use crate::services::name_validator::NameValidator;
use castlink_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;

/// One crawled lookup: candidates the index lists for a product code
#[derive(Debug, Deserialize)]
pub struct CrawlRecord {
    pub source: String,
    pub code: String,
    #[serde(default)]
    pub names: Vec<String>,
    /// The index's own alias list, secondary spelling → canonical name
    #[serde(default)]
    pub aliases: Vec<AliasEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub canonical: String,
}

/// Counts from one ingest run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub records: u64,
    pub cache_entries: u64,
    pub invalid_names: u64,
    pub aliases_registered: u64,
    pub skipped_records: u64,
}

/// Validates crawler output and feeds the lookup cache and alias registry
pub struct CrawlerIngest {
    db: SqlitePool,
    validator: NameValidator,
}

impl CrawlerIngest {
    pub fn new(db: SqlitePool, validator: NameValidator) -> Self {
        Self { db, validator }
    }

    /// Ingest a JSON-lines crawl dump
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let content = std::fs::read_to_string(path)?;
        let mut report = IngestReport::default();

        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: CrawlRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line = lineno + 1, error = %e, "Skipping unparseable crawl record");
                    report.skipped_records += 1;
                    continue;
                }
            };
            self.ingest_record(&record, &mut report).await?;
        }

        tracing::info!(
            records = report.records,
            cache_entries = report.cache_entries,
            invalid_names = report.invalid_names,
            aliases_registered = report.aliases_registered,
            skipped_records = report.skipped_records,
            "Crawl ingest complete"
        );

        Ok(report)
    }

    /// Validate and store one crawled lookup
    pub async fn ingest_record(
        &self,
        record: &CrawlRecord,
        report: &mut IngestReport,
    ) -> Result<()> {
        let variants = normalize::variants(&record.code);
        let cache_key = match variants.first() {
            Some(key) => key.clone(),
            None => {
                tracing::warn!(source = %record.source, "Skipping crawl record with empty code");
                report.skipped_records += 1;
                return Ok(());
            }
        };
        report.records += 1;

        let mut valid_names = Vec::with_capacity(record.names.len());
        for raw in &record.names {
            match self.validator.normalize(raw) {
                Some(canonical) => valid_names.push(canonical),
                None => report.invalid_names += 1,
            }
        }

        // An all-invalid crawl still memoizes an empty answer for the pair
        lookup_cache::put(&self.db, &cache_key, &record.source, &valid_names).await?;
        report.cache_entries += 1;

        for entry in &record.aliases {
            let canonical = match self.validator.normalize(&entry.canonical) {
                Some(canonical) => canonical,
                None => {
                    report.invalid_names += 1;
                    continue;
                }
            };
            let alias = match self.validator.normalize(&entry.alias) {
                Some(alias) => alias,
                None => {
                    report.invalid_names += 1;
                    continue;
                }
            };
            if alias == canonical {
                continue;
            }

            let performer_id = performers::get_or_create(&self.db, &canonical).await?;
            if performers::add_alias(&self.db, &alias, performer_id).await? {
                report.aliases_registered += 1;
            }
        }

        Ok(())
    }
}

//! Batch resolution loop
//!
//! Walks the unresolved-product backlog, resolving each product
//! independently: normalize its code, resolve candidates, validate names,
//! get-or-create identities, link. Runs under a job time budget (the
//! production scheduler imposes an execution limit); when the deadline
//! passes the loop stops starting new products and exits cleanly. Every
//! write along the way is individually idempotent, so partial progress is
//! always safe and the next run picks up where this one stopped.
//!
//! A persistence failure is fatal for the current product only; the run
//! continues and reports the failure count at the end.

use crate::db::{performers, product_performers, products};
use crate::services::name_validator::NameValidator;
use crate::services::source_resolver::SourceResolver;
use castlink_common::Result;
use sqlx::SqlitePool;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Counts from one resolution run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub attempted: u64,
    pub resolved: u64,
    pub no_match: u64,
    pub invalid_candidates: u64,
    pub uncorroborated_skipped: u64,
    pub persistence_failures: u64,
    pub links_created: u64,
}

/// Deadline-aware batch loop over unresolved products
pub struct ResolutionRunner {
    db: SqlitePool,
    resolver: SourceResolver,
    validator: NameValidator,
    batch_limit: u32,
    job_budget: Duration,
}

impl ResolutionRunner {
    pub fn new(
        db: SqlitePool,
        resolver: SourceResolver,
        validator: NameValidator,
        batch_limit: u32,
        job_budget: Duration,
    ) -> Self {
        Self {
            db,
            resolver,
            validator,
            batch_limit,
            job_budget,
        }
    }

    /// Resolve the backlog until it is exhausted, the budget runs out, or
    /// the token is cancelled. Products left unresolved wait for the next
    /// scheduled run.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<ResolutionReport> {
        let deadline = Instant::now() + self.job_budget;
        let backlog = products::list_unresolved(&self.db, self.batch_limit).await?;

        tracing::info!(
            backlog = backlog.len(),
            budget_secs = self.job_budget.as_secs(),
            "Starting resolution run"
        );

        let mut report = ResolutionReport::default();

        for product in backlog {
            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping resolution run");
                break;
            }
            if Instant::now() >= deadline {
                tracing::info!("Job budget exhausted, leaving remaining products for next run");
                break;
            }

            report.attempted += 1;
            if let Err(e) = products::mark_attempt(&self.db, product.guid).await {
                tracing::warn!(product = %product.guid, error = %e, "Failed to stamp attempt");
                report.persistence_failures += 1;
                continue;
            }

            match self.resolve_product(&product, &mut report).await {
                Ok(true) => report.resolved += 1,
                Ok(false) => {
                    tracing::debug!(
                        product = %product.guid,
                        code = %product.original_product_id,
                        "No performer match"
                    );
                    report.no_match += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        product = %product.guid,
                        error = %e,
                        "Resolution failed, continuing with next product"
                    );
                    report.persistence_failures += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            resolved = report.resolved,
            no_match = report.no_match,
            invalid_candidates = report.invalid_candidates,
            uncorroborated_skipped = report.uncorroborated_skipped,
            persistence_failures = report.persistence_failures,
            links_created = report.links_created,
            "Resolution run complete"
        );

        Ok(report)
    }

    /// Returns true when at least one performer got linked
    async fn resolve_product(
        &self,
        product: &products::Product,
        report: &mut ResolutionReport,
    ) -> Result<bool> {
        let resolution = match self.resolver.resolve(&product.original_product_id).await? {
            Some(resolution) => resolution,
            None => return Ok(false),
        };

        let mut linked = false;
        for raw in &resolution.names {
            let canonical = match self.validator.normalize(raw) {
                Some(canonical) => canonical,
                None => {
                    // Expected garbage, dropped without noise
                    report.invalid_candidates += 1;
                    continue;
                }
            };

            // A keyword-matched free-text source is only trusted to
            // auto-link when the candidate looks like a full name
            if resolution.free_text && !self.validator.is_full_name(&canonical) {
                tracing::debug!(
                    name = %canonical,
                    source = %resolution.source,
                    "Skipping uncorroborated partial name from free-text source"
                );
                report.uncorroborated_skipped += 1;
                continue;
            }

            let performer_id = performers::get_or_create(&self.db, &canonical).await?;
            let outcome = product_performers::link(&self.db, product.guid, performer_id).await?;
            if outcome.created {
                tracing::info!(
                    product = %product.normalized_product_id,
                    performer = %canonical,
                    source = %resolution.source,
                    variant = %resolution.variant,
                    "Linked performer to product"
                );
                report.links_created += 1;
            }
            linked = true;
        }

        Ok(linked)
    }
}

//! Service modules for the performer resolution pipeline

pub mod cleanup_engine;
pub mod crawler_ingest;
pub mod name_validator;
pub mod resolution_runner;
pub mod source_resolver;
pub mod wiki_client;

pub use cleanup_engine::{CleanupEngine, CleanupReport};
pub use crawler_ingest::{AliasEntry, CrawlRecord, CrawlerIngest, IngestReport};
pub use name_validator::{NameValidator, ValidatorConfig};
pub use resolution_runner::{ResolutionReport, ResolutionRunner};
pub use source_resolver::{QueryError, Resolution, SourceConfig, SourceQuery, SourceResolver};
pub use wiki_client::WikiIndexClient;

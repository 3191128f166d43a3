//! Pipeline configuration
//!
//! All resolution tunables live in `castlink.toml` inside the root folder;
//! individual values can be overridden through `CASTLINK_*` environment
//! variables. A missing file means defaults (which configure no sources,
//! so resolution is cache-only until sources are added).
//!
//! ```toml
//! job_budget_secs = 240
//! batch_limit = 500
//!
//! [[sources]]
//! name = "wikidex"
//! endpoint = "http://127.0.0.1:7110/lookup"
//! min_interval_ms = 1500
//!
//! [[sources]]
//! name = "blogagg"
//! endpoint = "http://127.0.0.1:7111/lookup"
//! free_text = true
//!
//! [validator]
//! max_chars = 24
//! denylist = ["素人", "企画"]
//! ```

use crate::services::name_validator::ValidatorConfig;
use crate::services::source_resolver::SourceConfig;
use castlink_common::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// External indexes in trust order, most trusted first
    pub sources: Vec<SourceConfig>,
    pub validator: ValidatorConfig,
    /// Wall-clock budget for one resolution run
    pub job_budget_secs: u64,
    /// Per-call timeout for live index queries
    pub request_timeout_secs: u64,
    /// Max products pulled from the backlog per run
    pub batch_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            validator: ValidatorConfig::default(),
            job_budget_secs: 300,
            request_timeout_secs: 30,
            batch_limit: 500,
        }
    }
}

/// Load the pipeline config, then apply environment overrides
pub fn load(path: &Path) -> Result<PipelineConfig> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {e}", path.display())))?
    } else {
        tracing::info!(path = %path.display(), "No pipeline config file, using defaults");
        PipelineConfig::default()
    };

    apply_env_overrides(&mut config);

    if config.sources.is_empty() {
        tracing::warn!("No sources configured; resolution will be cache-only");
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut PipelineConfig) {
    override_u64("CASTLINK_JOB_BUDGET_SECS", &mut config.job_budget_secs);
    override_u64(
        "CASTLINK_REQUEST_TIMEOUT_SECS",
        &mut config.request_timeout_secs,
    );
    let mut batch = config.batch_limit as u64;
    override_u64("CASTLINK_BATCH_LIMIT", &mut batch);
    config.batch_limit = batch.min(u32::MAX as u64) as u32;
}

fn override_u64(var: &str, value: &mut u64) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(parsed) => {
                tracing::info!(var = var, value = parsed, "Environment override");
                *value = parsed;
            }
            Err(_) => {
                tracing::warn!(var = var, raw = %raw, "Ignoring unparseable override");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // All serialized: apply_env_overrides reads process-wide variables

    #[test]
    #[serial_test::serial]
    fn missing_file_yields_defaults() {
        let config = load(Path::new("/nonexistent/castlink.toml")).unwrap();
        assert_eq!(config.job_budget_secs, 300);
        assert!(config.sources.is_empty());
    }

    #[test]
    #[serial_test::serial]
    fn toml_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
job_budget_secs = 120

[[sources]]
name = "wikidex"
endpoint = "http://127.0.0.1:7110/lookup"
min_interval_ms = 1500

[[sources]]
name = "blogagg"
endpoint = "http://127.0.0.1:7111/lookup"
free_text = true

[validator]
max_chars = 24
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.job_budget_secs, 120);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "wikidex");
        assert_eq!(config.sources[0].min_interval_ms, 1500);
        assert!(config.sources[1].free_text);
        assert_eq!(config.validator.max_chars, 24);
        // Unset fields keep their defaults
        assert_eq!(config.batch_limit, 500);
        assert_eq!(config.validator.min_chars, 2);
    }

    #[test]
    #[serial_test::serial]
    fn invalid_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "sources = 3").unwrap();
        file.flush().unwrap();
        assert!(load(file.path()).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn environment_overrides_file_value() {
        std::env::set_var("CASTLINK_JOB_BUDGET_SECS", "42");
        let config = load(Path::new("/nonexistent/castlink.toml")).unwrap();
        std::env::remove_var("CASTLINK_JOB_BUDGET_SECS");
        assert_eq!(config.job_budget_secs, 42);
    }

    #[test]
    #[serial_test::serial]
    fn unparseable_override_is_ignored() {
        std::env::set_var("CASTLINK_JOB_BUDGET_SECS", "soon");
        let config = load(Path::new("/nonexistent/castlink.toml")).unwrap();
        std::env::remove_var("CASTLINK_JOB_BUDGET_SECS");
        assert_eq!(config.job_budget_secs, 300);
    }
}

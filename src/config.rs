//! # Engine Configuration Module
//!
//! Runtime settings for the route engine, loaded from environment variables or
//! from a TOML/YAML file. Every field has a default, so an empty file or an
//! empty environment yields [`EngineConfig::default()`].
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `BRRTAPI_SLOW_TASK_MS` | `slow_task_threshold_ms` | `100` |
//! | `BRRTAPI_TASK_TIMEOUT_MS` | `default_task_timeout_ms` | unset |
//! | `BRRTAPI_TASK_EVENT_CAPACITY` | `task_event_capacity` | `1024` |
//! | `BRRTAPI_EXPOSE_ERRORS` | `expose_internal_errors` | `false` |
//! | `BRRTAPI_VALIDATE_RESPONSES` | `validate_responses` | `true` |
//! | `BRRTAPI_DOCS_PATH` | `docs_path` | `/openapi.json` |
//! | `BRRTAPI_DOCS_YAML_PATH` | `docs_yaml_path` | `/openapi.yaml` |
//! | `BRRTAPI_SCHEMA_PATH_PREFIX` | `schema_path_prefix` | `/schemas` |
//! | `BRRTAPI_REGISTER_DOCS` | `register_docs_routes` | `true` |
//!
//! ## File Configuration
//!
//! ```toml
//! slow_task_threshold_ms = 250
//! expose_internal_errors = true
//! docs_path = "/api/openapi.json"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration for [`crate::pipeline::Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Elapsed time after which a running background task is reported as slow
    pub slow_task_threshold_ms: u64,
    /// Budget applied to tasks submitted without their own
    pub default_task_timeout_ms: Option<u64>,
    /// Capacity of the task event broadcast channel
    pub task_event_capacity: usize,
    /// Include internal error messages in 5xx bodies (dev only)
    pub expose_internal_errors: bool,
    /// Check handler output against the declared response schema
    pub validate_responses: bool,
    /// Route serving the generated document as JSON
    pub docs_path: String,
    /// Route serving the generated document as YAML
    pub docs_yaml_path: String,
    /// Prefix of the per-route schema introspection route
    pub schema_path_prefix: String,
    /// Pre-register the documentation routes when absent
    pub register_docs_routes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slow_task_threshold_ms: 100,
            default_task_timeout_ms: None,
            task_event_capacity: 1024,
            expose_internal_errors: false,
            validate_responses: true,
            docs_path: "/openapi.json".to_string(),
            docs_yaml_path: "/openapi.yaml".to_string(),
            schema_path_prefix: "/schemas".to_string(),
            register_docs_routes: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            slow_task_threshold_ms: env_parse("BRRTAPI_SLOW_TASK_MS")
                .unwrap_or(defaults.slow_task_threshold_ms),
            default_task_timeout_ms: env_parse("BRRTAPI_TASK_TIMEOUT_MS"),
            task_event_capacity: env_parse("BRRTAPI_TASK_EVENT_CAPACITY")
                .unwrap_or(defaults.task_event_capacity),
            expose_internal_errors: env_parse("BRRTAPI_EXPOSE_ERRORS")
                .unwrap_or(defaults.expose_internal_errors),
            validate_responses: env_parse("BRRTAPI_VALIDATE_RESPONSES")
                .unwrap_or(defaults.validate_responses),
            docs_path: env::var("BRRTAPI_DOCS_PATH").unwrap_or(defaults.docs_path),
            docs_yaml_path: env::var("BRRTAPI_DOCS_YAML_PATH").unwrap_or(defaults.docs_yaml_path),
            schema_path_prefix: env::var("BRRTAPI_SCHEMA_PATH_PREFIX")
                .unwrap_or(defaults.schema_path_prefix),
            register_docs_routes: env_parse("BRRTAPI_REGISTER_DOCS")
                .unwrap_or(defaults.register_docs_routes),
        }
    }

    /// Load configuration from a `.toml`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("invalid YAML config {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("invalid TOML config {}", path.display()))?
        };
        Ok(config)
    }

    #[must_use]
    pub fn slow_task_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_task_threshold_ms)
    }

    #[must_use]
    pub fn default_task_timeout(&self) -> Option<Duration> {
        self.default_task_timeout_ms.map(Duration::from_millis)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.slow_task_threshold(), Duration::from_millis(100));
        assert_eq!(config.default_task_timeout(), None);
        assert!(!config.expose_internal_errors);
        assert_eq!(config.docs_path, "/openapi.json");
    }

    #[test]
    fn loads_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "slow_task_threshold_ms = 250\nexpose_internal_errors = true").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.slow_task_threshold_ms, 250);
        assert!(config.expose_internal_errors);
        assert_eq!(config.docs_yaml_path, "/openapi.yaml");
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "default_task_timeout_ms: 500\ndocs_path: /api/docs.json").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_task_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.docs_path, "/api/docs.json");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(EngineConfig::from_file("/definitely/not/here.toml").is_err());
    }
}

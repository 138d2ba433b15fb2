//! Runtime configuration loaded from the environment.

use crate::constants::defaults;
use crate::error::{Error, Result};

/// Embedding provider selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    /// No provider configured; `embed()` returns a deterministic zero vector.
    Null,
    /// HTTP-backed provider (requires the `http-embeddings` feature).
    Http,
}

/// Embedding subsystem configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub dimension: usize,
}

impl EmbeddingConfig {
    fn from_env() -> Result<Self> {
        let provider = match std::env::var("EMBEDDING_PROVIDER").ok().as_deref() {
            None | Some("") | Some("null") => EmbeddingProviderKind::Null,
            Some("http") => EmbeddingProviderKind::Http,
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "unknown EMBEDDING_PROVIDER '{other}'"
                )))
            }
        };
        let dimension = std::env::var("EMBEDDING_DIMENSION")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| Error::Configuration(format!("EMBEDDING_DIMENSION: {e}")))?
            .unwrap_or(defaults::EMBEDDING_DIMENSION);

        Ok(Self {
            provider,
            endpoint: std::env::var("EMBEDDING_ENDPOINT").ok(),
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            model: std::env::var("EMBEDDING_MODEL").ok(),
            dimension,
        })
    }
}

/// Top-level application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub redb_path: String,
    pub environment: String,
    /// The project/tenant this server process serves. One MCP stdio server
    /// instance is scoped to one project, matching how an MCP client spawns
    /// one server per workspace/session.
    pub project_id: String,
    pub embedding: EmbeddingConfig,
    pub fidelity_threshold: f32,
    pub rrf_k: f64,
    pub working_memory_capacity: usize,
    pub watchdog_enabled: bool,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a required variable is absent or a
    /// numeric variable fails to parse. This is fatal: the caller should
    /// abort startup rather than enter the protocol loop.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("MEMORY_DATABASE_URL").map_err(|_| {
            Error::Configuration("MEMORY_DATABASE_URL must be set".to_string())
        })?;

        let project_id = std::env::var("MEMORY_PROJECT_ID")
            .map_err(|_| Error::Configuration("MEMORY_PROJECT_ID must be set".to_string()))?;

        let fidelity_threshold = std::env::var("MEMORY_FIDELITY_THRESHOLD")
            .ok()
            .map(|v| v.parse::<f32>())
            .transpose()
            .map_err(|e| Error::Configuration(format!("MEMORY_FIDELITY_THRESHOLD: {e}")))?
            .unwrap_or(defaults::DEFAULT_FIDELITY_THRESHOLD);

        let rrf_k = std::env::var("MEMORY_RRF_K")
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|e| Error::Configuration(format!("MEMORY_RRF_K: {e}")))?
            .unwrap_or(defaults::RRF_K);

        let working_memory_capacity = std::env::var("MEMORY_WORKING_MEMORY_CAPACITY")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| Error::Configuration(format!("MEMORY_WORKING_MEMORY_CAPACITY: {e}")))?
            .unwrap_or(defaults::WORKING_MEMORY_CAPACITY);

        let watchdog_enabled = std::env::var("MEMORY_WATCHDOG_ENABLED")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            database_auth_token: std::env::var("MEMORY_DATABASE_AUTH_TOKEN").ok(),
            redb_path: std::env::var("MEMORY_REDB_PATH")
                .unwrap_or_else(|_| format!("{}/cache.redb", defaults_data_dir())),
            environment: std::env::var("MEMORY_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            project_id,
            embedding: EmbeddingConfig::from_env()?,
            fidelity_threshold,
            rrf_k,
            working_memory_capacity,
            watchdog_enabled,
        })
    }
}

fn defaults_data_dir() -> &'static str {
    crate::constants::paths::DEFAULT_DATA_DIR
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_database_url_is_a_configuration_error() {
        std::env::remove_var("MEMORY_DATABASE_URL");
        std::env::set_var("MEMORY_PROJECT_ID", "proj-test");
        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.category(), "configuration");
        std::env::remove_var("MEMORY_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn missing_project_id_is_a_configuration_error() {
        std::env::set_var("MEMORY_DATABASE_URL", "libsql://example.turso.io");
        std::env::remove_var("MEMORY_PROJECT_ID");
        let err = AppConfig::from_env().unwrap_err();
        assert_eq!(err.category(), "configuration");
        std::env::remove_var("MEMORY_DATABASE_URL");
    }

    #[test]
    #[serial]
    fn defaults_are_applied_when_optional_vars_absent() {
        std::env::set_var("MEMORY_DATABASE_URL", "libsql://example.turso.io");
        std::env::set_var("MEMORY_PROJECT_ID", "proj-test");
        std::env::remove_var("MEMORY_RRF_K");
        std::env::remove_var("MEMORY_WORKING_MEMORY_CAPACITY");
        let cfg = AppConfig::from_env().expect("config should load with only the URL set");
        assert!((cfg.rrf_k - defaults::RRF_K).abs() < f64::EPSILON);
        assert_eq!(cfg.working_memory_capacity, defaults::WORKING_MEMORY_CAPACITY);
        std::env::remove_var("MEMORY_DATABASE_URL");
        std::env::remove_var("MEMORY_PROJECT_ID");
    }
}

//! Configuration management using Figment
//!
//! Page-size limits live in one [`QueryConfig`] value that is handed to the
//! parser, the query builder and the response builder, so each resource can
//! override them without touching shared state.
//!
//! Configuration is loaded from the following sources (highest precedence first):
//! 1. Environment variables (prefix: `ACTON_QUERY_`)
//! 2. The TOML file passed to [`QueryConfig::load_from`] (or `./query.toml`)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pagination limits and logging settings for the query engine
///
/// # Example
///
/// ```rust
/// use acton_query::QueryConfig;
///
/// let config = QueryConfig::default();
/// assert_eq!(config.default_page_size, 20);
/// assert_eq!(config.effective_page_size(500), 100);
/// assert_eq!(config.effective_page_size(0), 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryConfig {
    /// Page size used when the client does not ask for one
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Smallest page size a query may be built with
    #[serde(default = "default_min_page_size")]
    pub min_page_size: u32,

    /// Hard ceiling on the page size of any built query
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Log filter directive used by [`crate::observability::init_tracing`]
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl QueryConfig {
    /// Default number of items per page
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    /// Minimum number of items per page
    pub const MIN_PAGE_SIZE: u32 = 1;

    /// Maximum number of items per page
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Load configuration from `./query.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("query.toml")
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply. The result is normalized before it is returned.
    pub fn load_from(path: &str) -> Result<Self> {
        tracing::debug!("Loading query configuration from: {}", path);

        let config: QueryConfig = Figment::new()
            .merge(Serialized::defaults(QueryConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ACTON_QUERY_"))
            .extract()?;

        Ok(config.normalized())
    }

    /// Repair inconsistent limits
    ///
    /// The minimum is at least 1, the maximum is at least the minimum, and the
    /// default sits between the two.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.min_page_size = self.min_page_size.max(1);
        self.max_page_size = self.max_page_size.max(self.min_page_size);
        self.default_page_size = self
            .default_page_size
            .clamp(self.min_page_size, self.max_page_size);
        self
    }

    /// Whether a client-supplied page size is acceptable at parse time
    ///
    /// Out-of-range values are rejected wholesale rather than clamped.
    #[must_use]
    pub fn accepts_page_size(&self, requested: u32) -> bool {
        requested > 0 && requested <= self.max_page_size
    }

    /// Page size a query is actually built with
    ///
    /// Zero means "unset" and falls back to the default; anything else is
    /// clamped into `[min_page_size, max_page_size]`.
    #[must_use]
    pub fn effective_page_size(&self, requested: u32) -> u32 {
        let requested = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        let min = self.min_page_size.max(1);
        requested.clamp(min, self.max_page_size.max(min))
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            min_page_size: default_min_page_size(),
            max_page_size: default_max_page_size(),
            log_level: default_log_level(),
        }
    }
}

fn default_page_size() -> u32 {
    QueryConfig::DEFAULT_PAGE_SIZE
}

fn default_min_page_size() -> u32 {
    QueryConfig::MIN_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    QueryConfig::MAX_PAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.min_page_size, 1);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_effective_page_size_clamps() {
        let config = QueryConfig::default();
        assert_eq!(config.effective_page_size(0), 20);
        assert_eq!(config.effective_page_size(1), 1);
        assert_eq!(config.effective_page_size(50), 50);
        assert_eq!(config.effective_page_size(100), 100);
        assert_eq!(config.effective_page_size(101), 100);
        assert_eq!(config.effective_page_size(u32::MAX), 100);
    }

    #[test]
    fn test_accepts_page_size() {
        let config = QueryConfig::default();
        assert!(!config.accepts_page_size(0));
        assert!(config.accepts_page_size(1));
        assert!(config.accepts_page_size(100));
        assert!(!config.accepts_page_size(101));
    }

    #[test]
    fn test_normalized_repairs_limits() {
        let config = QueryConfig {
            default_page_size: 500,
            min_page_size: 0,
            max_page_size: 0,
            log_level: "debug".to_string(),
        }
        .normalized();
        assert_eq!(config.min_page_size, 1);
        assert_eq!(config.max_page_size, 1);
        assert_eq!(config.default_page_size, 1);
    }

    #[test]
    fn test_load_from_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "query.toml",
                r#"
                default_page_size = 25
                max_page_size = 50
                "#,
            )?;
            jail.set_env("ACTON_QUERY_LOG_LEVEL", "debug");

            let config = QueryConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.default_page_size, 25);
            assert_eq!(config.max_page_size, 50);
            assert_eq!(config.min_page_size, 1);
            assert_eq!(config.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = QueryConfig::load_from("absent.toml").map_err(|e| e.to_string())?;
            assert_eq!(config, QueryConfig::default());
            Ok(())
        });
    }
}

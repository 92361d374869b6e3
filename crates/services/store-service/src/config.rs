//! Store service configuration.

use std::env;

use common::{DatabaseConfig, ExpansionConfig, PaginationConfig, ServiceConfig};

/// Store service configuration.
#[derive(Debug, Clone)]
pub struct StoreServiceConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub expansion: ExpansionConfig,
    pub pagination: PaginationConfig,
}

impl StoreServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service: ServiceConfig {
                service_name: "store-service".to_string(),
                log_level: env::var("RUST_LOG").unwrap_or(defaults.service.log_level),
            },
            database: DatabaseConfig {
                url: env::var("STORE_DATABASE_URL")
                    .or_else(|_| env::var("DATABASE_URL"))
                    .unwrap_or(defaults.database.url),
                max_connections: parse_var("STORE_DB_MAX_CONNECTIONS")
                    .unwrap_or(defaults.database.max_connections),
                min_connections: defaults.database.min_connections,
            },
            expansion: ExpansionConfig {
                max_depth: parse_var("STORE_SPLIT_MAX_DEPTH").unwrap_or(defaults.expansion.max_depth),
                max_count: parse_var("STORE_SPLIT_MAX_COUNT").unwrap_or(defaults.expansion.max_count),
            },
            pagination: PaginationConfig {
                default_page_size: defaults.pagination.default_page_size,
                max_page_size: parse_var("STORE_MAX_PAGE_SIZE")
                    .unwrap_or(defaults.pagination.max_page_size),
            },
        }
    }
}

impl Default for StoreServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "store-service".to_string(),
                log_level: "info".to_string(),
            },
            database: DatabaseConfig::default(),
            expansion: ExpansionConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

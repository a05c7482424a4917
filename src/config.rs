//! Configuration management for the Folio server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub relations: RelationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Search executor limits
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Page size used when a request does not specify one
    pub default_page_size: i64,
    /// Hard upper bound on a single page, bounds work per call
    pub max_page_size: i64,
}

/// Relationship inference knobs
#[derive(Debug, Clone, Deserialize)]
pub struct RelationConfig {
    /// Minimum cosine similarity for a candidate to qualify at all
    pub similarity_threshold: f64,
    /// Top-K neighbors considered per embedding write
    pub max_neighbors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./folio.db".to_string(),
            },
            search: SearchConfig::default(),
            relations: RelationConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

impl Default for RelationConfig {
    fn default() -> Self {
        RelationConfig {
            similarity_threshold: 0.70,
            max_neighbors: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            search: SearchConfig {
                default_page_size: env::var("SEARCH_DEFAULT_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.search.default_page_size),
                max_page_size: env::var("SEARCH_MAX_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.search.max_page_size),
            },
            relations: RelationConfig {
                similarity_threshold: env::var("RELATED_SIMILARITY_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.relations.similarity_threshold),
                max_neighbors: env::var("RELATED_MAX_NEIGHBORS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.relations.max_neighbors),
            },
        }
    }
}

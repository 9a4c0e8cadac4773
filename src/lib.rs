//! Rufus: a topic-guided web crawler
//!
//! This crate crawls outward from a seed URL, keeps the text sections that
//! match a free-text topic prompt, suppresses duplicate pages by content
//! fingerprint, and writes the accumulated results after every accepted page.

pub mod client;
pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Rufus operations
#[derive(Debug, Error)]
pub enum RufusError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Persistence error: {0}")]
    Persist(#[from] output::PersistError),

    #[error("Keyword refinement error: {0}")]
    Refine(#[from] crawler::RefineError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TaskState,
        to: state::TaskState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Rufus operations
pub type Result<T> = std::result::Result<T, RufusError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use client::RufusClient;
pub use config::Config;
pub use content::{ContentRecord, Keywords};
pub use crawler::{run_crawl, Coordinator};
pub use output::{CrawlReport, ResultSet};
pub use state::TaskState;
pub use url::normalize_url;

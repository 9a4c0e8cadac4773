//! Configuration module for Rufus
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so an absent file yields a runnable configuration.
//!
//! # Example
//!
//! ```no_run
//! use rufus::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rufus.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BreakerConfig, Config, CrawlerConfig, OutputConfig, RefinementConfig, RendererConfig,
    TabularFormat, UserAgentConfig, DEFAULT_USER_AGENTS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

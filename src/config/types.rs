use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Browser user agents rotated across requests when none are configured
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
];

/// Main configuration structure for Rufus
///
/// Every section is optional in the TOML file; missing sections and keys
/// take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub breaker: BreakerConfig,
    pub renderer: RendererConfig,
    pub refinement: Option<RefinementConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth to crawl, counting the seed page as depth 1
    pub max_depth: u32,

    /// Maximum number of fetches in flight at once
    pub max_concurrent_fetches: u32,

    /// Whole-request timeout (milliseconds)
    pub per_request_timeout_ms: u64,

    /// Connection establishment timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Lower bound of the randomized pause before each fetch (milliseconds)
    pub politeness_delay_min_ms: u64,

    /// Upper bound of the randomized pause before each fetch (milliseconds)
    pub politeness_delay_max_ms: u64,

    /// Retries allowed after an HTTP 429 before the fetch gives up
    pub max_retries_on_rate_limit: u32,

    /// First backoff step after a 429 (milliseconds)
    pub backoff_base_ms: u64,

    /// Ceiling for a single backoff sleep (milliseconds)
    pub backoff_max_ms: u64,

    /// Re-fetch script-driven pages through the headless renderer
    pub use_renderer_fallback: bool,

    /// Stop after this many pages have been accepted
    pub max_pages: Option<u64>,

    /// Stop after this much wall-clock time (seconds)
    pub max_duration_secs: Option<u64>,

    /// HEAD-check candidate links before they enter the frontier
    pub validate_links: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_concurrent_fetches: 8,
            per_request_timeout_ms: 15_000,
            connect_timeout_ms: 5_000,
            politeness_delay_min_ms: 500,
            politeness_delay_max_ms: 1_500,
            max_retries_on_rate_limit: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            use_renderer_fallback: false,
            max_pages: None,
            max_duration_secs: None,
            validate_links: true,
        }
    }
}

impl CrawlerConfig {
    pub fn per_request_timeout(&self) -> Duration {
        Duration::from_millis(self.per_request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

/// Request identity configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// User agent strings; one is picked at random for every request
    pub pool: Vec<String>,

    /// Referer header value; the seed URL is used when unset
    pub referer: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            pool: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            referer: None,
        }
    }
}

/// Encoding used for the flattened (URL, Heading, Content) export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabularFormat {
    Csv,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path of the hierarchical URL -> heading -> sections JSON file
    pub json_path: PathBuf,

    /// Path of the flattened export
    pub tabular_path: PathBuf,

    /// Encoder for the flattened export
    pub tabular_format: TabularFormat,

    /// Attempts after the first failed snapshot write
    pub persist_retries: u32,

    /// First pause between snapshot write attempts (milliseconds)
    pub persist_backoff_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from("output.json"),
            tabular_path: PathBuf::from("output.csv"),
            tabular_format: TabularFormat::Csv,
            persist_retries: 3,
            persist_backoff_ms: 200,
        }
    }
}

/// Session-wide failure-rate circuit breaker
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BreakerConfig {
    /// Number of most recent fetch outcomes considered
    pub window: usize,

    /// Outcomes required before the breaker may trip
    pub min_samples: usize,

    /// Failure fraction (0, 1] at which the session aborts
    pub max_failure_rate: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            min_samples: 10,
            max_failure_rate: 0.8,
        }
    }
}

/// Headless renderer used as a fallback for script-driven pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RendererConfig {
    /// Chromium-compatible executable
    pub command: String,

    /// Script execution budget handed to the browser (milliseconds)
    pub virtual_time_budget_ms: u64,

    /// Hard limit on one render (seconds)
    pub timeout_secs: u64,

    /// Text-to-markup ratio below which a static page is re-rendered
    pub min_text_ratio: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: "chromium".to_string(),
            virtual_time_budget_ms: 5_000,
            timeout_secs: 30,
            min_text_ratio: 0.05,
        }
    }
}

/// LLM keyword refinement, enabled by the presence of this section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RefinementConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub instruction: String,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            instruction: "Provide keywords for further crawling.".to_string(),
        }
    }
}

//! Library facade for one-call scraping

use crate::config::Config;
use crate::crawler::{CrawlOutcome, Coordinator};
use crate::state::ResultSet;
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Entry point for embedding the crawler in another program
///
/// # Example
///
/// ```no_run
/// use rufus::{Config, RufusClient};
///
/// # async fn example() -> rufus::Result<()> {
/// let client = RufusClient::new(Config::default());
/// let results = client.scrape("https://example.com", "AI news").await?;
/// for (url, record) in results.iter() {
///     println!("{}: {} headings", url, record.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RufusClient {
    config: Config,
    cancel: Option<CancellationToken>,
}

impl RufusClient {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Lets the caller stop any crawl started by this client
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawls from `url` and returns the relevant content keyed by page URL
    pub async fn scrape(&self, url: &str, prompt: &str) -> Result<ResultSet> {
        Ok(self.scrape_with_report(url, prompt).await?.results)
    }

    /// Like [`RufusClient::scrape`], also returning the session report
    pub async fn scrape_with_report(&self, url: &str, prompt: &str) -> Result<CrawlOutcome> {
        let mut coordinator = Coordinator::new(self.config.clone(), url, prompt)?;
        if let Some(cancel) = &self.cancel {
            coordinator = coordinator.with_cancellation(cancel.clone());
        }
        Ok(coordinator.run_with_results().await)
    }
}

//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Dispatching frontier tasks to a bounded pool of workers
//! - Applying deduplication and recording accepted pages
//! - Persisting a snapshot after every accepted page
//! - Admitting validated child links with decreasing depth
//! - Stopping on page/time limits, cancellation, or a failure-rate trip
//!
//! Workers own nothing but clones of shared handles. Results come back
//! through the `JoinSet` and every mutation of the records and fingerprints
//! happens here, on the coordinator task. The visited set is the only
//! collection touched concurrently and it is mutex guarded.

use crate::config::Config;
use crate::content::{extract_content, ContentRecord, Document, Keywords};
use crate::crawler::breaker::FailureBreaker;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::refine::{KeywordRefiner, OpenAiRefiner};
use crate::crawler::renderer::{needs_rendering, render_page, CommandRenderer, Renderer};
use crate::crawler::scheduler::Scheduler;
use crate::crawler::scorer::{extract_links, ScoredLink};
use crate::output::{CrawlReport, Persister};
use crate::state::{CrawlState, CrawlTask, ResultSet, SkipReason, TaskState, VisitedSet};
use crate::{RufusError, UrlError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a session produced
#[derive(Debug)]
pub struct CrawlOutcome {
    pub report: CrawlReport,
    pub results: ResultSet,
}

/// Why a session stopped before its frontier drained
#[derive(Debug, Clone, PartialEq)]
enum StopReason {
    MaxPages(u64),
    MaxDuration(Duration),
    Cancelled,
    FailureRate { rate: f64, samples: usize },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxPages(n) => write!(f, "page limit of {} reached", n),
            Self::MaxDuration(d) => write!(f, "time limit of {:?} reached", d),
            Self::Cancelled => f.write_str("cancelled"),
            Self::FailureRate { rate, samples } => write!(
                f,
                "failure rate {:.0}% over the last {} fetches",
                rate * 100.0,
                samples
            ),
        }
    }
}

/// What a worker learned about one page
#[derive(Debug)]
struct PageContent {
    record: ContentRecord,
    children: Vec<Url>,
    rendered: bool,
}

/// Result returned by a worker for one task
#[derive(Debug)]
struct PageResult {
    task: CrawlTask,
    state: TaskState,
    outcome: Result<PageContent, FetchError>,
}

/// Everything a worker needs, owned so it can be spawned
struct PageJob {
    task: CrawlTask,
    fetcher: Fetcher,
    renderer: Option<Arc<dyn Renderer>>,
    keywords: watch::Receiver<Keywords>,
    visited: VisitedSet,
    min_text_ratio: f32,
    validate_links: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    seed: Url,
    keywords_tx: Arc<watch::Sender<Keywords>>,
    keywords_rx: watch::Receiver<Keywords>,
    fetcher: Fetcher,
    visited: VisitedSet,
    renderer: Option<Arc<dyn Renderer>>,
    refiner: Option<Arc<dyn KeywordRefiner>>,
    persister: Persister,
    cancel: CancellationToken,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `seed` - Absolute http(s) URL the crawl starts from
    /// * `prompt` - Free-text topic; its words drive relevance and link scoring
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(RufusError)` - Invalid configuration or seed, or the HTTP client failed to build
    pub fn new(config: Config, seed: &str, prompt: &str) -> Result<Self, RufusError> {
        crate::config::validate(&config)?;
        let seed = parse_seed(seed)?;

        let cancel = CancellationToken::new();
        let visited = VisitedSet::new();
        let fetcher = Fetcher::new(
            &config,
            Some(seed.to_string()),
            visited.clone(),
            cancel.clone(),
        )?;

        let renderer: Option<Arc<dyn Renderer>> = if config.crawler.use_renderer_fallback {
            Some(Arc::new(CommandRenderer::new(&config.renderer)))
        } else {
            None
        };

        let refiner: Option<Arc<dyn KeywordRefiner>> = match &config.refinement {
            Some(refinement) => Some(Arc::new(OpenAiRefiner::new(refinement)?)),
            None => None,
        };

        let (keywords_tx, keywords_rx) = watch::channel(Keywords::from_prompt(prompt));
        if keywords_rx.borrow().is_empty() {
            tracing::warn!("Prompt {:?} has no keywords; no content will be retained", prompt);
        }

        let persister = Persister::from_config(&config.output);

        Ok(Self {
            config: Arc::new(config),
            seed,
            keywords_tx: Arc::new(keywords_tx),
            keywords_rx,
            fetcher,
            visited,
            renderer,
            refiner,
            persister,
            cancel,
            config_hash: None,
        })
    }

    /// Replaces the headless renderer (enables the fallback when the config does not)
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replaces the keyword refiner
    pub fn with_refiner(mut self, refiner: Arc<dyn KeywordRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Ties the session to a caller-owned cancellation token
    ///
    /// Cancelling the token stops dispatch and unwinds in-flight work; the
    /// session stopping on its own never cancels the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.fetcher = self.fetcher.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Records the configuration file hash in the report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Runs the crawl and returns its report
    pub async fn run(self) -> CrawlReport {
        self.run_with_results().await.report
    }

    /// Runs the main crawl loop
    ///
    /// This is the core crawling logic that:
    /// 1. Tops up the worker pool from the frontier
    /// 2. Waits for a worker, a stop signal, or the time limit
    /// 3. Deduplicates, records, and persists accepted pages
    /// 4. Claims and enqueues validated child links
    pub async fn run_with_results(self) -> CrawlOutcome {
        let config = Arc::clone(&self.config);
        let max_concurrent = config.crawler.max_concurrent_fetches.max(1) as usize;
        let render = self.renderer.is_some();

        // Child token: stopping the session must not cancel the caller's token
        let session = self.cancel.child_token();
        let fetcher = self.fetcher.with_cancellation(session.clone());

        let mut report = CrawlReport::start(self.config_hash.clone());
        let mut state = CrawlState::with_visited(self.visited.clone());
        let mut scheduler = Scheduler::new();
        let mut breaker = FailureBreaker::new(&config.breaker);
        let mut workers: JoinSet<PageResult> = JoinSet::new();
        let mut refinements: JoinSet<()> = JoinSet::new();
        let mut stop: Option<StopReason> = None;

        tracing::info!(
            seed = %self.seed,
            max_depth = config.crawler.max_depth,
            keywords = ?self.keywords_rx.borrow().terms(),
            "Starting crawl"
        );

        if config.crawler.max_depth > 0 && state.visited.try_claim(&self.seed) {
            scheduler.push(CrawlTask::new(
                self.seed.clone(),
                config.crawler.max_depth,
                render,
            ));
        }

        let max_duration = config.crawler.max_duration();
        let deadline = tokio::time::sleep(max_duration.unwrap_or(Duration::ZERO));
        tokio::pin!(deadline);

        loop {
            while stop.is_none() && workers.len() < max_concurrent {
                let Some(task) = scheduler.pop() else {
                    break;
                };
                tracing::debug!(url = %task.url, depth = task.depth, "Dispatching");
                report.pages_dispatched += 1;
                workers.spawn(process_page(PageJob {
                    task,
                    fetcher: fetcher.clone(),
                    renderer: self.renderer.clone(),
                    keywords: self.keywords_rx.clone(),
                    visited: state.visited.clone(),
                    min_text_ratio: config.renderer.min_text_ratio,
                    validate_links: config.crawler.validate_links,
                }));
            }

            if workers.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = session.cancelled(), if stop.is_none() => {
                    halt(&mut stop, StopReason::Cancelled, &session, &mut scheduler);
                    continue;
                }
                _ = &mut deadline, if stop.is_none() && max_duration.is_some() => {
                    let limit = max_duration.unwrap_or_default();
                    halt(&mut stop, StopReason::MaxDuration(limit), &session, &mut scheduler);
                    continue;
                }
                joined = workers.join_next() => joined,
            };

            let result = match joined {
                Some(Ok(result)) => result,
                Some(Err(e)) => {
                    tracing::error!("Worker task failed: {}", e);
                    report.record_skip(SkipReason::Cancelled);
                    continue;
                }
                None => break,
            };

            let PageResult {
                task,
                state: task_state,
                outcome,
            } = result;

            let content = match outcome {
                Ok(content) => {
                    breaker.record(true);
                    content
                }
                Err(e) => {
                    if e.counts_as_failure() {
                        breaker.record(false);
                        tracing::warn!(url = %task.url, depth = task.depth, "Skipping page: {}", e);
                    } else {
                        tracing::debug!(url = %task.url, "Skipping page: {}", e);
                    }
                    report.record_skip(e.skip_reason());
                    advance(&task.url, task_state, TaskState::Done);

                    if stop.is_none() && breaker.is_tripped() {
                        let reason = StopReason::FailureRate {
                            rate: breaker.failure_rate(),
                            samples: breaker.samples(),
                        };
                        tracing::error!("Aborting crawl: {}", reason);
                        halt(&mut stop, reason, &session, &mut scheduler);
                    }
                    continue;
                }
            };

            report.pages_fetched += 1;
            if content.rendered {
                report.pages_rendered += 1;
            }

            let under_page_limit = config
                .crawler
                .max_pages
                .map_or(true, |max| report.pages_accepted < max);

            if content.record.is_empty() {
                tracing::debug!(url = %task.url, "No relevant content");
                report.record_skip(SkipReason::NoRelevantContent);
            } else if !under_page_limit {
                report.record_skip(SkipReason::Cancelled);
            } else if state.accept(&task.url, content.record.clone()) {
                report.pages_accepted += 1;
                tracing::info!(
                    url = %task.url,
                    depth = task.depth,
                    headings = content.record.len(),
                    "Accepted page ({} total)",
                    report.pages_accepted
                );

                if let Err(errors) = self.persister.persist(&state.results).await {
                    report.persist_failures += errors.len() as u64;
                }

                self.spawn_refinement(&mut refinements, content.record);

                if let Some(max) = config.crawler.max_pages {
                    if report.pages_accepted >= max && stop.is_none() {
                        halt(&mut stop, StopReason::MaxPages(max), &session, &mut scheduler);
                    }
                }
            } else {
                tracing::debug!(url = %task.url, "Duplicate content");
                report.record_skip(SkipReason::Duplicate);
            }

            if stop.is_none() && !content.children.is_empty() {
                let mut admitted = 0;
                for url in content.children {
                    if !state.visited.try_claim(&url) {
                        continue;
                    }
                    if let Some(child) = task.child(url) {
                        scheduler.push(child);
                        admitted += 1;
                    }
                }
                tracing::debug!(url = %task.url, admitted, "Expanded");
                let expanded = advance(&task.url, task_state, TaskState::Expanded);
                advance(&task.url, expanded, TaskState::Done);
            } else {
                advance(&task.url, task_state, TaskState::Done);
            }
        }

        refinements.abort_all();

        if let Err(errors) = self.persister.persist(&state.results).await {
            report.persist_failures += errors.len() as u64;
        }

        report.final_keywords = self.keywords_rx.borrow().terms().to_vec();
        report.aborted = stop.map(|reason| reason.to_string());
        report.finish();

        tracing::info!(
            dispatched = report.pages_dispatched,
            accepted = report.pages_accepted,
            skipped = report.pages_skipped,
            "Crawl finished"
        );

        CrawlOutcome {
            report,
            results: state.results,
        }
    }

    /// Sends an accepted record to the refiner, publishing any new keywords
    fn spawn_refinement(&self, refinements: &mut JoinSet<()>, record: ContentRecord) {
        let Some(refiner) = self.refiner.clone() else {
            return;
        };
        let instruction = self
            .config
            .refinement
            .as_ref()
            .map(|r| r.instruction.clone())
            .unwrap_or_default();
        let keywords_tx = Arc::clone(&self.keywords_tx);

        refinements.spawn(async move {
            match refiner.refine(&record, &instruction).await {
                Ok(terms) if !terms.is_empty() => {
                    let keywords = Keywords::from_list(terms);
                    tracing::info!(keywords = ?keywords.terms(), "Refined keywords");
                    keywords_tx.send_replace(keywords);
                }
                Ok(_) => tracing::debug!("Refinement returned no keywords"),
                Err(e) => tracing::warn!("Keyword refinement failed: {}", e),
            }
        });
    }
}

/// Fetches, extracts, and expands one page
async fn process_page(job: PageJob) -> PageResult {
    let state = advance(&job.task.url, TaskState::Pending, TaskState::Fetching);
    let outcome = fetch_and_extract(&job).await;

    let next = if outcome.is_ok() {
        TaskState::Extracted
    } else {
        TaskState::Skipped
    };

    PageResult {
        state: advance(&job.task.url, state, next),
        task: job.task,
        outcome,
    }
}

async fn fetch_and_extract(job: &PageJob) -> Result<PageContent, FetchError> {
    let PageJob {
        task,
        fetcher,
        renderer,
        keywords,
        visited,
        min_text_ratio,
        validate_links,
    } = job;

    fetcher.politeness_delay().await?;
    let page = fetcher.fetch(&task.url).await?;

    // Keywords are read once the body is in hand, so refinements published
    // while this task waited still apply
    let keywords = keywords.borrow().clone();

    let (mut record, mut links) = analyze(&page.body, &page.final_url, &keywords, visited);
    let mut rendered = false;

    if let Some(renderer) = renderer.clone().filter(|_| task.render) {
        if needs_rendering(&page.body, record.is_empty(), *min_text_ratio) {
            tracing::debug!(url = %task.url, "Rendering page");
            match render_page(renderer, page.final_url.clone(), fetcher.cancellation()).await {
                Ok(html) => {
                    (record, links) = analyze(&html, &page.final_url, &keywords, visited);
                    rendered = true;
                }
                Err(e) => {
                    tracing::warn!(url = %task.url, "Render failed, keeping static result: {}", e);
                }
            }
        }
    }

    let mut children = Vec::new();
    if task.depth > 1 {
        for link in links {
            if fetcher.cancellation().is_cancelled() {
                break;
            }
            if visited.contains(&link.url) {
                continue;
            }
            if *validate_links && !fetcher.validate(&link.url).await {
                tracing::debug!(url = %link.url, "Link failed validation");
                continue;
            }
            children.push(link.url);
        }
    }

    Ok(PageContent {
        record,
        children,
        rendered,
    })
}

/// Parses a page and pulls out its record and scored links
///
/// The parsed document lives only inside this call.
fn analyze(
    html: &str,
    base_url: &Url,
    keywords: &Keywords,
    visited: &VisitedSet,
) -> (ContentRecord, Vec<ScoredLink>) {
    let document = Document::parse(html);
    let record = extract_content(&document, keywords);
    let links = extract_links(&document, base_url, keywords, visited);
    (record, links)
}

/// Moves a task to its next state, logging illegal transitions
fn advance(url: &Url, state: TaskState, next: TaskState) -> TaskState {
    state.transition(next).unwrap_or_else(|e| {
        tracing::error!(url = %url, "{}", e);
        next
    })
}

fn halt(
    stop: &mut Option<StopReason>,
    reason: StopReason,
    session: &CancellationToken,
    scheduler: &mut Scheduler,
) {
    let dropped = scheduler.clear();
    tracing::info!(dropped, "Stopping crawl: {}", reason);
    *stop = Some(reason);
    session.cancel();
}

fn parse_seed(seed: &str) -> Result<Url, RufusError> {
    let url = Url::parse(seed.trim())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()).into());
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost.into());
    }
    Ok(url)
}

/// Runs one crawl session with the default collaborators
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `seed` - The seed URL
/// * `prompt` - The topic prompt
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - The session ran (possibly stopping early; see the report)
/// * `Err(RufusError)` - Setup failed before anything was fetched
///
/// # Example
///
/// ```no_run
/// use rufus::config::Config;
/// use rufus::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = run_crawl(Config::default(), "https://example.com", "AI news").await?;
/// println!("{} pages", outcome.results.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, seed: &str, prompt: &str) -> Result<CrawlOutcome, RufusError> {
    let coordinator = Coordinator::new(config, seed, prompt)?;
    Ok(coordinator.run_with_results().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.output.json_path = dir.join("out.json");
        config.output.tabular_path = dir.join("out.csv");
        config.crawler.politeness_delay_min_ms = 0;
        config.crawler.politeness_delay_max_ms = 0;
        config
    }

    #[test]
    fn test_parse_seed() {
        assert!(parse_seed("https://example.com").is_ok());
        assert!(matches!(
            parse_seed("ftp://example.com"),
            Err(RufusError::UrlError(UrlError::InvalidScheme(_)))
        ));
        assert!(matches!(
            parse_seed("not a url"),
            Err(RufusError::UrlParse(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.crawler.max_concurrent_fetches = 0;
        assert!(matches!(
            Coordinator::new(config, "https://example.com", "AI"),
            Err(RufusError::Config(_))
        ));
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::MaxPages(5).to_string(), "page limit of 5 reached");
        assert_eq!(
            StopReason::FailureRate {
                rate: 0.9,
                samples: 10
            }
            .to_string(),
            "failure rate 90% over the last 10 fetches"
        );
    }

    #[tokio::test]
    async fn test_zero_depth_fetches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.crawler.max_depth = 0;

        // Nothing listens here; a fetch attempt would be recorded as a skip
        let coordinator = Coordinator::new(config, "http://127.0.0.1:9/", "AI").unwrap();
        let report = coordinator.run().await;

        assert_eq!(report.pages_dispatched, 0);
        assert_eq!(report.pages_skipped, 0);
        assert!(report.aborted.is_none());
        assert!(dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_pre_cancelled_session_stops() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let coordinator = Coordinator::new(test_config(dir.path()), "http://127.0.0.1:9/", "AI")
            .unwrap()
            .with_cancellation(cancel);
        let report = coordinator.run().await;

        assert_eq!(report.pages_accepted, 0);
        assert_eq!(report.aborted.as_deref(), Some("cancelled"));
    }
}

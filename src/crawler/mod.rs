//! Crawler module for web page fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded rate-limit backoff and link validation
//! - Link extraction and keyword-density scoring
//! - Frontier scheduling
//! - Headless rendering fallback and keyword refinement
//! - Overall crawl coordination

mod breaker;
mod coordinator;
mod fetcher;
mod refine;
mod renderer;
mod scheduler;
mod scorer;

pub use breaker::FailureBreaker;
pub use coordinator::{run_crawl, CrawlOutcome, Coordinator};
pub use fetcher::{backoff_delay, build_http_client, FetchError, FetchedPage, Fetcher};
pub use refine::{parse_keywords, KeywordRefiner, OpenAiRefiner, RefineError, RefineFuture};
pub use renderer::{needs_rendering, render_page, CommandRenderer, RenderError, Renderer};
pub use scheduler::Scheduler;
pub use scorer::{extract_links, ScoredLink};

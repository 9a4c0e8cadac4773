//! Headless-browser fallback for script-driven pages
//!
//! A static fetch is re-done through a renderer only when it looks like a
//! client-side application shell or yielded nothing relevant. Rendering is
//! blocking work and runs on tokio's blocking pool.

use crate::config::RendererConfig;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Poll interval while waiting for the browser to exit
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Markup fragments left behind by client-side frameworks
const SPA_HINTS: &[&str] = &[
    "window.__NEXT_DATA__",
    "window.__NUXT__",
    "ng-app",
    "ng-controller",
    "<div id=\"root\"></div>",
    "<div id=\"app\"></div>",
    "data-reactroot",
];

/// Errors from the headless renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to start renderer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("renderer exited with {0}")]
    Exit(String),

    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("renderer produced no output")]
    EmptyOutput,

    #[error("render task failed: {0}")]
    Join(String),

    #[error("cancelled")]
    Cancelled,
}

/// Produces fully rendered HTML for a URL
///
/// Implementations block; callers run them through [`render_page`]. A
/// long-running implementation should watch `cancel` and give up once it
/// fires.
pub trait Renderer: Send + Sync {
    fn render(&self, url: &Url, cancel: &CancellationToken) -> Result<String, RenderError>;
}

/// Renders by shelling out to a headless Chromium-compatible browser
///
/// The browser runs with `--dump-dom` and a virtual time budget, which lets
/// page scripts (including "load more" handlers) run before the DOM is
/// serialized.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: String,
    virtual_time_budget_ms: u64,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            command: config.command.clone(),
            virtual_time_budget_ms: config.virtual_time_budget_ms,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn args(&self, url: &Url) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            format!("--virtual-time-budget={}", self.virtual_time_budget_ms),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, url: &Url, cancel: &CancellationToken) -> Result<String, RenderError> {
        let mut child = Command::new(&self.command)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // Drain stdout on its own thread so a large DOM cannot fill the pipe
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::Exit("stdout not captured".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut html = String::new();
            stdout.read_to_string(&mut html).map(|_| html)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::Cancelled);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(RenderError::Exit(status.to_string()));
        }

        let html = reader
            .join()
            .map_err(|_| RenderError::Join("stdout reader panicked".to_string()))??;
        if html.trim().is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(html)
    }
}

/// Runs a renderer on the blocking pool
///
/// Returns as soon as `cancel` fires. The blocking job sees the same token
/// and stops its browser process on its next poll.
pub async fn render_page(
    renderer: Arc<dyn Renderer>,
    url: Url,
    cancel: &CancellationToken,
) -> Result<String, RenderError> {
    let job_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || renderer.render(&url, &job_cancel));
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RenderError::Cancelled),
        joined = task => joined.map_err(|e| RenderError::Join(e.to_string()))?,
    }
}

/// Decides whether a statically fetched page should be rendered
///
/// # Arguments
///
/// * `body` - The static HTML
/// * `extracted_is_empty` - Whether static extraction kept nothing
/// * `min_text_ratio` - Text-to-markup ratio below which the page looks like a shell
pub fn needs_rendering(body: &str, extracted_is_empty: bool, min_text_ratio: f32) -> bool {
    if extracted_is_empty {
        return true;
    }

    if estimate_text_ratio(body) < min_text_ratio {
        return true;
    }

    SPA_HINTS.iter().any(|hint| body.contains(hint))
}

/// Ratio of non-whitespace text characters outside tags to total length
fn estimate_text_ratio(html: &str) -> f32 {
    let total_len = html.len();
    if total_len == 0 {
        return 0.0;
    }

    let mut in_tag = false;
    let mut text_chars = 0;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && !c.is_whitespace() => text_chars += 1,
            _ => {}
        }
    }

    text_chars as f32 / total_len as f32
}

//! Renderer abstraction for driving the dashboard in a browser.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The extraction
//! engine only ever talks to these traits, so tests can script a fake page.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// The body of one network response whose URL matched the interception marker.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub url: String,
    pub body: String,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Start forwarding the bodies of responses whose URL contains `url_marker`.
    ///
    /// Must be called before `navigate` so the initial load is observed.
    /// Responses arrive in completion order, not request order.
    async fn intercept_responses(
        &mut self,
        url_marker: &str,
    ) -> Result<mpsc::UnboundedReceiver<InterceptedResponse>>;
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Click the first element matching `xpath`.
    ///
    /// `Ok(false)` means nothing matched; errors are click failures on a
    /// matched element.
    async fn click_xpath(&mut self, xpath: &str, timeout_ms: u64) -> Result<bool>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// Lets the REST server come up and answer `/health`; every extraction
/// request fails at context creation.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

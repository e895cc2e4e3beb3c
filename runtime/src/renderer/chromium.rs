//! Chromium-based renderer using chromiumoxide.

use super::{InterceptedResponse, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. DASHTAP_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("DASHTAP_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.dashtap/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".dashtap/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".dashtap/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".dashtap/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".dashtap/chromium/chrome-linux64/chrome"),
                home.join(".dashtap/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance, headless unless `headless` is false.
    pub async fn launch(headless: bool) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set DASHTAP_CHROMIUM_PATH or install Chrome.")?;
        tracing::debug!(path = %chrome_path.display(), headless, "launching Chromium");

        let builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1440, 900)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        let builder = if headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            tap: None,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // The browser process exits once the connection handler stops.
        self.handler.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    tap: Option<JoinHandle<()>>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn intercept_responses(
        &mut self,
        url_marker: &str,
    ) -> Result<mpsc::UnboundedReceiver<InterceptedResponse>> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("failed to enable network domain")?;
        let received = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to responses")?
            .map(|e| (e.request_id.inner().clone(), e.response.url.clone()));
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("failed to subscribe to loading events")?
            .map(|e| e.request_id.inner().clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();
        let marker = url_marker.to_string();
        let fetch = move |id: String| {
            let page = page.clone();
            async move { fetch_body(&page, RequestId::new(id)).await }
        };

        if let Some(previous) = self.tap.take() {
            previous.abort();
        }
        self.tap = Some(tokio::spawn(pair_responses(
            received, finished, marker, fetch, tx,
        )));

        Ok(rx)
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn click_xpath(&mut self, xpath: &str, timeout_ms: u64) -> Result<bool> {
        let Ok(element) = self.page.find_xpath(xpath).await else {
            return Ok(false);
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), element.click()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => bail!("click failed: {e}"),
            Err(_) => bail!("click timed out after {timeout_ms}ms"),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(tap) = &self.tap {
            tap.abort();
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

/// Join "response received" and "loading finished" events into bodies.
///
/// Headers arrive before the body is complete, so matching requests wait in
/// `pending` until their loading finishes. The browser emits the two events
/// in that order; `received` is always drained first so a finish that is
/// already queued never overtakes its own response.
async fn pair_responses<R, L, F, Fut>(
    mut received: R,
    mut finished: L,
    marker: String,
    mut fetch: F,
    tx: mpsc::UnboundedSender<InterceptedResponse>,
) where
    R: Stream<Item = (String, String)> + Unpin,
    L: Stream<Item = String> + Unpin,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut pending: HashMap<String, String> = HashMap::new();
    loop {
        tokio::select! {
            biased;
            Some((id, url)) = received.next() => {
                if url.contains(&marker) {
                    pending.insert(id, url);
                }
            }
            Some(id) = finished.next() => {
                let Some(url) = pending.remove(&id) else {
                    continue;
                };
                match fetch(id).await {
                    Ok(body) => {
                        if tx.send(InterceptedResponse { url, body }).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!(url = %url, "could not read response body: {e:#}"),
                }
            }
            else => break,
        }
    }
}

async fn fetch_body(page: &Page, request_id: RequestId) -> Result<String> {
    let response = page
        .execute(GetResponseBodyParams::new(request_id))
        .await
        .context("Network.getResponseBody failed")?;
    let body = &response.result;
    if body.base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&body.body)
            .context("response body is not valid base64")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(body.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_click_by_xpath() {
        let renderer = ChromiumRenderer::launch(true)
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        let nav = ctx
            .navigate(
                "data:text/html,<div role='tab'>Terminado</div><div role='tab'>General</div>",
                10000,
            )
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10000);

        let hit = ctx
            .click_xpath("//*[text()[normalize-space(.)='Terminado']]", 2000)
            .await
            .expect("click failed");
        assert!(hit);

        let miss = ctx
            .click_xpath("//*[text()[normalize-space(.)='Retrabajo']]", 2000)
            .await
            .expect("lookup failed");
        assert!(!miss);

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }

    fn received(pairs: &[(&str, &str)]) -> impl Stream<Item = (String, String)> + Unpin {
        let items: Vec<(String, String)> = pairs
            .iter()
            .map(|(id, url)| (id.to_string(), url.to_string()))
            .collect();
        futures::stream::iter(items)
    }

    fn finished(ids: &[&str]) -> impl Stream<Item = String> + Unpin {
        let items: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        futures::stream::iter(items)
    }

    async fn collect(
        received: impl Stream<Item = (String, String)> + Unpin,
        finished: impl Stream<Item = String> + Unpin,
    ) -> Vec<InterceptedResponse> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        pair_responses(
            received,
            finished,
            "batchedDataV2".to_string(),
            |id: String| async move { Ok(format!("body-{id}")) },
            tx,
        )
        .await;
        let mut out = Vec::new();
        while let Ok(response) = rx.try_recv() {
            out.push(response);
        }
        out
    }

    #[tokio::test]
    async fn test_queued_finish_never_overtakes_its_response() {
        for _ in 0..200 {
            let out = collect(
                received(&[("req1", "https://x.test/batchedDataV2?a=1")]),
                finished(&["req1"]),
            )
            .await;
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].body, "body-req1");
        }
    }

    #[tokio::test]
    async fn test_burst_of_requests_all_delivered_in_finish_order() {
        let out = collect(
            received(&[
                ("a", "https://x.test/batchedDataV2?n=1"),
                ("b", "https://x.test/static/app.js"),
                ("c", "https://x.test/batchedDataV2?n=2"),
                ("d", "https://x.test/batchedDataV2?n=3"),
            ]),
            finished(&["d", "b", "a", "c", "zzz"]),
        )
        .await;
        let bodies: Vec<&str> = out.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["body-d", "body-a", "body-c"]);
        assert_eq!(out[0].url, "https://x.test/batchedDataV2?n=3");
    }

    #[tokio::test]
    async fn test_failed_body_fetch_is_skipped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        pair_responses(
            received(&[
                ("a", "https://x.test/batchedDataV2"),
                ("b", "https://x.test/batchedDataV2"),
            ]),
            finished(&["a", "b"]),
            "batchedDataV2".to_string(),
            |id: String| async move {
                if id == "a" {
                    bail!("No resource with given identifier found")
                }
                Ok(id)
            },
            tx,
        )
        .await;
        assert_eq!(rx.try_recv().unwrap().body, "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_find_chromium_honors_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, b"").unwrap();
        std::env::set_var("DASHTAP_CHROMIUM_PATH", &fake);
        let found = find_chromium();
        std::env::remove_var("DASHTAP_CHROMIUM_PATH");
        assert_eq!(found, Some(fake));
    }
}

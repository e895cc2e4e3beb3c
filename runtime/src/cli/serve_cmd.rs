//! `dashtap serve`: REST API over the extraction engine.

use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::rest::{self, AppState};
use anyhow::Result;
use dashtap::ExtractionConfig;
use std::sync::Arc;

pub async fn run(config: ExtractionConfig, port: u16) -> Result<()> {
    let renderer: Arc<dyn Renderer> = match ChromiumRenderer::launch(config.headless).await {
        Ok(r) => Arc::new(r),
        Err(e) => {
            tracing::warn!("browser unavailable, extraction requests will fail: {e:#}");
            Arc::new(NoopRenderer)
        }
    };

    let state = Arc::new(AppState::new(Arc::new(config), Arc::clone(&renderer)));
    let served = rest::start(port, state).await;
    renderer.shutdown().await?;
    served
}

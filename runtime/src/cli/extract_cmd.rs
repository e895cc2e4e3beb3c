//! `dashtap extract`: one run against the live dashboard.

use crate::cli::output;
use crate::engine::Extractor;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use dashtap::ExtractionConfig;
use std::path::Path;
use std::sync::Arc;

/// Launch Chromium, run the extraction and print the report.
pub async fn run(config: ExtractionConfig, out: Option<&Path>) -> Result<()> {
    let renderer: Arc<dyn Renderer> = Arc::new(
        ChromiumRenderer::launch(config.headless)
            .await
            .context("could not start the browser")?,
    );

    let extractor = Extractor::new(Arc::new(config), Arc::clone(&renderer));
    let result = extractor.run().await;
    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("browser shutdown failed: {e:#}");
    }
    let report = result?;

    if let Some(path) = out {
        output::write_json(path, &report)?;
        if !output::is_quiet() {
            eprintln!("  Report written to {}", path.display());
        }
    }

    if output::is_json() {
        output::print_json(&report);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

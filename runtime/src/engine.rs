//! Extraction engine: one run from page load to finished report.
//!
//! The run walks the sections with a [`Correlator`]: set the marker, bring
//! the section into view, wait for its metrics, advance. Only failing to get
//! a usable page at all aborts the run; every other problem degrades the
//! report instead.

use crate::capture::{await_section, drain, ResponseTap};
use crate::navigation::{NavigationOutcome, Navigator};
use crate::renderer::{RenderContext, Renderer};
use dashtap::{
    consolidate, CaptureLog, CaptureTimeout, Correlator, ExtractionConfig, ExtractionReport,
    HarvestError, MetricResolver, NavigationMiss, RunDiagnostics,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

pub struct Extractor {
    config: Arc<ExtractionConfig>,
    renderer: Arc<dyn Renderer>,
    navigator: Navigator,
}

impl Extractor {
    pub fn new(config: Arc<ExtractionConfig>, renderer: Arc<dyn Renderer>) -> Self {
        let navigator = Navigator::new(&config.timeouts);
        Self {
            config,
            renderer,
            navigator,
        }
    }

    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }

    /// Run one extraction. The browser context is closed on every path.
    pub async fn run(&self) -> Result<ExtractionReport, HarvestError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("extraction", %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<ExtractionReport, HarvestError> {
        self.config.validate()?;

        let mut ctx = self.renderer.new_context().await.map_err(fatal)?;
        let outcome = self.drive(ctx.as_mut()).await;
        if let Err(e) = ctx.close().await {
            tracing::warn!("failed to close browser context: {e:#}");
        }

        if let Ok(report) = &outcome {
            let c = &report.completeness;
            tracing::info!(
                payloads = c.payloads,
                decode_failures = c.decode_failures,
                gaps = c.gaps.len(),
                complete = c.is_complete(),
                "extraction finished"
            );
        }
        outcome
    }

    async fn drive(&self, ctx: &mut dyn RenderContext) -> Result<ExtractionReport, HarvestError> {
        let config = &*self.config;
        let metrics = config.metric_keys();
        let started = Instant::now();

        let responses = ctx
            .intercept_responses(&config.response_marker)
            .await
            .map_err(fatal)?;
        let (marker_tx, marker_rx) = watch::channel(None::<String>);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let tap = ResponseTap::spawn(
            responses,
            marker_rx,
            MetricResolver::new(config),
            config.guard_prefix.clone(),
            started,
            events_tx,
        );

        let mut correlator = Correlator::new(config.sections.clone());
        let mut log = CaptureLog::new();
        let mut diagnostics = RunDiagnostics::default();

        // The initial load already renders the landing section.
        let landing = correlator.advance().map(|(_, s)| s.name.clone());
        marker_tx.send_replace(landing);

        tracing::info!(url = %config.dashboard_url, "loading dashboard");
        let nav = ctx
            .navigate(&config.dashboard_url, config.timeouts.navigation_ms)
            .await
            .map_err(fatal)?;
        tracing::info!(final_url = %nav.final_url, load_ms = nav.load_time_ms, "dashboard loaded");
        tokio::time::sleep(config.timeouts.initial_settle()).await;

        while let Some((index, section)) = correlator.active().map(|(i, s)| (i, s.clone())) {
            marker_tx.send_replace(Some(section.name.clone()));
            tracing::info!(section = %section.name, index, "awaiting section");

            if let NavigationOutcome::Missed { labels_tried } =
                self.navigator.visit(ctx, index, &section).await
            {
                diagnostics.navigation_misses.push(NavigationMiss {
                    section: section.name.clone(),
                    labels_tried,
                });
            }

            let wait = await_section(
                &section.name,
                &metrics,
                &mut log,
                &mut events_rx,
                config.timeouts.section_deadline(),
                config.timeouts.poll_interval(),
            )
            .await;

            if wait.complete {
                tracing::debug!(section = %section.name, waited_ms = wait.waited.as_millis() as u64, "section complete");
            } else {
                tracing::warn!(
                    section = %section.name,
                    missing = wait.missing.len(),
                    "section deadline passed before every metric arrived"
                );
                diagnostics.capture_timeouts.push(CaptureTimeout {
                    section: section.name.clone(),
                    missing: wait.missing,
                    waited_ms: wait.waited.as_millis() as u64,
                });
            }

            correlator.advance();
        }

        // Stragglers after the last section have nowhere to go.
        marker_tx.send_replace(None);
        drain(&mut events_rx, &mut log);
        diagnostics.payloads = tap.stats().payloads();
        diagnostics.decode_failures = tap.stats().decode_failures();
        drop(tap);

        Ok(consolidate(config, &log, diagnostics))
    }
}

fn fatal(e: anyhow::Error) -> HarvestError {
    HarvestError::BrowserFatal(format!("{e:#}"))
}

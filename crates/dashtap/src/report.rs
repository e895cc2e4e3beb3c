//! The finished extraction: metrics table, aggregate row and completeness report.

use crate::types::{MetricKey, MetricRow, MetricsTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

/// No control matched any label variant for a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationMiss {
    pub section: String,
    pub labels_tried: Vec<String>,
}

/// A section's deadline passed before every metric arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureTimeout {
    pub section: String,
    pub missing: Vec<MetricKey>,
    pub waited_ms: u64,
}

/// Degradations observed while driving the browser, handed to the consolidator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunDiagnostics {
    pub navigation_misses: Vec<NavigationMiss>,
    pub capture_timeouts: Vec<CaptureTimeout>,
    pub decode_failures: usize,
    pub payloads: usize,
}

/// Why a cell was written as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GapReason {
    /// No payload ever carried the metric for this section.
    Missing,
    /// A value arrived but could not be normalized.
    Unparseable { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellGap {
    pub section: String,
    pub metric: MetricKey,
    #[serde(flatten)]
    pub reason: GapReason,
}

/// Where the aggregate row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateSource {
    /// The aggregate section reported its own values.
    Reported,
    /// The aggregate section was empty; its row is the sum of the others.
    Summed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub gaps: Vec<CellGap>,
    pub navigation_misses: Vec<NavigationMiss>,
    pub capture_timeouts: Vec<CaptureTimeout>,
    pub decode_failures: usize,
    pub payloads: usize,
    pub aggregate_source: AggregateSource,
}

impl CompletenessReport {
    /// True when every cell came from a real value and every section was reached.
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty() && self.navigation_misses.is_empty() && self.capture_timeouts.is_empty()
    }

    pub fn gaps_for(&self, section: &str) -> impl Iterator<Item = &CellGap> {
        let section = section.to_string();
        self.gaps.iter().filter(move |g| g.section == section)
    }
}

/// The handoff to the reporting collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub extracted_at: DateTime<Utc>,
    pub sections: MetricsTable,
    pub aggregate: MetricRow,
    pub completeness: CompletenessReport,
}

impl ExtractionReport {
    /// Render a fixed-width text table with a short diagnostics footer.
    pub fn render_text(&self) -> String {
        let metrics: Vec<&MetricKey> = self.aggregate.keys().collect();

        let mut widths: Vec<usize> = Vec::with_capacity(metrics.len() + 1);
        widths.push(
            self.sections
                .section_names()
                .map(|n| n.chars().count())
                .chain(std::iter::once("Section".len()))
                .max()
                .unwrap_or(0),
        );
        for metric in &metrics {
            let widest_value = self
                .sections
                .iter()
                .filter_map(|(_, row)| row.get(metric))
                .map(|v| v.to_string().len())
                .max()
                .unwrap_or(1);
            widths.push(metric.as_str().chars().count().max(widest_value));
        }

        let mut out = String::new();
        let _ = writeln!(out, "Extracted at {}", self.extracted_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);

        let mut header = pad_right("Section", widths[0]);
        for (metric, width) in metrics.iter().zip(&widths[1..]) {
            header.push_str("  ");
            header.push_str(&pad_left(metric.as_str(), *width));
        }
        let _ = writeln!(out, "{header}");
        let _ = writeln!(out, "{}", "-".repeat(header.chars().count()));

        for (name, row) in self.sections.iter() {
            let mut line = pad_right(name, widths[0]);
            for (metric, width) in metrics.iter().zip(&widths[1..]) {
                line.push_str("  ");
                line.push_str(&pad_left(&row.get(metric).unwrap_or(0).to_string(), *width));
            }
            let _ = writeln!(out, "{line}");
        }

        let c = &self.completeness;
        if c.aggregate_source == AggregateSource::Summed {
            let _ = writeln!(out, "\naggregate row computed as the sum of all other sections");
        }
        for miss in &c.navigation_misses {
            let _ = writeln!(out, "warning: could not open section {:?}", miss.section);
        }
        for timeout in &c.capture_timeouts {
            let missing: Vec<&str> = timeout.missing.iter().map(MetricKey::as_str).collect();
            let _ = writeln!(
                out,
                "warning: {:?} timed out after {}ms without {}",
                timeout.section,
                timeout.waited_ms,
                missing.join(", ")
            );
        }
        if !c.gaps.is_empty() {
            let _ = writeln!(out, "{} cell(s) written as 0 for lack of data", c.gaps.len());
        }
        out
    }
}

fn pad_right(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{text}{}", " ".repeat(width.saturating_sub(len)))
}

fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{text}", " ".repeat(width.saturating_sub(len)))
}

//! Turn the capture log into the final, fully-shaped metrics table.
//!
//! Every configured section gets a row and every row gets every configured
//! metric. Cells with no usable value are written as `0` and listed in the
//! completeness report. When the aggregate section (the first one) ends up
//! all zero, its row is replaced by the per-metric sum of the other sections.

use crate::capture::{CaptureLog, Cell};
use crate::config::ExtractionConfig;
use crate::normalize::normalize;
use crate::report::{AggregateSource, CellGap, CompletenessReport, ExtractionReport, GapReason, RunDiagnostics};
use crate::types::{MetricKey, MetricRow, MetricsTable};
use chrono::{DateTime, Utc};

/// Finalize a run, stamping it with the current time.
pub fn consolidate(
    config: &ExtractionConfig,
    log: &CaptureLog,
    diagnostics: RunDiagnostics,
) -> ExtractionReport {
    consolidate_at(config, log, diagnostics, Utc::now())
}

pub fn consolidate_at(
    config: &ExtractionConfig,
    log: &CaptureLog,
    diagnostics: RunDiagnostics,
    extracted_at: DateTime<Utc>,
) -> ExtractionReport {
    let metrics = config.metric_keys();
    let mut table = MetricsTable::zeroed(&config.sections, &metrics);
    let mut gaps = Vec::new();

    for section in &config.sections {
        let Some(row) = table.row_mut(&section.name) else {
            continue;
        };
        for metric in &metrics {
            match final_value(log, &section.name, metric) {
                Ok(value) => row.set(metric, value),
                Err(reason) => gaps.push(CellGap {
                    section: section.name.clone(),
                    metric: metric.clone(),
                    reason,
                }),
            }
        }
    }

    let aggregate_source = fill_aggregate(config, &mut table, &metrics);
    let aggregate = config
        .aggregate_section()
        .and_then(|s| table.row(&s.name))
        .cloned()
        .unwrap_or_else(|| MetricRow::zeroed(&metrics));

    if !gaps.is_empty() {
        tracing::info!(gaps = gaps.len(), "zero-filled cells without data");
    }

    ExtractionReport {
        extracted_at,
        sections: table,
        aggregate,
        completeness: CompletenessReport {
            gaps,
            navigation_misses: diagnostics.navigation_misses,
            capture_timeouts: diagnostics.capture_timeouts,
            decode_failures: diagnostics.decode_failures,
            payloads: diagnostics.payloads,
            aggregate_source,
        },
    }
}

/// Normalize the cell's winning raw value once more; anything unusable is a gap.
fn final_value(log: &CaptureLog, section: &str, metric: &MetricKey) -> Result<i64, GapReason> {
    match log.cell(section, metric) {
        Some(Cell::Normalized(v)) => Ok(v),
        Some(Cell::Unresolved(raw)) => normalize(&raw).map_err(|e| {
            tracing::warn!(section, metric = %metric, raw = %e.raw, "unparseable value, using 0");
            GapReason::Unparseable { raw: e.raw }
        }),
        None => Err(GapReason::Missing),
    }
}

fn fill_aggregate(
    config: &ExtractionConfig,
    table: &mut MetricsTable,
    metrics: &[MetricKey],
) -> AggregateSource {
    let Some((first, rest)) = config.sections.split_first() else {
        return AggregateSource::Reported;
    };
    let reported = table.row(&first.name).is_some_and(|r| !r.is_all_zero());
    if reported {
        return AggregateSource::Reported;
    }

    let mut sums = MetricRow::zeroed(metrics);
    for metric in metrics {
        let total = rest
            .iter()
            .filter_map(|s| table.get(&s.name, metric))
            .fold(0i64, i64::saturating_add);
        sums.set(metric, total);
    }
    tracing::info!(section = %first.name, "aggregate row empty, summing other sections");
    if let Some(row) = table.row_mut(&first.name) {
        *row = sums;
    }
    AggregateSource::Summed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureEvent;
    use crate::types::{MatchKind, RawValue, Section};

    fn config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    fn push(log: &mut CaptureLog, section: &str, metric: &str, value: RawValue) {
        let seq = log.len() as u64;
        log.push(CaptureEvent {
            section: section.into(),
            metric: MetricKey::new(metric),
            value,
            kind: MatchKind::Exact,
            seq,
            at_ms: 0,
        });
    }

    const BACHES: &str = "Baches reparados";
    const AREA: &str = "M² Totales";
    const LINEAL: &str = "Metros lineales aprox";

    #[test]
    fn test_table_shape_is_always_complete() {
        let config = config();
        let report = consolidate(&config, &CaptureLog::new(), RunDiagnostics::default());

        let names: Vec<&str> = report.sections.section_names().collect();
        let expected: Vec<&str> = config.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, expected);
        for (_, row) in report.sections.iter() {
            let keys: Vec<MetricKey> = row.keys().cloned().collect();
            assert_eq!(keys, config.metric_keys());
            assert!(row.is_all_zero());
        }
        assert_eq!(report.completeness.gaps.len(), 6 * 3);
        assert!(!report.completeness.is_complete());
    }

    #[test]
    fn test_single_section_payload_scenario() {
        let mut log = CaptureLog::new();
        push(&mut log, "Terminado", BACHES, RawValue::Int(10));
        push(&mut log, "Terminado", AREA, RawValue::Float(250.0));

        let report = consolidate(&config(), &log, RunDiagnostics::default());
        let t = report.sections.row("Terminado").unwrap();
        assert_eq!(t.get(&MetricKey::new(BACHES)), Some(10));
        assert_eq!(t.get(&MetricKey::new(AREA)), Some(250));
        assert_eq!(t.get(&MetricKey::new(LINEAL)), Some(0));

        for name in ["Revisión", "Retrabajo", "Detectados", "Monitoreo activo"] {
            assert!(report.sections.row(name).unwrap().is_all_zero(), "{name}");
        }
        assert_eq!(&report.aggregate, t);
        assert_eq!(report.sections.row("General"), Some(t));
        assert_eq!(report.completeness.aggregate_source, AggregateSource::Summed);
    }

    #[test]
    fn test_reported_aggregate_is_kept() {
        let mut log = CaptureLog::new();
        push(&mut log, "General", BACHES, RawValue::Text("13.943".into()));
        push(&mut log, "Terminado", BACHES, RawValue::Int(10));

        let report = consolidate(&config(), &log, RunDiagnostics::default());
        assert_eq!(report.aggregate.get(&MetricKey::new(BACHES)), Some(13943));
        assert_eq!(report.aggregate.get(&MetricKey::new(AREA)), Some(0));
        assert_eq!(report.completeness.aggregate_source, AggregateSource::Reported);
    }

    #[test]
    fn test_summed_aggregate_equals_column_sums() {
        let cases: &[&[(&str, i64, i64, i64)]] = &[
            &[("Terminado", 1, 2, 3)],
            &[("Terminado", 10, 250, 0), ("Revisión", 5, 0, 7)],
            &[
                ("Terminado", 1, 1, 1),
                ("Revisión", 2, 2, 2),
                ("Retrabajo", 3, 3, 3),
                ("Detectados", 4, 4, 4),
                ("Monitoreo activo", 5, 5, 5),
            ],
            &[("Detectados", 0, 0, 0)],
            &[("Retrabajo", -4, 9, 100)],
        ];

        for case in cases {
            let mut log = CaptureLog::new();
            for (section, a, b, c) in case.iter() {
                push(&mut log, section, BACHES, RawValue::Int(*a));
                push(&mut log, section, AREA, RawValue::Int(*b));
                push(&mut log, section, LINEAL, RawValue::Int(*c));
            }
            let report = consolidate(&config(), &log, RunDiagnostics::default());
            let sum = |pick: fn(&(&str, i64, i64, i64)) -> i64| case.iter().map(pick).sum::<i64>();
            assert_eq!(report.aggregate.get(&MetricKey::new(BACHES)), Some(sum(|r| r.1)));
            assert_eq!(report.aggregate.get(&MetricKey::new(AREA)), Some(sum(|r| r.2)));
            assert_eq!(report.aggregate.get(&MetricKey::new(LINEAL)), Some(sum(|r| r.3)));
        }
    }

    #[test]
    fn test_unparseable_cell_becomes_zero_with_gap() {
        let mut log = CaptureLog::new();
        push(&mut log, "Terminado", BACHES, RawValue::Text("sin datos".into()));

        let report = consolidate(&config(), &log, RunDiagnostics::default());
        assert_eq!(report.sections.get("Terminado", &MetricKey::new(BACHES)), Some(0));
        let gap = report
            .completeness
            .gaps_for("Terminado")
            .find(|g| g.metric == MetricKey::new(BACHES))
            .unwrap();
        assert_eq!(
            gap.reason,
            GapReason::Unparseable {
                raw: "sin datos".into()
            }
        );
    }

    #[test]
    fn test_events_for_unconfigured_sections_are_ignored() {
        let mut log = CaptureLog::new();
        push(&mut log, "Otra", BACHES, RawValue::Int(99));
        let report = consolidate(&config(), &log, RunDiagnostics::default());
        assert!(report.sections.row("Otra").is_none());
        assert_eq!(report.aggregate.get(&MetricKey::new(BACHES)), Some(0));
    }

    #[test]
    fn test_diagnostics_are_carried_through() {
        let mut config = config();
        config.sections = vec![Section::new("Only", &[])];
        let diagnostics = RunDiagnostics {
            decode_failures: 2,
            payloads: 5,
            ..RunDiagnostics::default()
        };
        let report = consolidate(&config, &CaptureLog::new(), diagnostics);
        assert_eq!(report.completeness.decode_failures, 2);
        assert_eq!(report.completeness.payloads, 5);
        assert_eq!(report.sections.len(), 1);
    }

    #[test]
    fn test_render_text_lists_every_section() {
        let mut log = CaptureLog::new();
        push(&mut log, "Terminado", BACHES, RawValue::Int(10));
        let report = consolidate(&config(), &log, RunDiagnostics::default());
        let text = report.render_text();
        for section in &config().sections {
            assert!(text.contains(&section.name), "{}", section.name);
        }
        assert!(text.contains("sum of all other sections"));
    }
}

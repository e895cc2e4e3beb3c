//! End-to-end tests of the pure pipeline: body → columns → metrics → events → report.

use dashtap::*;
use serde_json::{json, Value};

const BACHES: &str = "Baches reparados";
const AREA: &str = "M² Totales";
const LINEAL: &str = "Metros lineales aprox";

fn body(columns: &[(&str, Value)]) -> String {
    let info: Vec<Value> = columns.iter().map(|(n, _)| json!({ "name": n })).collect();
    let cols: Vec<Value> = columns.iter().map(|(_, c)| c.clone()).collect();
    let payload = json!({
        "dataResponse": [{
            "dataSubset": [{ "dataset": { "tableDataset": { "columnInfo": info, "column": cols } } }]
        }]
    });
    format!(")]}}'\n{payload}")
}

/// Decode, resolve and attribute one body under the given marker.
fn capture(
    log: &mut CaptureLog,
    resolver: &MetricResolver,
    config: &ExtractionConfig,
    marker: Option<&str>,
    raw: &str,
) {
    let columns = decode_payload(raw, &config.guard_prefix);
    let seq = log.len() as u64;
    log.extend(attribute(marker, resolver.resolve(&columns), seq, 0));
}

fn key(name: &str) -> MetricKey {
    MetricKey::new(name)
}

#[test]
fn test_single_section_yields_values_and_summed_aggregate() {
    let config = ExtractionConfig::default();
    let resolver = MetricResolver::new(&config);
    let mut log = CaptureLog::new();

    capture(
        &mut log,
        &resolver,
        &config,
        Some("Terminado"),
        &body(&[
            ("qt_tsfhazuupd", json!({"longColumn": {"values": ["10"]}})),
            ("qt_r6axt0uupd", json!({"doubleColumn": {"values": [250.0]}})),
        ]),
    );

    let report = consolidate(&config, &log, RunDiagnostics::default());

    let terminado = report.sections.row("Terminado").unwrap();
    assert_eq!(terminado.get(&key(BACHES)), Some(10));
    assert_eq!(terminado.get(&key(AREA)), Some(250));
    assert_eq!(terminado.get(&key(LINEAL)), Some(0));

    for section in config.sections.iter().skip(1) {
        if section.name != "Terminado" {
            assert!(report.sections.row(&section.name).unwrap().is_all_zero());
        }
    }
    assert_eq!(report.aggregate.get(&key(BACHES)), Some(10));
    assert_eq!(report.aggregate.get(&key(AREA)), Some(250));
    assert_eq!(report.aggregate.get(&key(LINEAL)), Some(0));
}

#[test]
fn test_locale_strings_flow_through_to_integers() {
    let config = ExtractionConfig::default();
    let resolver = MetricResolver::new(&config);
    let mut log = CaptureLog::new();

    capture(
        &mut log,
        &resolver,
        &config,
        Some("General"),
        &body(&[
            ("qt_tsfhazuupd", json!({"stringColumn": {"values": ["13.943"]}})),
            ("qt_r6axt0uupd", json!({"stringColumn": {"values": ["49,2 mil"]}})),
            ("qt_yct2j9xupd", json!({"stringColumn": {"values": ["(1.234)"]}})),
        ]),
    );

    assert!(log.is_complete("General", &config.metric_keys()));
    let report = consolidate(&config, &log, RunDiagnostics::default());
    assert_eq!(report.aggregate.get(&key(BACHES)), Some(13943));
    assert_eq!(report.aggregate.get(&key(AREA)), Some(49200));
    assert_eq!(report.aggregate.get(&key(LINEAL)), Some(1234));
    assert_eq!(report.completeness.aggregate_source, AggregateSource::Reported);
}

#[test]
fn test_exact_value_survives_later_heuristic_payload() {
    let config = ExtractionConfig::default();
    let resolver = MetricResolver::new(&config);
    let mut log = CaptureLog::new();

    capture(
        &mut log,
        &resolver,
        &config,
        Some("Revisión"),
        &body(&[("qt_tsfhazuupd", json!({"longColumn": {"values": [42]}}))]),
    );
    capture(
        &mut log,
        &resolver,
        &config,
        Some("Revisión"),
        &body(&[("Baches reparados (estimado)", json!({"longColumn": {"values": [7]}}))]),
    );

    let report = consolidate(&config, &log, RunDiagnostics::default());
    assert_eq!(report.sections.get("Revisión", &key(BACHES)), Some(42));
}

#[test]
fn test_garbage_bodies_do_not_disturb_other_payloads() {
    let config = ExtractionConfig::default();
    let resolver = MetricResolver::new(&config);
    let mut log = CaptureLog::new();

    capture(&mut log, &resolver, &config, Some("Retrabajo"), "<html>oops</html>");
    capture(
        &mut log,
        &resolver,
        &config,
        Some("Retrabajo"),
        &body(&[("qt_yct2j9xupd", json!({"longColumn": {"values": [12]}}))]),
    );
    capture(&mut log, &resolver, &config, Some("Retrabajo"), ")]}'");

    let report = consolidate(&config, &log, RunDiagnostics::default());
    assert_eq!(report.sections.get("Retrabajo", &key(LINEAL)), Some(12));
}

#[test]
fn test_payload_before_first_section_is_dropped() {
    let config = ExtractionConfig::default();
    let resolver = MetricResolver::new(&config);
    let mut log = CaptureLog::new();

    capture(
        &mut log,
        &resolver,
        &config,
        None,
        &body(&[("qt_tsfhazuupd", json!({"longColumn": {"values": [5]}}))]),
    );
    assert!(log.is_empty());
}

#[test]
fn test_report_serializes_handoff_shape() {
    let config = ExtractionConfig::default();
    let report = consolidate(&config, &CaptureLog::new(), RunDiagnostics::default());
    let json = serde_json::to_value(&report).unwrap();

    let sections = json["sections"].as_object().unwrap();
    assert_eq!(sections.len(), config.sections.len());
    for section in &config.sections {
        let row = sections[&section.name].as_object().unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row[BACHES], json!(0));
    }
    assert_eq!(json["aggregate"][AREA], json!(0));
    assert_eq!(json["completeness"]["aggregate_source"], json!("summed"));
    assert_eq!(json["completeness"]["gaps"][0]["reason"], json!("missing"));
}

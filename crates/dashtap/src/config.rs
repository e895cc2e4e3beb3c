//! Static extraction configuration.
//!
//! Sections, metric keys and the column-identifier table are deployment
//! configuration, never discovered at runtime. [`ExtractionConfig::default`]
//! is the shipped deployment; a JSON file can replace any part of it.

use crate::decode::GUARD_PREFIX;
use crate::error::ConfigError;
use crate::types::{MetricKey, Section};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DASHBOARD_URL: &str =
    "https://lookerstudio.google.com/u/0/reporting/ea3fb237-17c6-49c6-956b-77b33774ce9a/page/X9kcE";

/// A metric together with the keywords that identify it in free-text column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub key: MetricKey,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl MetricSpec {
    pub fn new(key: &str, keywords: &[&str]) -> Self {
        Self {
            key: MetricKey::new(key),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Per-operation time limits, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Initial page load.
    pub navigation_ms: u64,
    /// A single click on a section control.
    pub click_ms: u64,
    /// Wait after the initial load before the first section is polled.
    pub initial_settle_ms: u64,
    /// Wait after each navigation attempt.
    pub settle_ms: u64,
    /// Upper bound on polling for one section's metrics.
    pub section_deadline_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 120_000,
            click_ms: 6_000,
            initial_settle_ms: 2_500,
            settle_ms: 500,
            section_deadline_ms: 12_000,
            poll_interval_ms: 500,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn click(&self) -> Duration {
        Duration::from_millis(self.click_ms)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn section_deadline(&self) -> Duration {
        Duration::from_millis(self.section_deadline_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything one extraction run needs to know about the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub dashboard_url: String,
    /// Substring identifying data responses among all network traffic.
    pub response_marker: String,
    pub guard_prefix: String,
    /// Visited in order; the first one is the landing view and the aggregate.
    pub sections: Vec<Section>,
    pub metrics: Vec<MetricSpec>,
    /// Exact column identifier → metric. Authoritative over keyword matches.
    pub columns: Vec<(String, MetricKey)>,
    /// Identifier prefix the source uses for metric columns.
    pub fallback_prefix: String,
    pub headless: bool,
    pub timeouts: Timeouts,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            response_marker: "batchedDataV2".to_string(),
            guard_prefix: GUARD_PREFIX.to_string(),
            sections: vec![
                Section::new("General", &["General"]),
                Section::new("Terminado", &["Terminado", "TERMINADO"]),
                Section::new("Revisión", &["Revisión", "Revision", "REVISIÓN"]),
                Section::new("Retrabajo", &["Retrabajo", "Re-Trabajo", "RETRABAJO"]),
                Section::new("Detectados", &["Detectados", "Detectado", "DETECTADOS"]),
                Section::new(
                    "Monitoreo activo",
                    &[
                        "Monitoreo activo",
                        "Terminado con monitoreo activo",
                        "Monitoreo",
                    ],
                ),
            ],
            metrics: vec![
                MetricSpec::new(
                    "Baches reparados",
                    &["bache", "reparad", "count", "qty", "cantidad"],
                ),
                MetricSpec::new(
                    "M² Totales",
                    &["m2", "m²", "metro cuadrado", "metros cuadrados", "area", "superficie", "sqm"],
                ),
                MetricSpec::new(
                    "Metros lineales aprox",
                    &["lineal", "metro lineal", "metros lineales", "ml"],
                ),
            ],
            columns: vec![
                ("qt_tsfhazuupd".to_string(), MetricKey::new("Baches reparados")),
                ("qt_r6axt0uupd".to_string(), MetricKey::new("M² Totales")),
                ("qt_yct2j9xupd".to_string(), MetricKey::new("Metros lineales aprox")),
            ],
            fallback_prefix: "qt_".to_string(),
            headless: true,
            timeouts: Timeouts::default(),
        }
    }
}

impl ExtractionConfig {
    /// Load a JSON config file. Absent fields keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::NoSections);
        }
        let mut seen = HashSet::new();
        for section in &self.sections {
            if !seen.insert(section.name.as_str()) {
                return Err(ConfigError::DuplicateSection(section.name.clone()));
            }
        }

        if self.metrics.is_empty() {
            return Err(ConfigError::NoMetrics);
        }
        let mut keys = HashSet::new();
        for metric in &self.metrics {
            if !keys.insert(&metric.key) {
                return Err(ConfigError::DuplicateMetric(metric.key.to_string()));
            }
        }

        for (column, metric) in &self.columns {
            if !keys.contains(metric) {
                return Err(ConfigError::UnknownMetric {
                    column: column.clone(),
                    metric: metric.to_string(),
                });
            }
        }

        if self.timeouts.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn metric_keys(&self) -> Vec<MetricKey> {
        self.metrics.iter().map(|m| m.key.clone()).collect()
    }

    /// The section whose row doubles as the aggregate.
    pub fn aggregate_section(&self) -> Option<&Section> {
        self.sections.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sections.len(), 6);
        assert_eq!(config.metrics.len(), 3);
        assert_eq!(config.aggregate_section().unwrap().name, "General");
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let mut config = ExtractionConfig::default();
        config.sections.push(Section::new("Terminado", &[]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateSection(name)) if name == "Terminado"
        ));
    }

    #[test]
    fn test_unknown_metric_in_column_table_rejected() {
        let mut config = ExtractionConfig::default();
        config
            .columns
            .push(("qt_zzz".to_string(), MetricKey::new("Nope")));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn test_empty_lists_and_zero_poll_rejected() {
        let mut config = ExtractionConfig::default();
        config.sections.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoSections)));

        let mut config = ExtractionConfig::default();
        config.metrics.clear();
        config.columns.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoMetrics)));

        let mut config = ExtractionConfig::default();
        config.timeouts.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPollInterval)));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dashboard_url": "https://example.test/dash", "timeouts": {{"section_deadline_ms": 50}}}}"#
        )
        .unwrap();

        let config = ExtractionConfig::from_path(file.path()).unwrap();
        assert_eq!(config.dashboard_url, "https://example.test/dash");
        assert_eq!(config.timeouts.section_deadline_ms, 50);
        assert_eq!(config.timeouts.click_ms, 6_000);
        assert_eq!(config.sections.len(), 6);
    }

    #[test]
    fn test_unreadable_and_malformed_files() {
        let missing = ExtractionConfig::from_path(Path::new("/nonexistent/dashtap.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ExtractionConfig::from_path(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}

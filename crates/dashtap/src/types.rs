//! Core data types for sections, metrics, raw columns and the metrics table.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Canonical identifier for a KPI, independent of the source's column naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricKey(String);

impl MetricKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetricKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One navigable view of the dashboard.
///
/// Identity is the ordinal position in the configured sequence; `name` is the
/// display name used as the table key, `labels` are the on-page text variants
/// tried when targeting the control that opens it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Section {
    pub fn new(name: &str, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Label variants in priority order. Falls back to the display name.
    pub fn label_variants(&self) -> Vec<&str> {
        if self.labels.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.labels.iter().map(String::as_str).collect()
        }
    }
}

/// An untyped scalar pulled out of a payload, prior to normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// Convert a JSON scalar. Arrays, objects, booleans and null yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(RawValue::Int(i))
                } else {
                    n.as_f64().map(RawValue::Float)
                }
            }
            serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(i) => write!(f, "{i}"),
            RawValue::Float(x) => write!(f, "{x}"),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

/// A (column identifier, value) pair from one decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub id: String,
    pub value: RawValue,
}

/// Flat column-identifier → value mapping produced by the decoder.
///
/// Keeps first-seen order; re-inserting an identifier replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    columns: Vec<RawColumn>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: RawValue) {
        let id = id.into();
        match self.columns.iter_mut().find(|c| c.id == id) {
            Some(existing) => existing.value = value,
            None => self.columns.push(RawColumn { id, value }),
        }
    }

    pub fn get(&self, id: &str) -> Option<&RawValue> {
        self.columns.iter().find(|c| c.id == id).map(|c| &c.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawColumn> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RawValue)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (K, RawValue)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (id, value) in iter {
            map.insert(id, value);
        }
        map
    }
}

/// How a column was tied to a metric. Ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Unrecognized identifier carrying the structural prefix.
    Prefix,
    /// Column name tokens matched a metric's keyword set.
    Keyword,
    /// Identifier listed in the exact-match table.
    Exact,
}

/// One row of final integer values, in configured metric order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricRow {
    values: Vec<(MetricKey, i64)>,
}

impl MetricRow {
    /// A row with every metric set to zero.
    pub fn zeroed<'a>(metrics: impl IntoIterator<Item = &'a MetricKey>) -> Self {
        Self {
            values: metrics.into_iter().map(|m| (m.clone(), 0)).collect(),
        }
    }

    pub fn get(&self, metric: &MetricKey) -> Option<i64> {
        self.values
            .iter()
            .find(|(k, _)| k == metric)
            .map(|(_, v)| *v)
    }

    /// Set a metric's value. Unknown metrics are ignored so the row shape never changes.
    pub fn set(&mut self, metric: &MetricKey, value: i64) {
        if let Some(slot) = self.values.iter_mut().find(|(k, _)| k == metric) {
            slot.1 = value;
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|(_, v)| *v == 0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &MetricKey> {
        self.values.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, i64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for MetricRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.values.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// Section display name → metric row, in configured section order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricsTable {
    rows: Vec<(String, MetricRow)>,
}

impl MetricsTable {
    /// A table with one all-zero row per section.
    pub fn zeroed(sections: &[Section], metrics: &[MetricKey]) -> Self {
        Self {
            rows: sections
                .iter()
                .map(|s| (s.name.clone(), MetricRow::zeroed(metrics)))
                .collect(),
        }
    }

    pub fn row(&self, section: &str) -> Option<&MetricRow> {
        self.rows.iter().find(|(n, _)| n == section).map(|(_, r)| r)
    }

    pub fn row_mut(&mut self, section: &str) -> Option<&mut MetricRow> {
        self.rows
            .iter_mut()
            .find(|(n, _)| n == section)
            .map(|(_, r)| r)
    }

    pub fn get(&self, section: &str, metric: &MetricKey) -> Option<i64> {
        self.row(section).and_then(|r| r.get(metric))
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricRow)> {
        self.rows.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for MetricsTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.rows.iter().map(|(n, r)| (n.as_str(), r)))
    }
}

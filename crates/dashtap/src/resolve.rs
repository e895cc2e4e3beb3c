//! Map decoded columns onto canonical metric keys.
//!
//! Three tiers, strongest first: the exact identifier table, keyword matching
//! on tokenized column names, and finally the structural identifier prefix,
//! which hands the first leftover prefixed column to the first metric still
//! without a candidate. Within one payload the first candidate per metric wins.

use crate::config::ExtractionConfig;
use crate::types::{ColumnMap, MatchKind, MetricKey, RawValue};
use std::collections::HashSet;

/// A metric value found in one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetric {
    pub metric: MetricKey,
    pub column: String,
    pub value: RawValue,
    pub kind: MatchKind,
}

#[derive(Debug, Clone)]
struct KeywordSet {
    metric: MetricKey,
    /// Each keyword as a token sequence.
    phrases: Vec<Vec<String>>,
}

/// Resolves column maps against a fixed metric configuration.
#[derive(Debug, Clone)]
pub struct MetricResolver {
    keyword_sets: Vec<KeywordSet>,
    exact: Vec<(String, MetricKey)>,
    fallback_prefix: String,
}

impl MetricResolver {
    pub fn new(config: &ExtractionConfig) -> Self {
        let keyword_sets = config
            .metrics
            .iter()
            .map(|spec| KeywordSet {
                metric: spec.key.clone(),
                phrases: spec
                    .keywords
                    .iter()
                    .map(|k| tokenize(k))
                    .filter(|p| !p.is_empty())
                    .collect(),
            })
            .collect();

        Self {
            keyword_sets,
            exact: config.columns.clone(),
            fallback_prefix: config.fallback_prefix.clone(),
        }
    }

    fn exact_metric(&self, column: &str) -> Option<&MetricKey> {
        self.exact
            .iter()
            .find(|(id, _)| id == column)
            .map(|(_, metric)| metric)
    }

    fn slot(&self, metric: &MetricKey) -> Option<usize> {
        self.keyword_sets.iter().position(|k| &k.metric == metric)
    }

    /// Resolve one payload's columns. Output follows configured metric order.
    pub fn resolve(&self, columns: &ColumnMap) -> Vec<ResolvedMetric> {
        let mut found: Vec<Option<ResolvedMetric>> = vec![None; self.keyword_sets.len()];
        let mut claimed: HashSet<&str> = HashSet::new();

        for col in columns.iter() {
            let Some(metric) = self.exact_metric(&col.id) else {
                continue;
            };
            claimed.insert(col.id.as_str());
            if let Some(idx) = self.slot(metric) {
                if found[idx].is_none() {
                    found[idx] = Some(ResolvedMetric {
                        metric: metric.clone(),
                        column: col.id.clone(),
                        value: col.value.clone(),
                        kind: MatchKind::Exact,
                    });
                }
            }
        }

        for (idx, set) in self.keyword_sets.iter().enumerate() {
            if found[idx].is_some() {
                continue;
            }
            let hit = columns
                .iter()
                .filter(|c| !claimed.contains(c.id.as_str()))
                .find(|c| matches_any(&tokenize(&c.id), &set.phrases));
            if let Some(col) = hit {
                claimed.insert(col.id.as_str());
                found[idx] = Some(ResolvedMetric {
                    metric: set.metric.clone(),
                    column: col.id.clone(),
                    value: col.value.clone(),
                    kind: MatchKind::Keyword,
                });
            }
        }

        if !self.fallback_prefix.is_empty() {
            let leftover = columns
                .iter()
                .filter(|c| !claimed.contains(c.id.as_str()))
                .find(|c| c.id.starts_with(&self.fallback_prefix));
            let unmatched = found.iter().position(Option::is_none);
            if let (Some(col), Some(idx)) = (leftover, unmatched) {
                found[idx] = Some(ResolvedMetric {
                    metric: self.keyword_sets[idx].metric.clone(),
                    column: col.id.clone(),
                    value: col.value.clone(),
                    kind: MatchKind::Prefix,
                });
            }
        }

        found.into_iter().flatten().collect()
    }
}

/// Lower-case, fold common accents, split on anything that is not alphanumeric.
fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text.to_lowercase().chars().map(fold_accent).collect();
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

/// A phrase matches when its tokens are prefixes of consecutive name tokens,
/// so the stem "reparad" matches "reparados".
fn matches_any(name: &[String], phrases: &[Vec<String>]) -> bool {
    phrases.iter().any(|phrase| {
        phrase.len() <= name.len()
            && name.windows(phrase.len()).any(|window| {
                window
                    .iter()
                    .zip(phrase.iter())
                    .all(|(token, stem)| token.starts_with(stem.as_str()))
            })
    })
}

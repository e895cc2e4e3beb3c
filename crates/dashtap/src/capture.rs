//! Capture correlation: attributing payload values to sections.
//!
//! Every resolved metric becomes a [`CaptureEvent`] tagged with the section
//! the active-section marker held when its payload finished decoding. Events
//! are appended to a [`CaptureLog`]; every question about the table ("what is
//! this cell", "is this section complete") is a fold over that log. A cell
//! filled only by a prefix guess counts toward the table but not toward
//! completeness.
//!
//! Attribution is by marker value at decode time, not by dispatch time. A
//! payload that is still decoding when the marker advances lands in the next
//! section. The settle delay and completeness wait keep this rare.

use crate::normalize::normalize;
use crate::resolve::ResolvedMetric;
use crate::types::{MatchKind, MetricKey, RawValue, Section};
use serde::Serialize;

/// One metric value attributed to one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureEvent {
    pub section: String,
    pub metric: MetricKey,
    pub value: RawValue,
    pub kind: MatchKind,
    /// Payload sequence number; events from one payload share it.
    pub seq: u64,
    /// Milliseconds since the run started.
    pub at_ms: u64,
}

/// Tag resolved metrics with the marker's current value.
///
/// With no active section (before the run starts) the payload is dropped.
pub fn attribute(
    marker: Option<&str>,
    resolved: Vec<ResolvedMetric>,
    seq: u64,
    at_ms: u64,
) -> Vec<CaptureEvent> {
    let Some(section) = marker else {
        return Vec::new();
    };
    resolved
        .into_iter()
        .map(|r| CaptureEvent {
            section: section.to_string(),
            metric: r.metric,
            value: r.value,
            kind: r.kind,
            seq,
            at_ms,
        })
        .collect()
}

/// Current content of one (section, metric) cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Normalized(i64),
    /// Present, but the value would not normalize.
    Unresolved(RawValue),
}

/// Append-only log of capture events for one run.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    events: Vec<CaptureEvent>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CaptureEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = CaptureEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[CaptureEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event currently occupying a cell.
    ///
    /// Later events replace earlier ones unless they matched more weakly, so a
    /// repeated payload updates a value but a keyword guess never displaces an
    /// exact identifier.
    pub fn winning_event(&self, section: &str, metric: &MetricKey) -> Option<&CaptureEvent> {
        self.events
            .iter()
            .filter(|e| e.section == section && &e.metric == metric)
            .fold(None, |best: Option<&CaptureEvent>, e| match best {
                Some(b) if e.kind < b.kind => Some(b),
                _ => Some(e),
            })
    }

    pub fn cell(&self, section: &str, metric: &MetricKey) -> Option<Cell> {
        self.winning_event(section, metric)
            .map(|e| match normalize(&e.value) {
                Ok(v) => Cell::Normalized(v),
                Err(_) => Cell::Unresolved(e.value.clone()),
            })
    }

    pub fn normalized(&self, section: &str, metric: &MetricKey) -> Option<i64> {
        match self.cell(section, metric) {
            Some(Cell::Normalized(v)) => Some(v),
            _ => None,
        }
    }

    /// A normalized value matched by identifier or keyword.
    ///
    /// Prefix guesses still fill the table but never confirm a cell.
    pub fn confirmed(&self, section: &str, metric: &MetricKey) -> Option<i64> {
        self.winning_event(section, metric)
            .filter(|e| e.kind != MatchKind::Prefix)
            .and_then(|e| normalize(&e.value).ok())
    }

    /// Metrics without a confirmed value for `section`, in the given order.
    pub fn missing(&self, section: &str, metrics: &[MetricKey]) -> Vec<MetricKey> {
        metrics
            .iter()
            .filter(|m| self.confirmed(section, m).is_none())
            .cloned()
            .collect()
    }

    pub fn is_complete(&self, section: &str, metrics: &[MetricKey]) -> bool {
        metrics
            .iter()
            .all(|m| self.confirmed(section, m).is_some())
    }
}

/// Where the correlator is in the section sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorState {
    Idle,
    AwaitingSection(usize),
    Done,
}

/// Walks the configured sections strictly in order, each exactly once.
#[derive(Debug, Clone)]
pub struct Correlator {
    sections: Vec<Section>,
    state: CorrelatorState,
}

impl Correlator {
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            sections,
            state: CorrelatorState::Idle,
        }
    }

    pub fn state(&self) -> CorrelatorState {
        self.state
    }

    /// The section currently awaited, if any.
    pub fn active(&self) -> Option<(usize, &Section)> {
        match self.state {
            CorrelatorState::AwaitingSection(i) => self.sections.get(i).map(|s| (i, s)),
            _ => None,
        }
    }

    /// Move to the next section, or to `Done` after the last one.
    pub fn advance(&mut self) -> Option<(usize, &Section)> {
        let next = match self.state {
            CorrelatorState::Idle => 0,
            CorrelatorState::AwaitingSection(i) => i + 1,
            CorrelatorState::Done => return None,
        };
        if next < self.sections.len() {
            self.state = CorrelatorState::AwaitingSection(next);
            self.sections.get(next).map(|s| (next, s))
        } else {
            self.state = CorrelatorState::Done;
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == CorrelatorState::Done
    }
}

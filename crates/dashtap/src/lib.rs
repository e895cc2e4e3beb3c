//! Dashtap: core extraction engine for KPI values hidden in dashboard network traffic.
//!
//! The pipeline, leaves first: [`decode`] turns a response body into columns,
//! [`resolve`] names them, [`capture`] attributes them to sections,
//! [`consolidate`] produces the final [`report`].

pub mod capture;
pub mod config;
pub mod consolidate;
pub mod decode;
pub mod error;
pub mod normalize;
pub mod report;
pub mod resolve;
pub mod types;

pub use capture::{attribute, CaptureEvent, CaptureLog, Cell, Correlator, CorrelatorState};
pub use config::{ExtractionConfig, MetricSpec, Timeouts};
pub use consolidate::{consolidate, consolidate_at};
pub use decode::{decode_payload, strip_guard, try_decode, GUARD_PREFIX};
pub use error::{ConfigError, DecodeError, HarvestError, NormalizationError};
pub use normalize::{normalize, normalize_text};
pub use report::{
    AggregateSource, CaptureTimeout, CellGap, CompletenessReport, ExtractionReport, GapReason,
    NavigationMiss, RunDiagnostics,
};
pub use resolve::{MetricResolver, ResolvedMetric};
pub use types::*;

//! Response tap and per-section completeness wait.
//!
//! The tap is a task that turns intercepted bodies into [`CaptureEvent`]s.
//! It reads the active-section marker only after a body has been decoded
//! and resolved, so a payload is attributed to whichever section is active
//! when its decoding completes.

use crate::renderer::InterceptedResponse;
use dashtap::{attribute, try_decode, CaptureEvent, CaptureLog, MetricKey, MetricResolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TapStats {
    payloads: AtomicUsize,
    decode_failures: AtomicUsize,
}

impl TapStats {
    pub fn payloads(&self) -> usize {
        self.payloads.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> usize {
        self.decode_failures.load(Ordering::Relaxed)
    }
}

/// Running response tap. Dropping it stops the task.
pub struct ResponseTap {
    handle: JoinHandle<()>,
    stats: Arc<TapStats>,
}

impl ResponseTap {
    pub fn spawn(
        mut responses: mpsc::UnboundedReceiver<InterceptedResponse>,
        marker: watch::Receiver<Option<String>>,
        resolver: MetricResolver,
        guard: String,
        started: Instant,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        let stats = Arc::new(TapStats::default());
        let task_stats = Arc::clone(&stats);

        let handle = tokio::spawn(async move {
            let mut seq = 0u64;
            while let Some(response) = responses.recv().await {
                seq += 1;
                task_stats.payloads.fetch_add(1, Ordering::Relaxed);

                let columns = match try_decode(&response.body, &guard) {
                    Ok(columns) => columns,
                    Err(e) => {
                        task_stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(url = %response.url, seq, "discarding payload: {e}");
                        continue;
                    }
                };
                let resolved = resolver.resolve(&columns);

                let section = marker.borrow().clone();
                let at_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(
                    seq,
                    columns = columns.len(),
                    resolved = resolved.len(),
                    section = section.as_deref().unwrap_or("-"),
                    "payload decoded"
                );

                for event in attribute(section.as_deref(), resolved, seq, at_ms) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Self { handle, stats }
    }

    pub fn stats(&self) -> &TapStats {
        &self.stats
    }
}

impl Drop for ResponseTap {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Result of waiting on one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionWait {
    pub complete: bool,
    pub missing: Vec<MetricKey>,
    pub waited: Duration,
}

/// Move every queued event into the log.
pub fn drain(events: &mut mpsc::UnboundedReceiver<CaptureEvent>, log: &mut CaptureLog) -> usize {
    let mut moved = 0;
    while let Ok(event) = events.try_recv() {
        log.push(event);
        moved += 1;
    }
    moved
}

/// Poll until every metric has a value for `section` or the deadline passes.
pub async fn await_section(
    section: &str,
    metrics: &[MetricKey],
    log: &mut CaptureLog,
    events: &mut mpsc::UnboundedReceiver<CaptureEvent>,
    deadline: Duration,
    poll: Duration,
) -> SectionWait {
    let start = Instant::now();
    loop {
        drain(events, log);
        if log.is_complete(section, metrics) {
            return SectionWait {
                complete: true,
                missing: Vec::new(),
                waited: start.elapsed(),
            };
        }
        let waited = start.elapsed();
        if waited >= deadline {
            return SectionWait {
                complete: false,
                missing: log.missing(section, metrics),
                waited,
            };
        }
        tokio::time::sleep(poll.min(deadline - waited)).await;
    }
}

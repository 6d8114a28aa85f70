//! Structured progress reporting for the debug loop.
//!
//! Every state transition produces one [`ProgressEvent`]. The default sink
//! emits it through `tracing` with key/value fields so long batch runs can be
//! followed from the log.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::checker::Backend;

/// State transition being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    InitialRun,
    Debug,
    Reboot,
    Passed,
    Exhausted,
    /// Secondary failures crossed the rollback threshold
    Escalated,
}

impl ProgressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressKind::InitialRun => "initial-run",
            ProgressKind::Debug => "debug",
            ProgressKind::Reboot => "reboot",
            ProgressKind::Passed => "passed",
            ProgressKind::Exhausted => "exhausted",
            ProgressKind::Escalated => "escalated",
        }
    }
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub task_id: String,
    pub backend: Backend,
    pub kind: ProgressKind,
    /// Iterations used by this backend so far
    pub iteration: u32,
    /// Per-backend iteration budget
    pub max: u32,
    /// Iterations used by both backends
    pub total: u32,
    /// Time since the loop started
    pub elapsed: Duration,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} - iter {}/{}, total {} ({:.1}s)",
            self.task_id,
            self.backend,
            self.kind,
            self.iteration,
            self.max,
            self.total,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Receives progress events from running loops
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Sink that writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        match event.kind {
            ProgressKind::Exhausted | ProgressKind::Escalated => tracing::warn!(
                task_id = %event.task_id,
                backend = %event.backend,
                kind = %event.kind,
                iteration = event.iteration,
                max = event.max,
                total = event.total,
                elapsed_secs = event.elapsed.as_secs_f64(),
                "{}",
                event
            ),
            _ => tracing::info!(
                task_id = %event.task_id,
                backend = %event.backend,
                kind = %event.kind,
                iteration = event.iteration,
                max = event.max,
                total = event.total,
                elapsed_secs = event.elapsed.as_secs_f64(),
                "{}",
                event
            ),
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Kinds reported for one backend, in order
    pub fn kinds(&self, backend: Backend) -> Vec<ProgressKind> {
        self.events()
            .into_iter()
            .filter(|e| e.backend == backend)
            .map(|e| e.kind)
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(backend: Backend, kind: ProgressKind) -> ProgressEvent {
        ProgressEvent {
            task_id: "mux".to_string(),
            backend,
            kind,
            iteration: 2,
            max: 5,
            total: 3,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_display() {
        let text = event(Backend::Primary, ProgressKind::Debug).to_string();
        assert_eq!(text, "[mux] verilog debug - iter 2/5, total 3 (1.5s)");
    }

    #[test]
    fn test_recording_filters_by_backend() {
        let sink = RecordingProgress::new();
        sink.report(&event(Backend::Primary, ProgressKind::InitialRun));
        sink.report(&event(Backend::Secondary, ProgressKind::Reboot));
        sink.report(&event(Backend::Primary, ProgressKind::Passed));

        assert_eq!(sink.events().len(), 3);
        assert_eq!(
            sink.kinds(Backend::Primary),
            vec![ProgressKind::InitialRun, ProgressKind::Passed]
        );
        assert_eq!(sink.kinds(Backend::Secondary), vec![ProgressKind::Reboot]);
    }

    #[test]
    fn test_log_progress_does_not_panic_without_subscriber() {
        LogProgress.report(&event(Backend::Secondary, ProgressKind::Escalated));
    }
}

//! Call observation hooks
//!
//! The dispatcher emits structured call events through a `CallObserver`.
//! The core runs correctly with no sink attached; the server binary installs
//! the tracing-backed observer.

use std::time::Duration;

use crate::error::ErrorKind;

/// How a dispatched call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Completed,
    Failed(ErrorKind),
    TimedOut,
}

impl CallOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Completed => "completed",
            CallOutcome::Failed(_) => "failed",
            CallOutcome::TimedOut => "timed_out",
        }
    }
}

/// Sink for per-call lifecycle events
pub trait CallObserver: Send + Sync {
    fn on_call_start(&self, tool: &str);
    fn on_call_end(&self, tool: &str, outcome: CallOutcome, latency: Duration);
}

/// Default sink: does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CallObserver for NoopObserver {
    fn on_call_start(&self, _tool: &str) {}
    fn on_call_end(&self, _tool: &str, _outcome: CallOutcome, _latency: Duration) {}
}

/// Observer emitting tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_call_start(&self, tool: &str) {
        tracing::debug!(tool, "call start");
    }

    fn on_call_end(&self, tool: &str, outcome: CallOutcome, latency: Duration) {
        tracing::info!(
            tool,
            outcome = outcome.as_str(),
            latency_ms = latency.as_millis() as u64,
            "call end"
        );
    }
}

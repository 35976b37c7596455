//! Host callback that reports process output through tracing.

use crate::metrics::Metrics;
use sdlfsm_core::{Callback, ProcessId, Value};
use std::sync::Arc;

/// Logs emitted signals and function calls and counts them in [`Metrics`].
/// Function calls leave their arguments untouched.
pub struct LoggingCallback {
    metrics: Arc<Metrics>,
}

impl LoggingCallback {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

fn render(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Callback for LoggingCallback {
    fn handle_send_signal(&self, process_id: ProcessId, name: &str, args: &[Value]) {
        self.metrics
            .signals_sent_total
            .with_label_values(&[name])
            .inc();
        tracing::info!(process_id, "signal {}({})", name, render(args));
    }

    fn handle_function_call(&self, process_id: ProcessId, name: &str, args: &mut [Value]) {
        self.metrics
            .function_calls_total
            .with_label_values(&[name])
            .inc();
        tracing::info!(process_id, "call {}({})", name, render(args));
    }
}

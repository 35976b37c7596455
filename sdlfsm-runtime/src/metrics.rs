//! Prometheus metrics for hosted processes.
//!
//! The registry is owned by the runtime; hosts export it with [`Metrics::encode`].

use crate::error::RuntimeError;
use prometheus::core::Collector;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus metrics for the process runtime.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Signals emitted by processes, by signal name.
    pub signals_sent_total: IntCounterVec,
    /// Host function calls, by function name.
    pub function_calls_total: IntCounterVec,
    /// Events dispatched by the manager, by kind.
    pub events_total: IntCounterVec,
    /// Failed events, by error code.
    pub errors_total: IntCounterVec,
    /// Processes that left the manager, by outcome.
    pub outcomes_total: IntCounterVec,
    /// Processes currently hosted.
    pub processes_active: IntGauge,
}

impl Metrics {
    /// Creates a new Metrics instance with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let signals_sent_total = IntCounterVec::new(
            Opts::new("sdlfsm_signals_sent_total", "Signals emitted by processes"),
            &["signal"],
        )?;
        registry.register(Box::new(signals_sent_total.clone()))?;

        let function_calls_total = IntCounterVec::new(
            Opts::new("sdlfsm_function_calls_total", "Host function calls by function"),
            &["function"],
        )?;
        registry.register(Box::new(function_calls_total.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("sdlfsm_events_total", "Events dispatched by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("sdlfsm_errors_total", "Failed events by error code"),
            &["code"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let outcomes_total = IntCounterVec::new(
            Opts::new("sdlfsm_process_outcomes_total", "Processes removed by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(outcomes_total.clone()))?;

        let processes_active = IntGauge::with_opts(Opts::new(
            "sdlfsm_processes_active",
            "Number of hosted processes",
        ))?;
        registry.register(Box::new(processes_active.clone()))?;

        Ok(Self {
            registry,
            signals_sent_total,
            function_calls_total,
            events_total,
            errors_total,
            outcomes_total,
            processes_active,
        })
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, RuntimeError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn signals_sent(&self) -> u64 {
        sum(&self.signals_sent_total)
    }

    pub fn function_calls(&self) -> u64 {
        sum(&self.function_calls_total)
    }
}

/// Sum over every label combination of a counter.
fn sum(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|metric| metric.get_counter().get_value() as u64)
        .sum()
}

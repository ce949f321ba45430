//! Prometheus-style counters for the orchestration core. Agents and safety
//! components keep their own counters (spec.md §3 ownership); this registry
//! aggregates a handful of cross-cutting, process-wide series for scraping.
//! Exposing them over HTTP is outside this crate's scope (spec.md §1).

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct CoreMetrics {
    registry: Registry,
    pub executions_total: IntCounter,
    pub execution_decisions: IntCounterVec,
    pub debates_total: IntCounter,
    pub drawdown_halts_total: IntCounter,
}

impl CoreMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let executions_total = IntCounter::new("executions_total", "total execution loop cycles run")?;
        let execution_decisions = IntCounterVec::new(
            Opts::new("execution_decisions_total", "execution loop cycles by decision"),
            &["decision"],
        )?;
        let debates_total = IntCounter::new("debates_total", "total debate loop runs")?;
        let drawdown_halts_total = IntCounter::new("drawdown_halts_total", "total accounts transitioned into halted state")?;

        registry.register(Box::new(executions_total.clone()))?;
        registry.register(Box::new(execution_decisions.clone()))?;
        registry.register(Box::new(debates_total.clone()))?;
        registry.register(Box::new(drawdown_halts_total.clone()))?;

        Ok(Self {
            registry,
            executions_total,
            execution_decisions,
            debates_total,
            drawdown_halts_total,
        })
    }

    /// Renders the current state in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_after_increment() {
        let metrics = CoreMetrics::new().unwrap();
        metrics.executions_total.inc();
        metrics.execution_decisions.with_label_values(&["approve"]).inc();
        let rendered = metrics.render();
        assert!(rendered.contains("executions_total"));
        assert!(rendered.contains("execution_decisions_total"));
    }
}

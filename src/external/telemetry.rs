//! Telemetry sink (spec.md §6): a leveled structured logger and span
//! factory. Logging never affects control flow.

use async_trait::async_trait;
use tracing::{span, Level};

#[async_trait]
pub trait Telemetry: Send + Sync {
    fn start_span(&self, name: &str) -> SpanHandle;
    fn finish_span(&self, handle: SpanHandle);
    fn add_breadcrumb(&self, message: &str, data: serde_json::Value);
}

pub struct SpanHandle {
    inner: Option<tracing::span::EnteredSpan>,
}

/// `tracing` already gives the crate structured spans natively; this trait
/// exists purely so call sites stay swappable with an OTel layer without a
/// crate-wide rewrite.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

#[async_trait]
impl Telemetry for TracingTelemetry {
    fn start_span(&self, name: &str) -> SpanHandle {
        let span = span!(Level::INFO, "telemetry_span", name = name).entered();
        SpanHandle { inner: Some(span) }
    }

    fn finish_span(&self, handle: SpanHandle) {
        drop(handle.inner);
    }

    fn add_breadcrumb(&self, message: &str, data: serde_json::Value) {
        tracing::debug!(%data, "{message}");
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl Telemetry for NoopTelemetry {
    fn start_span(&self, _name: &str) -> SpanHandle {
        SpanHandle { inner: None }
    }

    fn finish_span(&self, _handle: SpanHandle) {}

    fn add_breadcrumb(&self, _message: &str, _data: serde_json::Value) {}
}

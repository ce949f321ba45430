//! External collaborator traits (spec.md §6).
//!
//! The core consumes these capabilities but does not implement them for
//! real: the LLM client, exchange adapter, persistent store, telemetry
//! sink, and notification transport are each modeled as a narrow
//! `#[async_trait]` trait with a `Mock*`/test-double behind it, the way the
//! teacher isolates `OrderExecutor` behind `MockOrderExecutor`.

pub mod exchange;
pub mod llm;
pub mod notification;
pub mod store;
pub mod telemetry;

pub use exchange::{ExchangeAdapter, MockExchangeAdapter, MockOrderExecutor, OrderExecutor};
pub use llm::{LlmClient, MockLlmClient, MockToolExecutor, ToolExecutor};
pub use notification::{MockNotificationTransport, NotificationTransport};
pub use store::{MockStore, SqlxStore, Store};
pub use telemetry::{NoopTelemetry, Telemetry, TracingTelemetry};

//! Notification transport (spec.md §6): `sendMessage(chat_id, text)` with
//! retryable/terminal error classification.

use crate::error::TradingResult;
use async_trait::async_trait;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Retryable,
    Terminal,
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> TradingResult<DispatchOutcome>;
}

#[derive(Debug, Clone, Default)]
pub struct MockNotificationTransport {
    pub fail: bool,
}

#[async_trait]
impl NotificationTransport for MockNotificationTransport {
    async fn send_message(&self, chat_id: &str, text: &str) -> TradingResult<DispatchOutcome> {
        if self.fail {
            warn!(chat_id, "mock notification transport configured to fail");
            return Ok(DispatchOutcome::Retryable);
        }
        tracing::debug!(chat_id, text, "mock notification sent");
        Ok(DispatchOutcome::Sent)
    }
}

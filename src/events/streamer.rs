//! Action Streamer (spec.md §4.8): a separate journal of typed actions.

use crate::external::notification::NotificationTransport;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Trade,
    QuestProgress,
    RiskEvent,
    FundMilestone,
    AiReasoning,
    Arbitrage,
    SystemAlert,
    PositionUpdate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Executed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub action_type: ActionType,
    pub priority: ActionPriority,
    pub status: ActionStatus,
    pub payload: serde_json::Value,
    pub notification_sent: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

struct Subscriber {
    sender: mpsc::Sender<Action>,
}

pub struct ActionStreamer {
    history_cap: usize,
    subscriber_capacity: usize,
    history: RwLock<VecDeque<Action>>,
    subscribers: RwLock<Vec<Subscriber>>,
    notifier: Option<Arc<dyn NotificationTransport>>,
}

impl ActionStreamer {
    pub fn new(history_cap: usize, subscriber_capacity: usize, notifier: Option<Arc<dyn NotificationTransport>>) -> Self {
        Self {
            history_cap,
            subscriber_capacity,
            history: RwLock::new(VecDeque::new()),
            subscribers: RwLock::new(Vec::new()),
            notifier,
        }
    }

    pub async fn subscribe(&self) -> mpsc::Receiver<Action> {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.subscribers.write().await.push(Subscriber { sender: tx });
        rx
    }

    pub async fn publish(
        &self,
        action_type: ActionType,
        priority: ActionPriority,
        payload: serde_json::Value,
    ) -> Action {
        let action = Action {
            id: Uuid::new_v4(),
            action_type,
            priority,
            status: ActionStatus::Pending,
            payload,
            notification_sent: false,
            created_at: chrono::Utc::now(),
        };

        {
            let mut history = self.history.write().await;
            history.push_back(action.clone());
            while history.len() > self.history_cap {
                history.pop_front();
            }
        }

        {
            let subscribers = self.subscribers.read().await;
            for subscriber in subscribers.iter() {
                if subscriber.sender.try_send(action.clone()).is_err() {
                    warn!(action_id = %action.id, ?action_type, "action streamer subscriber channel full; dropping");
                }
            }
        }

        if matches!(priority, ActionPriority::High | ActionPriority::Critical) {
            self.dispatch_notification(&action).await;
        }

        action
    }

    pub async fn scan_by_type(&self, action_type: ActionType) -> Vec<Action> {
        self.history
            .read()
            .await
            .iter()
            .filter(|a| a.action_type == action_type)
            .cloned()
            .collect()
    }

    /// Idempotent best-effort notification dispatch — marks
    /// `notification_sent` on success, never on failure, and is only
    /// recorded in this in-memory journal snapshot (the caller owns
    /// whichever durable store tracks delivery long-term).
    async fn dispatch_notification(&self, action: &Action) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let text = format!("{:?} action ({:?}): {}", action.action_type, action.priority, action.payload);
        match notifier.send_message("ops", &text).await {
            Ok(_) => {
                let mut history = self.history.write().await;
                if let Some(entry) = history.iter_mut().find(|a| a.id == action.id) {
                    entry.notification_sent = true;
                }
            }
            Err(e) => warn!(action_id = %action.id, error = %e, "action streamer notification dispatch failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::notification::MockNotificationTransport;

    #[tokio::test]
    async fn subscriber_receives_published_actions() {
        let streamer = ActionStreamer::new(1000, 100, None);
        let mut rx = streamer.subscribe().await;
        streamer
            .publish(ActionType::Trade, ActionPriority::Normal, serde_json::json!({"symbol": "BTC"}))
            .await;
        let action = rx.recv().await.unwrap();
        assert_eq!(action.action_type, ActionType::Trade);
    }

    #[tokio::test]
    async fn history_is_capped_and_scannable() {
        let streamer = ActionStreamer::new(3, 100, None);
        for i in 0..5 {
            streamer
                .publish(ActionType::RiskEvent, ActionPriority::Low, serde_json::json!({"i": i}))
                .await;
        }
        let events = streamer.scan_by_type(ActionType::RiskEvent).await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn critical_action_marks_notification_sent() {
        let notifier = Arc::new(MockNotificationTransport::default());
        let streamer = ActionStreamer::new(1000, 100, Some(notifier));
        streamer
            .publish(ActionType::SystemAlert, ActionPriority::Critical, serde_json::json!({}))
            .await;
        let events = streamer.scan_by_type(ActionType::SystemAlert).await;
        assert!(events[0].notification_sent);
    }
}

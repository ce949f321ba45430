//! Session repository (spec.md §4.7): persists the JSON-encoded,
//! checksummed `SessionState` plus indexed columns, upsert-on-id.

use crate::error::{TradingError, TradingResult};
use crate::external::store::{SqlValue, Store};
use crate::models::{SessionState, SessionStatus};
use crate::session::checksum;
use std::sync::Arc;
use tracing::warn;

pub struct SessionRepository {
    store: Arc<dyn Store>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Serializes and upserts one session (spec.md §4.7: upsert-on-id via
    /// `ON CONFLICT(id) DO UPDATE`).
    pub async fn save(&self, state: &mut SessionState) -> TradingResult<()> {
        let payload = checksum::serialize(state)?;
        let payload_str = String::from_utf8(payload).expect("session JSON is valid UTF-8");

        self.store
            .exec(
                r#"
                INSERT INTO ai_sessions (id, quest_id, symbol, status, payload, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    quest_id = excluded.quest_id,
                    symbol = excluded.symbol,
                    status = excluded.status,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
                "#,
                &[
                    SqlValue::Text(state.id.to_string()),
                    state
                        .quest_id
                        .clone()
                        .map(SqlValue::Text)
                        .unwrap_or(SqlValue::Null),
                    SqlValue::Text(state.symbol.clone()),
                    SqlValue::Text(status_str(state.status).to_string()),
                    SqlValue::Text(payload_str),
                    SqlValue::Text(state.created_at.to_rfc3339()),
                    SqlValue::Text(state.updated_at.to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn load(&self, id: uuid::Uuid) -> TradingResult<Option<SessionState>> {
        let row = self
            .store
            .query_row(
                "SELECT payload FROM ai_sessions WHERE id = ?1",
                &[SqlValue::Text(id.to_string())],
            )
            .await?;
        let Some(row) = row else { return Ok(None) };
        let payload = row
            .get("payload")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TradingError::Data("ai_sessions row missing payload column".to_string()))?;
        Ok(Some(checksum::deserialize(payload.as_bytes())?))
    }

    /// `ListActive` skips unreadable rows and logs a skip count rather than
    /// aborting (spec.md §4.7).
    pub async fn list_active(&self) -> TradingResult<Vec<SessionState>> {
        let rows = self
            .store
            .query(
                "SELECT payload FROM ai_sessions WHERE status = ?1",
                &[SqlValue::Text(status_str(SessionStatus::Active).to_string())],
            )
            .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in rows {
            let Some(payload) = row.get("payload").and_then(|v| v.as_str()) else {
                skipped += 1;
                continue;
            };
            match checksum::deserialize(payload.as_bytes()) {
                Ok(state) => sessions.push(state),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "skipped unreadable sessions while listing active sessions");
        }
        Ok(sessions)
    }

    /// Applies a permitted status transition (spec.md §4.7), persisting the
    /// result. Returns an error for any transition not in the permitted
    /// set, including any transition out of a terminal state.
    pub async fn transition(&self, state: &mut SessionState, next: SessionStatus) -> TradingResult<()> {
        if !state.status.can_transition_to(next) {
            return Err(TradingError::Validation(format!(
                "illegal session status transition: {:?} -> {:?}",
                state.status, next
            )));
        }
        state.status = next;
        self.save(state).await
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
        SessionStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::store::MockStore;
    use uuid::Uuid;

    fn sample_session() -> SessionState {
        SessionState {
            id: Uuid::new_v4(),
            status: SessionStatus::Active,
            quest_id: None,
            symbol: "BTC/USDT".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            conversation_history: vec![],
            tool_calls_made: vec![],
            loaded_skills: vec![],
            market_snapshot: None,
            portfolio_snapshot: None,
            analysis_result: None,
            trading_decision: None,
            risk_assessment: None,
            execution_result: None,
            iteration_count: 0,
            metadata: serde_json::json!({}),
            checksum: String::new(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = Arc::new(MockStore::default());
        let repo = SessionRepository::new(store);
        let mut state = sample_session();
        let id = state.id;
        repo.save(&mut state).await.unwrap();
        let loaded = repo.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.symbol, "BTC/USDT");
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let store = Arc::new(MockStore::default());
        let repo = SessionRepository::new(store);
        let mut state = sample_session();
        repo.transition(&mut state, SessionStatus::Completed).await.unwrap();
        let err = repo.transition(&mut state, SessionStatus::Active).await.unwrap_err();
        assert!(err.to_string().contains("illegal"));
    }

    #[tokio::test]
    async fn paused_can_return_to_active() {
        let store = Arc::new(MockStore::default());
        let repo = SessionRepository::new(store);
        let mut state = sample_session();
        repo.transition(&mut state, SessionStatus::Paused).await.unwrap();
        repo.transition(&mut state, SessionStatus::Active).await.unwrap();
        assert_eq!(state.status, SessionStatus::Active);
    }
}

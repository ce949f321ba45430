//! Session checksum discipline (spec.md §4.7, §3): `checksum ==
//! SHA-256(state with checksum and updated_at cleared)`.

use crate::error::{TradingError, TradingResult};
use crate::models::SessionState;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

fn cleared_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).expect("epoch is a valid timestamp")
}

fn compute_checksum(state: &SessionState) -> TradingResult<String> {
    let mut clone = state.clone();
    clone.checksum = String::new();
    clone.updated_at = cleared_epoch();
    let bytes = serde_json::to_vec(&clone)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}

/// Stamps `updated_at`, computes the checksum over the cleared state, and
/// returns the JSON encoding of the final session (spec.md §4.7).
pub fn serialize(state: &mut SessionState) -> TradingResult<Vec<u8>> {
    state.updated_at = Utc::now();
    state.checksum = compute_checksum(state)?;
    Ok(serde_json::to_vec(state)?)
}

/// Recomputes the checksum and compares; a mismatch is a fatal corruption
/// error (spec.md §4.7, P5).
pub fn deserialize(bytes: &[u8]) -> TradingResult<SessionState> {
    let state: SessionState = serde_json::from_slice(bytes)?;
    let expected = compute_checksum(&state)?;
    if expected != state.checksum {
        return Err(TradingError::Integrity(format!(
            "checksum mismatch: expected {expected}, got {}",
            state.checksum
        )));
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use uuid::Uuid;

    fn sample_session() -> SessionState {
        SessionState {
            id: Uuid::new_v4(),
            status: SessionStatus::Active,
            quest_id: None,
            symbol: "BTC/USDT".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
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

    /// P5 — session round-trip.
    #[test]
    fn p5_round_trip_preserves_state() {
        let mut state = sample_session();
        let bytes = serialize(&mut state).unwrap();
        let loaded = deserialize(&bytes).unwrap();
        assert_eq!(loaded.id, state.id);
        assert_eq!(loaded.checksum, state.checksum);
    }

    /// S4 — session tamper detection.
    #[test]
    fn s4_tamper_detection() {
        let mut state = sample_session();
        state.symbol = "BTC/USDT".to_string();
        let bytes = serialize(&mut state).unwrap();

        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["symbol"] = serde_json::Value::String("ETH/USDT".to_string());
        let tampered = serde_json::to_vec(&value).unwrap();

        let err = deserialize(&tampered).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }
}

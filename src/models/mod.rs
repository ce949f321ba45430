//! Core data model shared by every agent and subsystem (spec.md §3).
//!
//! Monetary quantities use `rust_decimal::Decimal`; ratios, scores, weights
//! and confidences stay `f64`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------
// Analyst
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// One input to the Analyst Agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub direction: Direction,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalystRole {
    Technical,
    Sentiment,
    Onchain,
    Fundamental,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
    Watch,
    Avoid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    Bullish,
    Bearish,
    Neutral,
    Volatile,
    Trending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Output of the Analyst Agent. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub symbol: String,
    pub role: AnalystRole,
    pub recommendation: Recommendation,
    pub condition: MarketCondition,
    pub score: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub analyzed_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

// ---------------------------------------------------------------------
// Risk Manager
// ---------------------------------------------------------------------

/// One input to the Risk Manager Agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSignal {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub threshold: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskAction {
    Allow,
    Warning,
    Reduce,
    Block,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub action: RiskAction,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub max_position_size: Decimal,
}

// ---------------------------------------------------------------------
// Trader
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    OpenLong,
    OpenShort,
    Close,
    Hold,
    Wait,
}

impl TradeAction {
    /// Buy-family vs. sell-family grouping, used by the Debate Loop's
    /// same-side consensus check.
    pub fn side_family(self) -> Option<Side> {
        match self {
            TradeAction::OpenLong => Some(Side::Long),
            TradeAction::OpenShort => Some(Side::Short),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingDecision {
    pub symbol: String,
    pub action: TradeAction,
    pub side: Option<Side>,
    pub confidence: f64,
    pub size_percent: f64,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reasoning: String,
    pub risk_score: f64,
}

// ---------------------------------------------------------------------
// Market / portfolio context
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub symbol: String,
    pub current_price: Decimal,
    pub volatility: f64,
    pub liquidity: f64,
    pub volume_24h: Decimal,
    pub funding_rate: f64,
    pub trend: Trend,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub total_value: Decimal,
    pub available_cash: Decimal,
    pub open_positions: u32,
    pub current_drawdown: f64,
    pub unrealized_pnl: Decimal,
}

// ---------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Permitted status transitions per spec.md §4.7: `active -> paused ->
    /// active`, `active -> completed`, `active -> failed`. Terminal states
    /// do not transition further.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Active, Paused) | (Paused, Active) | (Active, Completed) | (Active, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// A single LLM tool invocation recorded in the session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub called_at: DateTime<Utc>,
}

/// One message in the LLM conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Journaled state of one execution-loop invocation (spec.md §4.7).
///
/// Invariant: `checksum == SHA-256(state with checksum and updated_at
/// cleared)`; any consumer loading a session MUST recompute and compare
/// (see [`crate::session::checksum`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: Uuid,
    pub status: SessionStatus,
    pub quest_id: Option<String>,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub conversation_history: Vec<ConversationMessage>,
    pub tool_calls_made: Vec<ToolCallRecord>,
    pub loaded_skills: Vec<String>,
    pub market_snapshot: Option<MarketContext>,
    pub portfolio_snapshot: Option<PortfolioState>,
    pub analysis_result: Option<Analysis>,
    pub trading_decision: Option<TradingDecision>,
    pub risk_assessment: Option<RiskAssessment>,
    pub execution_result: Option<serde_json::Value>,
    pub iteration_count: u32,
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub checksum: String,
}

// ---------------------------------------------------------------------
// Drawdown
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownStatus {
    Normal,
    Warning,
    Critical,
    Halted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownState {
    pub current_drawdown: f64,
    pub peak_value: Decimal,
    pub current_value: Decimal,
    pub max_drawdown_seen: f64,
    pub status: DrawdownStatus,
    pub trading_halted: bool,
    pub halted_at: Option<DateTime<Utc>>,
    pub recovered_at: Option<DateTime<Utc>>,
    pub warning_count: u32,
    pub halt_count: u32,
}

impl Default for DrawdownState {
    fn default() -> Self {
        Self {
            current_drawdown: 0.0,
            peak_value: Decimal::ZERO,
            current_value: Decimal::ZERO,
            max_drawdown_seen: 0.0,
            status: DrawdownStatus::Normal,
            trading_halted: false,
            halted_at: None,
            recovered_at: None,
            warning_count: 0,
            halt_count: 0,
        }
    }
}

// ---------------------------------------------------------------------
// Data quality
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    Ok,
    PriceOutlier,
    VolumeAnomaly,
    StaleData,
    CrossExchangeDiff,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    pub symbol: String,
    pub exchange: String,
    pub flags: Vec<QualityFlag>,
    pub price_change: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub age_seconds: f64,
}

impl QualityResult {
    pub fn is_blocking(&self) -> bool {
        self.flags
            .iter()
            .any(|f| matches!(f, QualityFlag::PriceOutlier | QualityFlag::StaleData))
    }
}

// ---------------------------------------------------------------------
// Trading events (spec.md §3, type-discriminated payloads)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TradingEventKind {
    PriceUpdate,
    SignalDetected,
    ArbitrageFound,
    OrderFilled,
    OrderRejected,
    StopTriggered,
    DrawdownAlert,
    EmergencyStop,
    OddsChange,
    EventResolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    PriceUpdate {
        symbol: String,
        price: Decimal,
        volume: Decimal,
    },
    SignalDetected {
        symbol: String,
        signal_name: String,
        direction: Direction,
        strength: f64,
    },
    ArbitrageFound {
        symbol: String,
        venue_a: String,
        venue_b: String,
        spread_pct: f64,
    },
    OrderFilled {
        order_id: Uuid,
        symbol: String,
        side: Side,
        filled_size: Decimal,
        filled_price: Decimal,
    },
    OrderRejected {
        symbol: String,
        reason: String,
    },
    StopTriggered {
        symbol: String,
        stop_price: Decimal,
    },
    DrawdownAlert {
        account: String,
        drawdown: f64,
        status: DrawdownStatus,
    },
    EmergencyStop {
        account: String,
        reason: String,
    },
    OddsChange {
        symbol: String,
        previous: f64,
        current: f64,
    },
    EventResolved {
        symbol: String,
        outcome: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingEvent {
    #[serde(rename = "type")]
    pub kind: TradingEventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl TradingEvent {
    pub fn new(kind: TradingEventKind, payload: EventPayload) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }
}

//! Analyst Agent (spec.md §4.1): weighted signal fusion into a
//! recommendation and confidence. Pure function of inputs plus counters.

use crate::config::AnalystConfig;
use crate::error::TradingResult;
use crate::models::{Analysis, AnalystRole, Direction, MarketCondition, Recommendation, RiskLevel, Signal};
use serde_json::json;
use std::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct AnalystMetrics {
    pub analyses_run: u64,
    pub buy_calls: u64,
    pub sell_calls: u64,
    pub watch_downgrades: u64,
}

pub struct AnalystAgent {
    config: AnalystConfig,
    metrics: RwLock<AnalystMetrics>,
}

impl AnalystAgent {
    pub fn new(config: AnalystConfig) -> Self {
        Self {
            config,
            metrics: RwLock::new(AnalystMetrics::default()),
        }
    }

    pub fn metrics(&self) -> AnalystMetrics {
        self.metrics.read().expect("analyst metrics lock poisoned").clone()
    }

    /// `Analyze(symbol, role, signals[]) -> Analysis | error` (spec.md
    /// §4.1). Never fails on valid input.
    #[instrument(skip(self, signals), fields(symbol = %symbol, signal_count = signals.len()))]
    pub fn analyze(&self, symbol: &str, role: AnalystRole, signals: &[Signal]) -> TradingResult<Analysis> {
        let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
        let score = if total_weight > 0.0 {
            signals.iter().map(|s| s.value * s.weight).sum::<f64>() / total_weight
        } else {
            0.0
        };

        let bullish = signals.iter().filter(|s| s.direction == Direction::Bullish).count();
        let bearish = signals.iter().filter(|s| s.direction == Direction::Bearish).count();

        let mut recommendation = if bullish > bearish && score > self.config.signal_threshold {
            Recommendation::Buy
        } else if bearish > bullish && score < -self.config.signal_threshold {
            Recommendation::Sell
        } else {
            Recommendation::Hold
        };

        let score_sign_direction = if score > 0.0 {
            Direction::Bullish
        } else if score < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };
        let agreeing = signals
            .iter()
            .filter(|s| s.direction == score_sign_direction)
            .count();
        let agreement_ratio = if signals.is_empty() {
            0.0
        } else {
            agreeing as f64 / signals.len() as f64
        };
        let confidence = (0.7 * agreement_ratio + 0.3 * score.abs()).clamp(0.0, 1.0);

        let mut downgraded = false;
        if confidence < self.config.min_confidence {
            recommendation = Recommendation::Watch;
            downgraded = true;
        }

        let condition = self.classify_condition(signals, score);
        let risk_level = self.classify_risk(signals);

        let mut metrics = self.metrics.write().expect("analyst metrics lock poisoned");
        metrics.analyses_run += 1;
        match recommendation {
            Recommendation::Buy => metrics.buy_calls += 1,
            Recommendation::Sell => metrics.sell_calls += 1,
            _ => {}
        }
        if downgraded {
            metrics.watch_downgrades += 1;
        }
        drop(metrics);

        Ok(Analysis {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            role,
            recommendation,
            condition,
            score,
            confidence,
            risk_level,
            summary: format!(
                "score={score:.3} confidence={confidence:.3} bullish={bullish} bearish={bearish}"
            ),
            analyzed_at: chrono::Utc::now(),
            metadata: json!({ "signal_count": signals.len() }),
        })
    }

    fn classify_condition(&self, signals: &[Signal], score: f64) -> MarketCondition {
        let volatile = signals
            .iter()
            .any(|s| matches!(s.name.as_str(), "volatility" | "atr") && s.value > 0.7);
        if volatile {
            return MarketCondition::Volatile;
        }
        if score > 0.5 {
            return MarketCondition::Bullish;
        }
        if score < -0.5 {
            return MarketCondition::Bearish;
        }
        let trending = signals.iter().any(|s| matches!(s.name.as_str(), "trend" | "adx"));
        if trending {
            return MarketCondition::Trending;
        }
        MarketCondition::Neutral
    }

    fn classify_risk(&self, signals: &[Signal]) -> RiskLevel {
        let mut heuristic = 0.0;
        for s in signals {
            match s.name.as_str() {
                "volatility" => heuristic += s.value * 0.4,
                "volume" | "liquidity" if s.value < 0.3 => heuristic += 0.2,
                _ => {}
            }
        }
        if heuristic > 0.6 {
            RiskLevel::High
        } else if heuristic > 0.3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

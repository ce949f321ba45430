//! Risk Manager Agent (spec.md §4.2): threshold/weight risk scoring.

use crate::config::RiskManagerConfig;
use crate::models::{RiskAction, RiskAssessment, RiskLevel, RiskSignal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::sync::RwLock;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct RiskManagerMetrics {
    pub assessments_run: u64,
    pub blocks: u64,
    pub emergencies: u64,
}

pub struct RiskManagerAgent {
    config: RiskManagerConfig,
    metrics: RwLock<RiskManagerMetrics>,
}

impl RiskManagerAgent {
    pub fn new(config: RiskManagerConfig) -> Self {
        Self {
            config,
            metrics: RwLock::new(RiskManagerMetrics::default()),
        }
    }

    pub fn metrics(&self) -> RiskManagerMetrics {
        self.metrics.read().expect("risk metrics lock poisoned").clone()
    }

    /// `AssessTradingRisk(symbol, side, signals[]) -> Assessment` (spec.md
    /// §4.2).
    #[instrument(skip(self, signals), fields(symbol = %symbol, signal_count = signals.len()))]
    pub fn assess(&self, symbol: &str, side: &str, signals: &[RiskSignal]) -> RiskAssessment {
        let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
        let score = if total_weight > 0.0 {
            signals
                .iter()
                .map(|s| {
                    let clipped = if s.threshold > 0.0 {
                        (s.value / s.threshold).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    clipped * s.weight
                })
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };

        let reasons: Vec<String> = signals
            .iter()
            .filter(|s| s.value > s.threshold)
            .map(|s| s.name.clone())
            .collect();

        // Action mapping: thresholds are checked in monotonically increasing
        // order (spec.md Open Question 2; see DESIGN.md).
        let action = if score < self.config.warn_threshold {
            RiskAction::Allow
        } else if score < self.config.reduce_threshold {
            RiskAction::Warning
        } else if score < self.config.block_threshold {
            RiskAction::Reduce
        } else if score < self.config.emergency_threshold {
            RiskAction::Block
        } else {
            RiskAction::Emergency
        };

        let risk_level = if score > 0.66 {
            RiskLevel::High
        } else if score > 0.33 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let severity = ((score - self.config.reduce_threshold).max(0.0))
            / (self.config.block_threshold - self.config.reduce_threshold).max(1e-6);
        let severity = severity.clamp(0.0, 1.0);
        let max_position_size = if action == RiskAction::Reduce {
            let factor = (1.0 - severity).max(0.0);
            self.config.base_max_position_size
                * rust_decimal::Decimal::from_f64_retain(factor).unwrap_or(dec!(0))
        } else if matches!(action, RiskAction::Block | RiskAction::Emergency) {
            dec!(0)
        } else {
            self.config.base_max_position_size
        };

        let recommendations = match action {
            RiskAction::Allow => vec![],
            RiskAction::Warning => vec!["monitor position closely".to_string()],
            RiskAction::Reduce => vec![format!("reduce position size for {symbol} {side}")],
            RiskAction::Block => vec![format!("block new {side} entries on {symbol}")],
            RiskAction::Emergency => vec!["halt trading and review exposure immediately".to_string()],
        };

        let mut metrics = self.metrics.write().expect("risk metrics lock poisoned");
        metrics.assessments_run += 1;
        if action == RiskAction::Block {
            metrics.blocks += 1;
        }
        if action == RiskAction::Emergency {
            metrics.emergencies += 1;
        }
        drop(metrics);

        RiskAssessment {
            score,
            risk_level,
            action,
            reasons,
            recommendations,
            max_position_size,
        }
    }

    /// `ShouldTrade(assessment) -> bool` (spec.md §4.2): true for `allow`
    /// and `warning`.
    pub fn should_trade(assessment: &RiskAssessment) -> bool {
        matches!(assessment.action, RiskAction::Allow | RiskAction::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(name: &str, value: f64, weight: f64, threshold: f64) -> RiskSignal {
        RiskSignal {
            name: name.to_string(),
            value,
            weight,
            threshold,
            description: String::new(),
        }
    }

    #[test]
    fn low_signals_allow_trading() {
        let agent = RiskManagerAgent::new(RiskManagerConfig::default());
        let signals = vec![signal("volatility", 0.1, 1.0, 1.0)];
        let assessment = agent.assess("BTC/USDT", "long", &signals);
        assert_eq!(assessment.action, RiskAction::Allow);
        assert!(RiskManagerAgent::should_trade(&assessment));
    }

    #[test]
    fn high_signals_trigger_emergency() {
        let agent = RiskManagerAgent::new(RiskManagerConfig::default());
        let signals = vec![
            signal("volatility", 1.0, 1.0, 1.0),
            signal("drawdown", 1.0, 1.0, 1.0),
        ];
        let assessment = agent.assess("BTC/USDT", "long", &signals);
        assert_eq!(assessment.action, RiskAction::Emergency);
        assert!(!RiskManagerAgent::should_trade(&assessment));
        assert_eq!(assessment.max_position_size, dec!(0));
    }

    #[test]
    fn reasons_list_signals_exceeding_threshold() {
        let agent = RiskManagerAgent::new(RiskManagerConfig::default());
        let signals = vec![signal("volatility", 0.9, 1.0, 0.5)];
        let assessment = agent.assess("BTC/USDT", "long", &signals);
        assert!(assessment.reasons.contains(&"volatility".to_string()));
    }

    #[test]
    fn zero_weight_signals_yield_zero_score() {
        let agent = RiskManagerAgent::new(RiskManagerConfig::default());
        let assessment = agent.assess("BTC/USDT", "long", &[]);
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.action, RiskAction::Allow);
    }
}

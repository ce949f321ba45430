//! Order-Book Imbalance Detector (spec.md §4.6.7).

use crate::config::ImbalanceConfig;
use crate::models::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct DepthMetrics {
    pub bid_depth_1pct: Decimal,
    pub ask_depth_1pct: Decimal,
    pub imbalance_1pct: f64,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub mid_price: Decimal,
    pub bid_levels: usize,
    pub ask_levels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone)]
pub struct ImbalanceSignal {
    pub symbol: String,
    pub direction: Direction,
    pub score: f64,
    pub strength: SignalStrength,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

struct SymbolState {
    last_signal_at: Option<DateTime<Utc>>,
    history: Vec<ImbalanceSignal>,
}

impl Default for SymbolState {
    fn default() -> Self {
        Self {
            last_signal_at: None,
            history: Vec::new(),
        }
    }
}

pub struct ImbalanceDetector {
    config: ImbalanceConfig,
    state: RwLock<HashMap<String, SymbolState>>,
}

impl ImbalanceDetector {
    pub fn new(config: ImbalanceConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
        }
    }

    pub fn detect(&self, symbol: &str, metrics: &DepthMetrics, now: DateTime<Utc>) -> Option<ImbalanceSignal> {
        let total_depth = metrics.bid_depth_1pct + metrics.ask_depth_1pct;
        if total_depth < self.config.min_depth_usd {
            return None;
        }

        let spread_pct = if metrics.mid_price > Decimal::ZERO {
            ((metrics.best_ask - metrics.best_bid) / metrics.mid_price * Decimal::from(100))
                .to_string()
                .parse::<f64>()
                .unwrap_or(f64::MAX)
        } else {
            f64::MAX
        };
        if spread_pct > self.config.max_spread_pct {
            return None;
        }

        if metrics.imbalance_1pct.abs() < self.config.imbalance_threshold {
            return None;
        }

        let mut guard = self.state.write().expect("imbalance state lock poisoned");
        let entry = guard.entry(symbol.to_string()).or_default();
        if let Some(last) = entry.last_signal_at {
            let elapsed = (now - last).num_seconds();
            if elapsed < self.config.min_signal_interval_seconds as i64 {
                return None;
            }
        }

        let imbalance_score = metrics.imbalance_1pct.abs().clamp(0.0, 1.0);
        let total_depth_f = total_depth.to_string().parse::<f64>().unwrap_or(0.0);
        let min_depth_f = self.config.min_depth_usd.to_string().parse::<f64>().unwrap_or(1.0);
        let depth_score = (total_depth_f / (min_depth_f * 3.0)).clamp(0.0, 1.0);
        let spread_score = (1.0 - spread_pct / self.config.max_spread_pct.max(1e-9)).clamp(0.0, 1.0);

        let score = 100.0
            * (self.config.weight_imbalance * imbalance_score
                + self.config.weight_depth * depth_score
                + self.config.weight_spread * spread_score);

        let strength = if score >= 70.0 {
            SignalStrength::Strong
        } else if score >= 40.0 {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        };

        let mut confidence = (score / 100.0).clamp(0.0, 1.0);
        if depth_score < 0.3 {
            confidence *= 0.7;
        }
        if spread_score < 0.3 {
            confidence *= 0.7;
        }
        let min_levels = metrics.bid_levels.min(metrics.ask_levels);
        if min_levels < 3 {
            confidence *= 0.8;
        }

        let direction = if metrics.imbalance_1pct > 0.0 {
            Direction::Bullish
        } else {
            Direction::Bearish
        };

        let signal = ImbalanceSignal {
            symbol: symbol.to_string(),
            direction,
            score,
            strength,
            confidence: confidence.clamp(0.0, 1.0),
            generated_at: now,
        };

        entry.last_signal_at = Some(now);
        entry.history.push(signal.clone());
        if entry.history.len() > self.config.history_cap {
            let overflow = entry.history.len() - self.config.history_cap;
            entry.history.drain(0..overflow);
        }

        Some(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn metrics(imbalance: f64) -> DepthMetrics {
        DepthMetrics {
            bid_depth_1pct: dec!(15000),
            ask_depth_1pct: dec!(10000),
            imbalance_1pct: imbalance,
            best_bid: dec!(100.0),
            best_ask: dec!(100.1),
            mid_price: dec!(100.05),
            bid_levels: 10,
            ask_levels: 10,
        }
    }

    /// P8 — no two signals for the same symbol within `min_signal_interval`.
    #[test]
    fn p8_rate_limits_signals_per_symbol() {
        let detector = ImbalanceDetector::new(ImbalanceConfig::default());
        let t0 = Utc::now();
        let first = detector.detect("BTC/USDT", &metrics(0.4), t0);
        assert!(first.is_some());
        let second = detector.detect("BTC/USDT", &metrics(0.4), t0 + chrono::Duration::seconds(1));
        assert!(second.is_none());
        let third = detector.detect(
            "BTC/USDT",
            &metrics(0.4),
            t0 + chrono::Duration::seconds(60),
        );
        assert!(third.is_some());
    }

    #[test]
    fn thin_depth_is_suppressed() {
        let detector = ImbalanceDetector::new(ImbalanceConfig::default());
        let mut thin = metrics(0.5);
        thin.bid_depth_1pct = dec!(10);
        thin.ask_depth_1pct = dec!(10);
        assert!(detector.detect("ETH/USDT", &thin, Utc::now()).is_none());
    }

    #[test]
    fn below_threshold_imbalance_produces_no_signal() {
        let detector = ImbalanceDetector::new(ImbalanceConfig::default());
        assert!(detector.detect("ETH/USDT", &metrics(0.01), Utc::now()).is_none());
    }
}

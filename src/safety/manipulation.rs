//! Anti-Manipulation Filter (spec.md §4.6.6).

use crate::config::ManipulationConfig;
use crate::external::exchange::OrderBook;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct DetectorResult {
    pub detected: bool,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ManipulationReport {
    pub wash_trade: DetectorResult,
    pub spoofing: DetectorResult,
    pub layering: DetectorResult,
    pub confidence: f64,
}

pub struct ManipulationFilter {
    config: ManipulationConfig,
}

impl ManipulationFilter {
    pub fn new(config: ManipulationConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, book: &OrderBook, current_volume: Decimal, avg_24h_volume: Decimal) -> ManipulationReport {
        let wash_trade = self.detect_wash_trade(current_volume, avg_24h_volume);
        let spoofing = self.detect_spoofing(book);
        let layering = self.detect_layering(book);

        let scores: Vec<f64> = [wash_trade.score, spoofing.score, layering.score]
            .into_iter()
            .filter(|s| *s > 0.0)
            .collect();
        let confidence = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        ManipulationReport {
            wash_trade,
            spoofing,
            layering,
            confidence,
        }
    }

    /// Wash trade: `current_volume / avg_24h_volume >= threshold`.
    fn detect_wash_trade(&self, current_volume: Decimal, avg_24h_volume: Decimal) -> DetectorResult {
        if avg_24h_volume <= Decimal::ZERO {
            return DetectorResult {
                detected: false,
                score: 0.0,
            };
        }
        let ratio: f64 = (current_volume / avg_24h_volume)
            .to_string()
            .parse()
            .unwrap_or(0.0);
        let detected = ratio >= self.config.wash_trade_volume_ratio;
        let score = (ratio / self.config.wash_trade_volume_ratio).clamp(0.0, 1.0);
        DetectorResult { detected, score }
    }

    /// Spoofing: count of bids+asks with size >= `spoofing_order_size` >=
    /// `spoofing_min_orders`.
    fn detect_spoofing(&self, book: &OrderBook) -> DetectorResult {
        let count = book
            .bids
            .iter()
            .chain(book.asks.iter())
            .filter(|level| level.size >= self.config.spoofing_order_size)
            .count();
        let detected = count >= self.config.spoofing_min_orders;
        let score = (count as f64 / self.config.spoofing_min_orders as f64).clamp(0.0, 1.0);
        DetectorResult { detected, score }
    }

    /// Layering: bucket orders by price across both sides; layering
    /// triggers when the number of buckets with >= `layering_min_levels`
    /// entries reaches `layering_min_levels`.
    fn detect_layering(&self, book: &OrderBook) -> DetectorResult {
        let mut buckets: HashMap<Decimal, usize> = HashMap::new();
        for level in book.bids.iter().chain(book.asks.iter()) {
            *buckets.entry(level.price).or_insert(0) += 1;
        }
        let deep_buckets = buckets
            .values()
            .filter(|&&count| count >= self.config.layering_min_levels)
            .count();
        let detected = deep_buckets >= self.config.layering_min_levels;
        let score = (deep_buckets as f64 / self.config.layering_min_levels as f64).clamp(0.0, 1.0);
        DetectorResult { detected, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::exchange::OrderBookLevel;
    use rust_decimal_macros::dec;

    #[test]
    fn detects_wash_trade_on_volume_spike() {
        let filter = ManipulationFilter::new(ManipulationConfig::default());
        let book = OrderBook {
            bids: vec![],
            asks: vec![],
        };
        let report = filter.analyze(&book, dec!(400000), dec!(100000));
        assert!(report.wash_trade.detected);
        assert!(report.confidence > 0.0);
    }

    #[test]
    fn detects_spoofing_with_many_large_orders() {
        let config = ManipulationConfig {
            spoofing_order_size: dec!(1000),
            spoofing_min_orders: 2,
            ..ManipulationConfig::default()
        };
        let filter = ManipulationFilter::new(config);
        let book = OrderBook {
            bids: vec![
                OrderBookLevel { price: dec!(100), size: dec!(5000) },
                OrderBookLevel { price: dec!(99), size: dec!(6000) },
            ],
            asks: vec![],
        };
        let report = filter.analyze(&book, dec!(0), dec!(0));
        assert!(report.spoofing.detected);
    }

    #[test]
    fn zero_volume_history_is_not_a_false_positive() {
        let filter = ManipulationFilter::new(ManipulationConfig::default());
        let book = OrderBook { bids: vec![], asks: vec![] };
        let report = filter.analyze(&book, dec!(100), dec!(0));
        assert!(!report.wash_trade.detected);
        assert_eq!(report.confidence, 0.0);
    }
}

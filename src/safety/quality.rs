//! Market-Data Quality Filter (spec.md §4.6.5).

use crate::config::QualityFilterConfig;
use crate::models::{QualityFlag, QualityResult};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct Tick {
    price: Decimal,
    volume: Decimal,
    ts: DateTime<Utc>,
}

#[derive(Default)]
struct SymbolHistory {
    ticks: Vec<Tick>,
}

pub struct QualityFilter {
    config: QualityFilterConfig,
    history: RwLock<HashMap<(String, String), SymbolHistory>>,
    reference_prices: RwLock<HashMap<String, (Decimal, DateTime<Utc>)>>,
}

impl QualityFilter {
    pub fn new(config: QualityFilterConfig) -> Self {
        Self {
            config,
            history: RwLock::new(HashMap::new()),
            reference_prices: RwLock::new(HashMap::new()),
        }
    }

    /// Filters one `(symbol, exchange, price, volume, ts)` tick (spec.md
    /// §4.6.5).
    pub fn check_tick(
        &self,
        symbol: &str,
        exchange: &str,
        price: Decimal,
        volume: Decimal,
        ts: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> QualityResult {
        let mut flags = Vec::new();
        let age_seconds = (now - ts).num_milliseconds() as f64 / 1000.0;

        if age_seconds > self.config.stale_threshold_seconds {
            flags.push(QualityFlag::StaleData);
        }

        if exchange == self.config.reference_exchange {
            let mut refs = self.reference_prices.write().expect("reference price lock poisoned");
            refs.insert(symbol.to_string(), (price, ts));
        }

        let key = (symbol.to_string(), exchange.to_string());
        let mut history = self.history.write().expect("quality history lock poisoned");
        let entry = history.entry(key).or_default();

        // The "previous" tick is the closest-in-time prior sample in
        // wall-clock arrival order, not the nearest-below-current price
        // (spec.md Open Question 3; see DESIGN.md).
        let mut price_change = None;
        if let Some(last) = entry.ticks.last() {
            if last.price > Decimal::ZERO {
                let change = ((price - last.price) / last.price).abs().to_f64().unwrap_or(0.0);
                price_change = Some(change);
                if change > self.config.price_move_threshold {
                    flags.push(QualityFlag::PriceOutlier);
                }
            }
        }

        let mut volume_ratio = None;
        if entry.ticks.len() >= self.config.min_volume_samples {
            let mean_volume: Decimal =
                entry.ticks.iter().map(|t| t.volume).sum::<Decimal>() / Decimal::from(entry.ticks.len());
            if mean_volume > Decimal::ZERO {
                let ratio = (volume / mean_volume).to_f64().unwrap_or(0.0);
                volume_ratio = Some(ratio);
                if ratio > self.config.volume_threshold {
                    flags.push(QualityFlag::VolumeAnomaly);
                }
            }
        }

        entry.ticks.push(Tick { price, volume, ts });
        if entry.ticks.len() > self.config.history_cap {
            let overflow = entry.ticks.len() - self.config.history_cap;
            entry.ticks.drain(0..overflow);
        }
        drop(history);

        if exchange != self.config.reference_exchange {
            let refs = self.reference_prices.read().expect("reference price lock poisoned");
            if let Some((ref_price, _)) = refs.get(symbol) {
                if *ref_price > Decimal::ZERO {
                    let diff = ((price - *ref_price) / *ref_price).abs().to_f64().unwrap_or(0.0);
                    if diff > self.config.cross_threshold {
                        flags.push(QualityFlag::CrossExchangeDiff);
                    }
                }
            }
        }

        if flags.is_empty() {
            flags.push(QualityFlag::Ok);
        }

        QualityResult {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            flags,
            price_change,
            volume_ratio,
            age_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// S6 — Quality filter flags outlier (spec.md §8).
    #[test]
    fn s6_quality_filter_flags_outlier() {
        let config = QualityFilterConfig {
            price_move_threshold: 0.5,
            ..QualityFilterConfig::default()
        };
        let filter = QualityFilter::new(config);
        let t0 = Utc::now();

        filter.check_tick("BTC", "binance", dec!(50000), dec!(10), t0, t0);
        let result = filter.check_tick(
            "BTC",
            "binance",
            dec!(80000),
            dec!(10),
            t0 + chrono::Duration::seconds(30),
            t0 + chrono::Duration::seconds(30),
        );

        assert!(result.flags.contains(&QualityFlag::PriceOutlier));
    }

    #[test]
    fn stale_tick_is_flagged() {
        let filter = QualityFilter::new(QualityFilterConfig::default());
        let t0 = Utc::now();
        let result = filter.check_tick(
            "BTC",
            "binance",
            dec!(50000),
            dec!(10),
            t0,
            t0 + chrono::Duration::seconds(120),
        );
        assert!(result.flags.contains(&QualityFlag::StaleData));
    }

    #[test]
    fn history_is_capped() {
        let config = QualityFilterConfig {
            history_cap: 3,
            ..QualityFilterConfig::default()
        };
        let filter = QualityFilter::new(config);
        let t0 = Utc::now();
        for i in 0..10 {
            filter.check_tick(
                "BTC",
                "binance",
                dec!(50000),
                dec!(10),
                t0 + chrono::Duration::seconds(i),
                t0 + chrono::Duration::seconds(i),
            );
        }
        let history = filter.history.read().unwrap();
        let entry = history.get(&("BTC".to_string(), "binance".to_string())).unwrap();
        assert_eq!(entry.ticks.len(), 3);
    }
}

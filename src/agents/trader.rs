//! Trader Agent (spec.md §4.3): market + portfolio -> concrete action with
//! size/entry/stop/target.

use crate::config::{TraderConfig, TraderMode};
use crate::models::{Direction, MarketContext, PortfolioState, Side, TradeAction, TradingDecision};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::instrument;

pub struct TraderAgent {
    config: TraderConfig,
}

impl TraderAgent {
    pub fn new(config: TraderConfig) -> Self {
        Self { config }
    }

    fn sizing_multiplier(&self) -> f64 {
        match self.config.mode {
            TraderMode::Conservative => 0.25,
            TraderMode::Moderate => 0.5,
            TraderMode::Aggressive => 1.0,
        }
    }

    /// `MakeDecision(market, portfolio) -> TradingDecision` (spec.md §4.3).
    #[instrument(skip(self, market, portfolio), fields(symbol = %market.symbol))]
    pub fn make_decision(&self, market: &MarketContext, portfolio: &PortfolioState) -> TradingDecision {
        if portfolio.open_positions >= self.config.max_open_positions {
            return self.hold_decision(market, "max open positions reached");
        }

        let total_weight: f64 = market.signals.iter().map(|s| s.weight).sum();
        let weighted_score = if total_weight > 0.0 {
            market
                .signals
                .iter()
                .map(|s| {
                    let signed = match s.direction {
                        Direction::Bullish => s.value,
                        Direction::Bearish => -s.value,
                        Direction::Neutral => 0.0,
                    };
                    signed * s.weight
                })
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };

        let (action, side) = if weighted_score > 0.15 {
            (TradeAction::OpenLong, Some(Side::Long))
        } else if weighted_score < -0.15 {
            (TradeAction::OpenShort, Some(Side::Short))
        } else {
            (TradeAction::Hold, None)
        };

        if action == TradeAction::Hold {
            return self.hold_decision(market, "no directional edge in current signals");
        }

        let confidence = weighted_score.abs().clamp(0.0, 1.0);
        let size_percent = (confidence * self.sizing_multiplier()).clamp(0.0, 1.0);

        let entry_price = market.current_price;
        let (stop_loss, take_profit) = self.stops(entry_price, side.expect("side set for directional action"));

        TradingDecision {
            symbol: market.symbol.clone(),
            action,
            side,
            confidence,
            size_percent,
            entry_price,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            reasoning: format!(
                "weighted_score={weighted_score:.3} mode={:?} open_positions={}",
                self.config.mode, portfolio.open_positions
            ),
            risk_score: market.volatility,
        }
    }

    fn stops(&self, entry: Decimal, side: Side) -> (Decimal, Decimal) {
        let sl_pct = Decimal::from_f64_retain(self.config.stop_loss_pct).unwrap_or_default();
        let tp_pct = Decimal::from_f64_retain(self.config.take_profit_pct).unwrap_or_default();
        match side {
            Side::Long => (entry * (Decimal::ONE - sl_pct), entry * (Decimal::ONE + tp_pct)),
            Side::Short => (entry * (Decimal::ONE + sl_pct), entry * (Decimal::ONE - tp_pct)),
        }
    }

    fn hold_decision(&self, market: &MarketContext, reason: &str) -> TradingDecision {
        TradingDecision {
            symbol: market.symbol.clone(),
            action: TradeAction::Hold,
            side: None,
            confidence: 0.0,
            size_percent: 0.0,
            entry_price: market.current_price,
            stop_loss: None,
            take_profit: None,
            reasoning: reason.to_string(),
            risk_score: market.volatility,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Signal, Trend};
    use rust_decimal_macros::dec;

    fn market(signals: Vec<Signal>) -> MarketContext {
        MarketContext {
            symbol: "BTC/USDT".to_string(),
            current_price: dec!(50000),
            volatility: 0.2,
            liquidity: 0.8,
            volume_24h: dec!(1000000),
            funding_rate: 0.0001,
            trend: Trend::Up,
            signals,
        }
    }

    fn portfolio(open_positions: u32) -> PortfolioState {
        PortfolioState {
            total_value: dec!(100000),
            available_cash: dec!(50000),
            open_positions,
            current_drawdown: 0.0,
            unrealized_pnl: dec!(0),
        }
    }

    #[test]
    fn opens_long_on_bullish_signals() {
        let trader = TraderAgent::new(TraderConfig::default());
        let signals = vec![Signal {
            name: "momentum".to_string(),
            value: 0.9,
            weight: 1.0,
            direction: Direction::Bullish,
            description: String::new(),
        }];
        let decision = trader.make_decision(&market(signals), &portfolio(0));
        assert_eq!(decision.action, TradeAction::OpenLong);
        assert_eq!(decision.side, Some(Side::Long));
        assert!(decision.stop_loss.unwrap() < decision.entry_price);
        assert!(decision.take_profit.unwrap() > decision.entry_price);
    }

    #[test]
    fn max_open_positions_forces_hold() {
        let trader = TraderAgent::new(TraderConfig::default());
        let signals = vec![Signal {
            name: "momentum".to_string(),
            value: 0.9,
            weight: 1.0,
            direction: Direction::Bullish,
            description: String::new(),
        }];
        let decision = trader.make_decision(&market(signals), &portfolio(5));
        assert_eq!(decision.action, TradeAction::Hold);
    }

    #[test]
    fn neutral_signals_hold() {
        let trader = TraderAgent::new(TraderConfig::default());
        let decision = trader.make_decision(&market(vec![]), &portfolio(0));
        assert_eq!(decision.action, TradeAction::Hold);
    }
}

//! Order executor and CCXT-like exchange adapter (spec.md §6).

use crate::error::TradingResult;
use crate::models::{Side, TradingDecision};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Ohlcv {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

/// `ExecuteOrder(decision) -> error` (spec.md §6).
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute_order(&self, decision: &TradingDecision) -> TradingResult<String>;
}

/// The CCXT-like exchange adapter. All returns are decimal-typed.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn get_ohlcv(&self, symbol: &str, limit: usize) -> TradingResult<Vec<Ohlcv>>;
    async fn get_order_book(&self, symbol: &str, depth: usize) -> TradingResult<OrderBook>;
    async fn get_balances(&self) -> TradingResult<HashMap<String, Decimal>>;
    async fn get_funding_rate(&self, symbol: &str) -> TradingResult<f64>;
}

#[derive(Debug, Clone)]
pub struct MockOrderExecutor {
    pub exchange_name: String,
    pub dry_run: bool,
}

impl MockOrderExecutor {
    pub fn new(exchange_name: impl Into<String>, dry_run: bool) -> Self {
        Self {
            exchange_name: exchange_name.into(),
            dry_run,
        }
    }
}

#[async_trait]
impl OrderExecutor for MockOrderExecutor {
    async fn execute_order(&self, decision: &TradingDecision) -> TradingResult<String> {
        if self.dry_run {
            info!(
                symbol = %decision.symbol,
                action = ?decision.action,
                size_percent = decision.size_percent,
                exchange = %self.exchange_name,
                "dry run: would execute order"
            );
            Ok(format!("dry_run_{}", decision.symbol))
        } else {
            info!(
                symbol = %decision.symbol,
                action = ?decision.action,
                exchange = %self.exchange_name,
                "mock: executing order"
            );
            Ok(format!("mock_{}", decision.symbol))
        }
    }
}

/// In-memory exchange adapter for tests and dry-run deployments.
#[derive(Debug, Clone, Default)]
pub struct MockExchangeAdapter {
    pub balances: HashMap<String, Decimal>,
    pub funding_rate: f64,
}

#[async_trait]
impl ExchangeAdapter for MockExchangeAdapter {
    async fn get_ohlcv(&self, _symbol: &str, _limit: usize) -> TradingResult<Vec<Ohlcv>> {
        Ok(Vec::new())
    }

    async fn get_order_book(&self, _symbol: &str, _depth: usize) -> TradingResult<OrderBook> {
        Ok(OrderBook {
            bids: Vec::new(),
            asks: Vec::new(),
        })
    }

    async fn get_balances(&self) -> TradingResult<HashMap<String, Decimal>> {
        Ok(self.balances.clone())
    }

    async fn get_funding_rate(&self, _symbol: &str) -> TradingResult<f64> {
        Ok(self.funding_rate)
    }
}

pub fn side_str(side: Side) -> &'static str {
    match side {
        Side::Long => "long",
        Side::Short => "short",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeAction;
    use rust_decimal_macros::dec;

    fn decision() -> TradingDecision {
        TradingDecision {
            symbol: "BTC/USDT".to_string(),
            action: TradeAction::OpenLong,
            side: Some(Side::Long),
            confidence: 0.8,
            size_percent: 0.1,
            entry_price: dec!(50000),
            stop_loss: None,
            take_profit: None,
            reasoning: "test".to_string(),
            risk_score: 0.2,
        }
    }

    #[tokio::test]
    async fn dry_run_order_executor_never_hits_the_network() {
        let executor = MockOrderExecutor::new("test-exchange", true);
        let id = executor.execute_order(&decision()).await.unwrap();
        assert!(id.starts_with("dry_run_"));
    }
}

//! Portfolio Safety (spec.md §4.6.2).

use crate::config::PortfolioSafetyConfig;
use crate::error::TradingResult;
use crate::external::ExchangeAdapter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub total_equity: Decimal,
    pub available_funds: Decimal,
    pub exposure_pct: f64,
    pub open_positions: u32,
}

#[derive(Debug, Clone)]
pub struct SafetyCheck {
    pub is_safe: bool,
    pub trading_allowed: bool,
    pub max_position_size: Decimal,
    pub warnings: Vec<String>,
}

struct CachedSnapshot {
    snapshot: PortfolioSnapshot,
    fetched_at: Instant,
}

pub struct PortfolioSafety {
    config: PortfolioSafetyConfig,
    adapter: Arc<dyn ExchangeAdapter>,
    cache: RwLock<Option<CachedSnapshot>>,
}

impl PortfolioSafety {
    pub fn new(config: PortfolioSafetyConfig, adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            config,
            adapter,
            cache: RwLock::new(None),
        }
    }

    /// `GetPortfolioSnapshot -> {total_equity, available_funds,
    /// exposure_pct, open_positions}`, cached with a TTL (spec.md §4.6.2).
    pub async fn get_portfolio_snapshot(&self, open_positions: u32) -> TradingResult<PortfolioSnapshot> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < Duration::from_secs(self.config.snapshot_ttl_seconds) {
                    return Ok(cached.snapshot.clone());
                }
            }
        }

        let balances = self.adapter.get_balances().await?;
        let total_equity: Decimal = balances.values().copied().sum();
        let available_funds = balances.get("USDT").copied().unwrap_or(total_equity);
        let used = (total_equity - available_funds).max(Decimal::ZERO);
        let exposure_pct = if total_equity > Decimal::ZERO {
            (used / total_equity).to_string().parse::<f64>().unwrap_or(0.0)
        } else {
            0.0
        };

        let snapshot = PortfolioSnapshot {
            total_equity,
            available_funds,
            exposure_pct,
            open_positions,
        };

        let mut cache = self.cache.write().await;
        *cache = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            fetched_at: Instant::now(),
        });

        Ok(snapshot)
    }

    /// `CheckSafety -> {is_safe, trading_allowed, max_position_size,
    /// warnings[]}` (spec.md §4.6.2).
    pub fn check_safety(&self, snapshot: &PortfolioSnapshot, proposed: Decimal) -> SafetyCheck {
        let mut warnings = Vec::new();
        let mut is_safe = true;

        if snapshot.exposure_pct > self.config.max_exposure_pct {
            warnings.push(format!(
                "exposure {:.1}% exceeds max {:.1}%",
                snapshot.exposure_pct * 100.0,
                self.config.max_exposure_pct * 100.0
            ));
            is_safe = false;
        }

        let trading_allowed = snapshot.available_funds >= proposed;
        if !trading_allowed {
            warnings.push(format!(
                "available funds {} below proposed {proposed}",
                snapshot.available_funds
            ));
        }

        SafetyCheck {
            is_safe,
            trading_allowed,
            max_position_size: snapshot.available_funds,
            warnings,
        }
    }

    /// `CanExecuteTrade(amount) -> bool` convenience wrapper (spec.md
    /// §4.6.2).
    pub async fn can_execute_trade(&self, amount: Decimal, open_positions: u32) -> TradingResult<bool> {
        let snapshot = self.get_portfolio_snapshot(open_positions).await?;
        let check = self.check_safety(&snapshot, amount);
        Ok(check.is_safe && check.trading_allowed)
    }
}

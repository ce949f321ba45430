//! Max-Drawdown Halt (spec.md §4.6.1).

use crate::config::DrawdownConfig;
use crate::external::notification::NotificationTransport;
use crate::models::{DrawdownState, DrawdownStatus};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::time::Duration;
use tracing::{error, info, warn};

pub struct DrawdownHalt {
    config: DrawdownConfig,
    state: RwLock<HashMap<String, DrawdownState>>,
    notifier: Option<Arc<dyn NotificationTransport>>,
}

impl DrawdownHalt {
    pub fn new(config: DrawdownConfig, notifier: Option<Arc<dyn NotificationTransport>>) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            notifier,
        }
    }

    /// `CheckDrawdown(chatID, current_value) -> DrawdownState` (spec.md
    /// §4.6.1).
    pub fn check_drawdown(&self, account: &str, current_value: Decimal) -> DrawdownState {
        let mut guard = self.state.write().expect("drawdown state lock poisoned");
        let entry = guard.entry(account.to_string()).or_default();

        entry.peak_value = entry.peak_value.max(current_value);
        entry.current_value = current_value;
        entry.current_drawdown = if entry.peak_value > Decimal::ZERO {
            ((entry.peak_value - current_value) / entry.peak_value)
                .max(Decimal::ZERO)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        entry.max_drawdown_seen = entry.max_drawdown_seen.max(entry.current_drawdown);

        let was_halted = entry.trading_halted;
        let mut emit_halt_event = false;
        let mut emit_recovery_event = false;

        if entry.current_drawdown >= self.config.halt_threshold {
            entry.status = DrawdownStatus::Halted;
            if !was_halted {
                entry.trading_halted = true;
                entry.halted_at = Some(chrono::Utc::now());
                emit_halt_event = true;
            }
        } else if entry.current_drawdown >= self.config.critical_threshold {
            entry.status = DrawdownStatus::Critical;
        } else if entry.current_drawdown >= self.config.warning_threshold {
            entry.status = DrawdownStatus::Warning;
            entry.warning_count += 1;
        } else if was_halted
            && entry.current_drawdown <= self.config.recovery_threshold
            && self.config.auto_resume
        {
            entry.trading_halted = false;
            entry.status = DrawdownStatus::Normal;
            entry.recovered_at = Some(chrono::Utc::now());
            emit_recovery_event = true;
        } else if !was_halted {
            entry.status = DrawdownStatus::Normal;
        }

        if emit_halt_event {
            entry.halt_count += 1;
        }

        let snapshot = entry.clone();
        drop(guard);

        if emit_halt_event {
            error!(account, drawdown = snapshot.current_drawdown, "trading halted: drawdown threshold breached");
            self.dispatch_notification(account, "trading halted: drawdown threshold breached");
        }
        if emit_recovery_event {
            info!(account, "trading resumed: drawdown recovered below threshold");
            self.dispatch_notification(account, "trading resumed: drawdown recovered");
        }
        if !emit_halt_event && !emit_recovery_event && snapshot.status == DrawdownStatus::Warning {
            warn!(account, drawdown = snapshot.current_drawdown, "drawdown warning threshold crossed");
        }

        snapshot
    }

    /// `IsTradingHalted(chatID) -> bool` (spec.md §4.6.1): the authoritative
    /// gate consulted by the Execution Loop before order execution.
    pub fn is_trading_halted(&self, account: &str) -> bool {
        self.state
            .read()
            .expect("drawdown state lock poisoned")
            .get(account)
            .map(|s| s.trading_halted)
            .unwrap_or(false)
    }

    pub fn reset(&self, account: &str) {
        self.state.write().expect("drawdown state lock poisoned").remove(account);
    }

    /// Fire-and-forget dispatch with its own timeout; must not block state
    /// mutation (spec.md §4.6.1, §9 locking discipline).
    fn dispatch_notification(&self, account: &str, message: &str) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let account = account.to_string();
        let message = message.to_string();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                Duration::from_secs(5),
                notifier.send_message(&account, &message),
            )
            .await;
            if let Err(_) | Ok(Err(_)) = outcome {
                warn!(account = %account, "drawdown notification dispatch failed or timed out");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// S2 — Drawdown triggers halt (spec.md §8).
    #[test]
    fn s2_drawdown_triggers_halt() {
        let config = DrawdownConfig {
            warning_threshold: 0.05,
            critical_threshold: 0.10,
            halt_threshold: 0.15,
            recovery_threshold: 0.03,
            auto_resume: true,
        };
        let halt = DrawdownHalt::new(config, None);
        halt.check_drawdown("A", dec!(100));
        let state = halt.check_drawdown("A", dec!(80));

        assert_eq!(state.peak_value, dec!(100));
        assert!((state.current_drawdown - 0.20).abs() < 1e-9);
        assert_eq!(state.status, DrawdownStatus::Halted);
        assert!(state.trading_halted);
        assert!(halt.is_trading_halted("A"));
    }

    /// P2 — peak_value is monotone non-decreasing between resets.
    #[test]
    fn p2_peak_value_is_monotone() {
        let halt = DrawdownHalt::new(DrawdownConfig::default(), None);
        halt.check_drawdown("A", dec!(100));
        halt.check_drawdown("A", dec!(90));
        let state = halt.check_drawdown("A", dec!(110));
        assert_eq!(state.peak_value, dec!(110));
        let state = halt.check_drawdown("A", dec!(50));
        assert_eq!(state.peak_value, dec!(110));
    }

    #[test]
    fn recovers_when_auto_resume_enabled() {
        let config = DrawdownConfig {
            warning_threshold: 0.05,
            critical_threshold: 0.10,
            halt_threshold: 0.15,
            recovery_threshold: 0.03,
            auto_resume: true,
        };
        let halt = DrawdownHalt::new(config, None);
        halt.check_drawdown("A", dec!(100));
        halt.check_drawdown("A", dec!(80));
        assert!(halt.is_trading_halted("A"));
        let state = halt.check_drawdown("A", dec!(99));
        assert!(!state.trading_halted);
        assert_eq!(state.status, DrawdownStatus::Normal);
    }

    /// halt_count increments on every distinct halt transition, not just the
    /// first time an account ever halts.
    #[test]
    fn halt_count_increments_across_halt_recover_rehalt() {
        let config = DrawdownConfig {
            warning_threshold: 0.05,
            critical_threshold: 0.10,
            halt_threshold: 0.15,
            recovery_threshold: 0.03,
            auto_resume: true,
        };
        let halt = DrawdownHalt::new(config, None);

        halt.check_drawdown("A", dec!(100));
        let state = halt.check_drawdown("A", dec!(80));
        assert!(state.trading_halted);
        assert_eq!(state.halt_count, 1);

        let state = halt.check_drawdown("A", dec!(99));
        assert!(!state.trading_halted);
        assert_eq!(state.halt_count, 1);

        // Drive a fresh peak so a second drop re-crosses the halt threshold.
        halt.check_drawdown("A", dec!(100));
        let state = halt.check_drawdown("A", dec!(80));
        assert!(state.trading_halted);
        assert_eq!(state.halt_count, 2);
    }
}

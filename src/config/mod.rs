use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level application configuration, assembled from a config file layered
/// under environment variables (prefix `AGENTCORE_`), the way the teacher's
/// own `Config::load` builds its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppMeta,
    pub logging: LoggingConfig,
    pub analyst: AnalystConfig,
    pub risk_manager: RiskManagerConfig,
    pub trader: TraderConfig,
    pub execution_loop: ExecutionLoopConfig,
    pub debate: DebateConfig,
    pub drawdown: DrawdownConfig,
    pub portfolio_safety: PortfolioSafetyConfig,
    pub wallet_validator: WalletValidatorConfig,
    pub api_key_validator: ApiKeyValidatorConfig,
    pub quality_filter: QualityFilterConfig,
    pub manipulation: ManipulationConfig,
    pub imbalance: ImbalanceConfig,
    pub worker_pool: WorkerPoolConfig,
    pub spawner: SpawnerConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMeta {
    pub name: String,
    pub version: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Config for the Analyst Agent (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    pub signal_threshold: f64,
    pub min_confidence: f64,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            signal_threshold: 0.2,
            min_confidence: 0.4,
        }
    }
}

/// Config for the Risk Manager Agent (spec.md §4.2). Thresholds are
/// monotonically increasing and checked in this order, resolving Open
/// Question 2 (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskManagerConfig {
    pub warn_threshold: f64,
    pub reduce_threshold: f64,
    pub block_threshold: f64,
    pub emergency_threshold: f64,
    pub base_max_position_size: Decimal,
}

impl Default for RiskManagerConfig {
    fn default() -> Self {
        Self {
            warn_threshold: 0.3,
            reduce_threshold: 0.5,
            block_threshold: 0.7,
            emergency_threshold: 0.9,
            base_max_position_size: dec!(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraderMode {
    Conservative,
    Moderate,
    Aggressive,
}

/// Config for the Trader Agent (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    pub mode: TraderMode,
    pub max_open_positions: u32,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            mode: TraderMode::Moderate,
            max_open_positions: 5,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.15,
        }
    }
}

/// Config for the Execution Loop (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLoopConfig {
    pub require_risk_approval: bool,
    pub min_confidence: f64,
    pub auto_execute: bool,
    pub llm_tool_calling_enabled: bool,
    pub max_iterations: u32,
    pub cycle_timeout_seconds: u64,
}

impl Default for ExecutionLoopConfig {
    fn default() -> Self {
        Self {
            require_risk_approval: true,
            min_confidence: 0.6,
            auto_execute: false,
            llm_tool_calling_enabled: false,
            max_iterations: 5,
            cycle_timeout_seconds: 60,
        }
    }
}

/// Config for the Debate Loop / Coordinator (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub max_rounds: u32,
    pub debate_timeout_seconds: u64,
    pub analyst_weight: f64,
    pub risk_weight: f64,
    pub trader_weight: f64,
    pub min_consensus_confidence: f64,
    pub rebuttal_enabled: bool,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            debate_timeout_seconds: 30,
            analyst_weight: 0.34,
            risk_weight: 0.33,
            trader_weight: 0.33,
            min_consensus_confidence: 0.6,
            rebuttal_enabled: true,
        }
    }
}

/// Config for the Max-Drawdown Halt (spec.md §4.6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownConfig {
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub halt_threshold: f64,
    pub recovery_threshold: f64,
    pub auto_resume: bool,
}

impl Default for DrawdownConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 0.05,
            critical_threshold: 0.10,
            halt_threshold: 0.15,
            recovery_threshold: 0.03,
            auto_resume: true,
        }
    }
}

/// Config for Portfolio Safety (spec.md §4.6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSafetyConfig {
    pub max_exposure_pct: f64,
    pub snapshot_ttl_seconds: u64,
}

impl Default for PortfolioSafetyConfig {
    fn default() -> Self {
        Self {
            max_exposure_pct: 0.75,
            snapshot_ttl_seconds: 10,
        }
    }
}

/// Config for the Wallet Validator (spec.md §4.6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletValidatorConfig {
    pub min_exchange_connections: u32,
    pub min_stable_balance: Decimal,
    pub min_portfolio_value: Decimal,
}

impl Default for WalletValidatorConfig {
    fn default() -> Self {
        Self {
            min_exchange_connections: 1,
            min_stable_balance: dec!(100),
            min_portfolio_value: dec!(500),
        }
    }
}

/// Config for the API-Key Permission Validator (spec.md §4.6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyValidatorConfig {
    pub denied_permissions: Vec<String>,
}

impl Default for ApiKeyValidatorConfig {
    fn default() -> Self {
        Self {
            denied_permissions: vec!["withdraw".to_string()],
        }
    }
}

/// Config for the Market-Data Quality Filter (spec.md §4.6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityFilterConfig {
    pub stale_threshold_seconds: f64,
    pub price_move_threshold: f64,
    pub min_volume_samples: usize,
    pub volume_threshold: f64,
    pub cross_threshold: f64,
    pub reference_exchange: String,
    pub history_cap: usize,
}

impl Default for QualityFilterConfig {
    fn default() -> Self {
        Self {
            stale_threshold_seconds: 60.0,
            price_move_threshold: 0.10,
            min_volume_samples: 5,
            volume_threshold: 5.0,
            cross_threshold: 0.02,
            reference_exchange: "binance".to_string(),
            history_cap: 1000,
        }
    }
}

/// Config for the Anti-Manipulation Filter (spec.md §4.6.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipulationConfig {
    pub wash_trade_volume_ratio: f64,
    pub spoofing_order_size: Decimal,
    pub spoofing_min_orders: usize,
    pub layering_min_levels: usize,
}

impl Default for ManipulationConfig {
    fn default() -> Self {
        Self {
            wash_trade_volume_ratio: 3.0,
            spoofing_order_size: dec!(10000),
            spoofing_min_orders: 5,
            layering_min_levels: 3,
        }
    }
}

/// Config for the Order-Book Imbalance Detector (spec.md §4.6.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImbalanceConfig {
    pub min_depth_usd: Decimal,
    pub max_spread_pct: f64,
    pub imbalance_threshold: f64,
    pub weight_imbalance: f64,
    pub weight_depth: f64,
    pub weight_spread: f64,
    pub min_signal_interval_seconds: u64,
    pub history_cap: usize,
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        Self {
            min_depth_usd: dec!(20000),
            max_spread_pct: 0.5,
            imbalance_threshold: 0.2,
            weight_imbalance: 0.5,
            weight_depth: 0.3,
            weight_spread: 0.2,
            min_signal_interval_seconds: 30,
            history_cap: 100,
        }
    }
}

/// Config for the Worker Pool (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub drop_on_full: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            drop_on_full: false,
        }
    }
}

/// Config for the Subagent Spawner (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerConfig {
    pub max_concurrency: usize,
    pub per_call_timeout_seconds: u64,
    pub result_channel_capacity: usize,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            per_call_timeout_seconds: 15,
            result_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://agent_trading_core.db".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppMeta {
                name: "agent-trading-core".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                dry_run: true,
            },
            logging: LoggingConfig::default(),
            analyst: AnalystConfig::default(),
            risk_manager: RiskManagerConfig::default(),
            trader: TraderConfig::default(),
            execution_loop: ExecutionLoopConfig::default(),
            debate: DebateConfig::default(),
            drawdown: DrawdownConfig::default(),
            portfolio_safety: PortfolioSafetyConfig::default(),
            wallet_validator: WalletValidatorConfig::default(),
            api_key_validator: ApiKeyValidatorConfig::default(),
            quality_filter: QualityFilterConfig::default(),
            manipulation: ManipulationConfig::default(),
            imbalance: ImbalanceConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
            spawner: SpawnerConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = ConfigBuilder::builder()
            .add_source(
                serde_path_to_error_source(&AppConfig::default())
            )
            .add_source(File::with_name(config_path.as_ref().to_str().unwrap()).required(false))
            .add_source(Environment::with_prefix("AGENTCORE").separator("__"));

        if let Ok(env) = std::env::var("APP_ENV") {
            let env_config_path = format!("config.{}.toml", env);
            builder = builder.add_source(File::with_name(&env_config_path).required(false));
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.debate.max_rounds == 0 {
            return Err("debate.max_rounds must be > 0".to_string());
        }
        let weight_sum =
            self.debate.analyst_weight + self.debate.risk_weight + self.debate.trader_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(format!(
                "debate agent weights must sum to 1.0, got {weight_sum}"
            ));
        }
        if self.risk_manager.warn_threshold >= self.risk_manager.reduce_threshold
            || self.risk_manager.reduce_threshold >= self.risk_manager.block_threshold
            || self.risk_manager.block_threshold >= self.risk_manager.emergency_threshold
        {
            return Err("risk_manager thresholds must be strictly increasing".to_string());
        }
        if self.execution_loop.min_confidence < 0.0 || self.execution_loop.min_confidence > 1.0 {
            return Err("execution_loop.min_confidence must be in [0,1]".to_string());
        }
        Ok(())
    }
}

/// `config::Config` has no "seed from a struct" source built in; we bridge it
/// by round-tripping the default through JSON, matching the value-merge
/// idiom `config-rs` itself recommends for programmatic defaults.
fn serde_path_to_error_source(default: &AppConfig) -> config::File<config::FileSourceString, config::FileFormat> {
    let json = serde_json::to_string(default).expect("AppConfig default must serialize");
    config::File::from_str(&json, config::FileFormat::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_rounds() {
        let mut config = AppConfig::default();
        config.debate.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_monotonic_risk_thresholds() {
        let mut config = AppConfig::default();
        config.risk_manager.warn_threshold = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unnormalized_debate_weights() {
        let mut config = AppConfig::default();
        config.debate.analyst_weight = 0.9;
        assert!(config.validate().is_err());
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};

use agent_trading_core::agents::{AnalystAgent, RiskManagerAgent, TraderAgent};
use agent_trading_core::config::AppConfig;
use agent_trading_core::debate::DebateCoordinator;
use agent_trading_core::events::{ActionStreamer, EventBus};
use agent_trading_core::execution::ExecutionLoop;
use agent_trading_core::external::{MockExchangeAdapter, MockLlmClient, MockOrderExecutor, MockStore, MockToolExecutor};
use agent_trading_core::models::{MarketContext, PortfolioState, Trend};
use agent_trading_core::safety::DrawdownHalt;
use agent_trading_core::session::SessionRepository;
use agent_trading_core::utils::logging;
use agent_trading_core::workers::WorkerPool;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level / EnvFilter directive.
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Symbol to run a single demo cycle against.
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,

    /// Run one execution cycle and exit instead of looping.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_logging(&args.log_level).context("failed to initialize logging")?;
    info!(name = agent_trading_core::NAME, version = agent_trading_core::VERSION, "starting up");

    let config = AppConfig::load_from_path(&args.config).unwrap_or_else(|e| {
        warn!(%e, path = %args.config, "failed to load config file, falling back to defaults");
        AppConfig::default()
    });
    config.validate().map_err(|e| anyhow::anyhow!("configuration failed validation: {e}"))?;

    let event_bus = Arc::new(EventBus::new());
    let action_streamer = Arc::new(ActionStreamer::new(1000, 256, None));

    let analyst = Arc::new(AnalystAgent::new(config.analyst.clone()));
    let risk_manager = Arc::new(RiskManagerAgent::new(config.risk_manager.clone()));
    let trader = Arc::new(TraderAgent::new(config.trader.clone()));
    let drawdown_halt = Arc::new(DrawdownHalt::new(config.drawdown.clone(), None));

    let order_executor = Arc::new(MockOrderExecutor::new("paper", config.app.dry_run));
    let exchange_adapter: Arc<MockExchangeAdapter> = Arc::new(MockExchangeAdapter::default());
    let _ = exchange_adapter; // wired to portfolio safety / quality filters in a full deployment

    let execution_loop = ExecutionLoop::new(
        config.execution_loop.clone(),
        analyst.clone(),
        risk_manager.clone(),
        trader.clone(),
        Some(Arc::new(MockLlmClient::default())),
        Some(Arc::new(MockToolExecutor)),
        Some(order_executor.clone()),
        drawdown_halt.clone(),
    );

    let debate_coordinator = DebateCoordinator::new(config.debate.clone(), analyst, risk_manager, trader);

    let store = Arc::new(MockStore::default());
    let _session_repository = SessionRepository::new(store);

    let worker_pool = WorkerPool::start(
        config.worker_pool.workers,
        config.worker_pool.queue_capacity,
        config.worker_pool.drop_on_full,
    );

    let metrics = agent_trading_core::utils::metrics::CoreMetrics::new().context("failed to initialize metrics registry")?;

    let market = MarketContext {
        symbol: args.symbol.clone(),
        current_price: dec!(50000),
        volatility: 0.2,
        liquidity: 0.8,
        volume_24h: dec!(1_000_000),
        funding_rate: 0.0,
        trend: Trend::Up,
        signals: vec![],
    };
    let portfolio = PortfolioState {
        total_value: dec!(100_000),
        available_cash: dec!(50_000),
        open_positions: 0,
        current_drawdown: 0.0,
        unrealized_pnl: dec!(0),
    };

    loop {
        let result = execution_loop.execute("default-account", &market, &portfolio).await;
        metrics.executions_total.inc();
        metrics
            .execution_decisions
            .with_label_values(&[&format!("{:?}", result.decision).to_lowercase()])
            .inc();
        info!(?result.decision, errors = result.errors.len(), "execution cycle complete");

        if !matches!(result.decision, agent_trading_core::execution::ExecutionDecision::Approve) {
            let debate_result = debate_coordinator.run_debate(&market, &portfolio).await;
            metrics.debates_total.inc();
            info!(rounds = debate_result.rounds.len(), ?debate_result.final_decision, "debate cycle complete");
        }

        action_streamer
            .publish(
                agent_trading_core::events::streamer::ActionType::AiReasoning,
                agent_trading_core::events::streamer::ActionPriority::Normal,
                serde_json::json!({ "symbol": market.symbol }),
            )
            .await;

        if args.once {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(config.execution_loop.cycle_timeout_seconds)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
        }
    }

    event_bus.close().await;
    worker_pool.stop().await;
    info!("shutdown complete");
    Ok(())
}

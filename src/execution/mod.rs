//! Execution Loop (spec.md §4.4): single-pass gating, with an optional
//! bounded LLM tool-calling dialogue.

use crate::agents::{AnalystAgent, RiskManagerAgent, TraderAgent};
use crate::config::ExecutionLoopConfig;
use crate::external::llm::{ChatMessage, CompletionRequest, LlmClient, ToolDeclaration, ToolExecutor};
use crate::external::exchange::OrderExecutor;
use crate::models::{
    AnalystRole, Direction, MarketContext, PortfolioState, RiskAction, RiskSignal, Side, Signal, TradeAction,
    TradingDecision, ToolCallRecord,
};
use crate::safety::DrawdownHalt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionDecision {
    Approve,
    Reject,
    Modify,
    Defer,
    Emergency,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    pub llm_iterations: u32,
    pub emergency_triggers: u64,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub decision: ExecutionDecision,
    pub trading_decision: Option<TradingDecision>,
    pub risk_assessment: Option<crate::models::RiskAssessment>,
    pub tool_call_transcript: Vec<ToolCallRecord>,
    pub metrics: ExecutionMetrics,
    pub errors: Vec<String>,
}

impl ExecutionResult {
    fn defer(reason: String) -> Self {
        Self {
            decision: ExecutionDecision::Defer,
            trading_decision: None,
            risk_assessment: None,
            tool_call_transcript: vec![],
            metrics: ExecutionMetrics::default(),
            errors: vec![reason],
        }
    }
}

pub struct ExecutionLoop {
    config: ExecutionLoopConfig,
    analyst: Arc<AnalystAgent>,
    risk_manager: Arc<RiskManagerAgent>,
    trader: Arc<TraderAgent>,
    llm_client: Option<Arc<dyn LlmClient>>,
    tool_executor: Option<Arc<dyn ToolExecutor>>,
    order_executor: Option<Arc<dyn OrderExecutor>>,
    drawdown_halt: Arc<DrawdownHalt>,
}

impl ExecutionLoop {
    pub fn new(
        config: ExecutionLoopConfig,
        analyst: Arc<AnalystAgent>,
        risk_manager: Arc<RiskManagerAgent>,
        trader: Arc<TraderAgent>,
        llm_client: Option<Arc<dyn LlmClient>>,
        tool_executor: Option<Arc<dyn ToolExecutor>>,
        order_executor: Option<Arc<dyn OrderExecutor>>,
        drawdown_halt: Arc<DrawdownHalt>,
    ) -> Self {
        Self {
            config,
            analyst,
            risk_manager,
            trader,
            llm_client,
            tool_executor,
            order_executor,
            drawdown_halt,
        }
    }

    /// `Execute(ctx, symbol, market, portfolio) -> Result` (spec.md §4.4).
    /// The whole call is wrapped in a deadline; any step failing to return
    /// before it surfaces a partial, deferred result.
    #[instrument(skip(self, market, portfolio), fields(symbol = %market.symbol))]
    pub async fn execute(&self, account: &str, market: &MarketContext, portfolio: &PortfolioState) -> ExecutionResult {
        let deadline = std::time::Duration::from_secs(self.config.cycle_timeout_seconds);
        match tokio::time::timeout(deadline, self.execute_inner(account, market, portfolio)).await {
            Ok(result) => result,
            Err(_) => ExecutionResult::defer(format!(
                "execution cycle exceeded {}s deadline",
                self.config.cycle_timeout_seconds
            )),
        }
    }

    async fn execute_inner(&self, account: &str, market: &MarketContext, portfolio: &PortfolioState) -> ExecutionResult {
        let mut errors = Vec::new();
        let mut metrics = ExecutionMetrics::default();
        let mut transcript = Vec::new();

        // Step 1-2: derive analyst signals and run the Analyst Agent.
        let analyst_signals = derive_analyst_signals(market);
        let analysis = match self.analyst.analyze(&market.symbol, AnalystRole::Technical, &analyst_signals) {
            Ok(a) => a,
            Err(e) => return ExecutionResult::defer(format!("analyst failure: {e}")),
        };

        // Step 3: optional bounded LLM tool-calling dialogue.
        if self.config.llm_tool_calling_enabled {
            if let (Some(llm), Some(tools)) = (self.llm_client.clone(), self.tool_executor.clone()) {
                let mut conversation = vec![ChatMessage {
                    role: "system".to_string(),
                    content: format!(
                        "Analysis for {}: recommendation={:?} confidence={:.2} summary={}",
                        market.symbol, analysis.recommendation, analysis.confidence, analysis.summary
                    ),
                }];

                for iteration in 0..self.config.max_iterations {
                    metrics.llm_iterations = iteration + 1;
                    let request = CompletionRequest {
                        messages: conversation.clone(),
                        model: "default".to_string(),
                        tools: declared_tools(),
                    };
                    let response = match llm.complete(request).await {
                        Ok(r) => r,
                        Err(e) => {
                            errors.push(format!("llm iteration {iteration} failed: {e}"));
                            break;
                        }
                    };
                    if response.tool_calls.is_empty() {
                        conversation.push(ChatMessage {
                            role: "assistant".to_string(),
                            content: response.message,
                        });
                        break;
                    }
                    for call in response.tool_calls {
                        let result = tools.execute(&call.name, call.arguments.clone()).await;
                        let record = ToolCallRecord {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                            result: result.as_ref().ok().cloned(),
                            error: result.as_ref().err().map(|e| e.to_string()),
                            called_at: chrono::Utc::now(),
                        };
                        if let Err(e) = &result {
                            errors.push(format!("tool {} failed: {e}", call.name));
                        }
                        conversation.push(ChatMessage {
                            role: "tool".to_string(),
                            content: serde_json::to_string(&record.result).unwrap_or_default(),
                        });
                        transcript.push(record);
                    }
                }
            }
        }

        // Step 4: run the Trader Agent.
        let decision = self.trader.make_decision(market, portfolio);
        if matches!(decision.action, TradeAction::Hold | TradeAction::Wait) {
            return ExecutionResult {
                decision: ExecutionDecision::Defer,
                trading_decision: Some(decision),
                risk_assessment: None,
                tool_call_transcript: transcript,
                metrics,
                errors,
            };
        }

        // Step 5: risk gating.
        let mut final_decision = decision.clone();
        let mut risk_assessment = None;
        let mut gate = ExecutionDecision::Approve;

        if self.config.require_risk_approval {
            let risk_signals = derive_risk_signals(market, portfolio, analysis.confidence);
            let side_str = final_decision.side.map(|s| format!("{s:?}")).unwrap_or_default();
            let assessment = self.risk_manager.assess(&market.symbol, &side_str, &risk_signals);

            match assessment.action {
                RiskAction::Block => {
                    errors.extend(assessment.reasons.clone());
                    gate = ExecutionDecision::Reject;
                }
                RiskAction::Emergency => {
                    errors.extend(assessment.reasons.clone());
                    metrics.emergency_triggers += 1;
                    gate = ExecutionDecision::Emergency;
                }
                RiskAction::Reduce => {
                    let max_size = assessment.max_position_size.to_string().parse::<f64>().unwrap_or(0.0);
                    final_decision.size_percent = final_decision.size_percent.min(max_size);
                    gate = ExecutionDecision::Modify;
                }
                RiskAction::Warning => {
                    warn!(symbol = %market.symbol, "risk manager issued a warning; continuing");
                }
                RiskAction::Allow => {}
            }
            risk_assessment = Some(assessment);
        }

        if matches!(gate, ExecutionDecision::Reject | ExecutionDecision::Emergency) {
            return ExecutionResult {
                decision: gate,
                trading_decision: Some(final_decision),
                risk_assessment,
                tool_call_transcript: transcript,
                metrics,
                errors,
            };
        }

        // Step 6: confidence gate.
        if final_decision.confidence < self.config.min_confidence {
            errors.push(format!(
                "confidence {:.2} below minimum {:.2}",
                final_decision.confidence, self.config.min_confidence
            ));
            return ExecutionResult {
                decision: ExecutionDecision::Reject,
                trading_decision: Some(final_decision),
                risk_assessment,
                tool_call_transcript: transcript,
                metrics,
                errors,
            };
        }

        // Step 7: optional auto-execution, gated on the halt registry (P4).
        if self.config.auto_execute {
            if self.drawdown_halt.is_trading_halted(account) {
                errors.push("trading halted: order executor not invoked".to_string());
            } else if let Some(executor) = &self.order_executor {
                if let Err(e) = executor.execute_order(&final_decision).await {
                    errors.push(format!("order execution failed: {e}"));
                } else {
                    info!(symbol = %market.symbol, "order executed");
                }
            }
        }

        ExecutionResult {
            decision: gate,
            trading_decision: Some(final_decision),
            risk_assessment,
            tool_call_transcript: transcript,
            metrics,
            errors,
        }
    }
}

fn declared_tools() -> Vec<ToolDeclaration> {
    vec![ToolDeclaration {
        name: "get_indicator".to_string(),
        description: "Fetch a named technical indicator for the current symbol".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }),
    }]
}

fn derive_analyst_signals(market: &MarketContext) -> Vec<Signal> {
    let momentum_direction = match market.trend {
        crate::models::Trend::Up => Direction::Bullish,
        crate::models::Trend::Down => Direction::Bearish,
        crate::models::Trend::Sideways => Direction::Neutral,
    };
    let mut signals = vec![
        Signal {
            name: "momentum".to_string(),
            value: if momentum_direction == Direction::Neutral { 0.0 } else { 0.6 },
            weight: 1.0,
            direction: momentum_direction,
            description: "price momentum derived from trend".to_string(),
        },
        Signal {
            name: "volatility".to_string(),
            value: market.volatility,
            weight: 0.5,
            direction: Direction::Neutral,
            description: "market volatility".to_string(),
        },
        Signal {
            name: "liquidity".to_string(),
            value: market.liquidity,
            weight: 0.5,
            direction: if market.liquidity > 0.5 { Direction::Bullish } else { Direction::Bearish },
            description: "available liquidity".to_string(),
        },
    ];
    if market.funding_rate.abs() > 0.0 {
        signals.push(Signal {
            name: "funding_rate".to_string(),
            value: market.funding_rate.abs(),
            weight: 0.3,
            direction: if market.funding_rate < 0.0 { Direction::Bullish } else { Direction::Bearish },
            description: "perpetual funding rate".to_string(),
        });
    }
    signals.extend(market.signals.clone());
    signals
}

fn derive_risk_signals(market: &MarketContext, portfolio: &PortfolioState, analyst_confidence: f64) -> Vec<RiskSignal> {
    vec![
        RiskSignal {
            name: "volatility".to_string(),
            value: market.volatility,
            weight: 0.3,
            threshold: 0.5,
            description: "market volatility".to_string(),
        },
        RiskSignal {
            name: "illiquidity".to_string(),
            value: 1.0 - market.liquidity,
            weight: 0.2,
            threshold: 0.5,
            description: "inverse liquidity".to_string(),
        },
        RiskSignal {
            name: "drawdown".to_string(),
            value: portfolio.current_drawdown,
            weight: 0.3,
            threshold: 0.1,
            description: "current portfolio drawdown".to_string(),
        },
        RiskSignal {
            name: "analyst_uncertainty".to_string(),
            value: 1.0 - analyst_confidence,
            weight: 0.2,
            threshold: 0.5,
            description: "inverse analyst confidence".to_string(),
        },
    ]
}

pub fn side_for(action: TradeAction) -> Option<Side> {
    action.side_family()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RiskManagerConfig, TraderConfig};
    use crate::external::exchange::MockOrderExecutor;
    use crate::models::Trend;
    use rust_decimal_macros::dec;

    fn market() -> MarketContext {
        MarketContext {
            symbol: "BTC/USDT".to_string(),
            current_price: dec!(50000),
            volatility: 0.1,
            liquidity: 0.9,
            volume_24h: dec!(1000000),
            funding_rate: 0.0,
            trend: Trend::Up,
            signals: vec![],
        }
    }

    fn portfolio() -> PortfolioState {
        PortfolioState {
            total_value: dec!(100000),
            available_cash: dec!(50000),
            open_positions: 0,
            current_drawdown: 0.0,
            unrealized_pnl: dec!(0),
        }
    }

    fn build_loop(config: ExecutionLoopConfig) -> ExecutionLoop {
        ExecutionLoop::new(
            config,
            Arc::new(AnalystAgent::new(crate::config::AnalystConfig::default())),
            Arc::new(RiskManagerAgent::new(RiskManagerConfig::default())),
            Arc::new(TraderAgent::new(TraderConfig::default())),
            None,
            None,
            Some(Arc::new(MockOrderExecutor::new("test", true))),
            Arc::new(DrawdownHalt::new(crate::config::DrawdownConfig::default(), None)),
        )
    }

    /// P3 — if decision.decision = approve, confidence >= min_confidence and
    /// risk action permitted approval.
    #[tokio::test]
    async fn p3_approve_implies_confidence_and_risk_gate() {
        let exec_loop = build_loop(ExecutionLoopConfig {
            min_confidence: 0.05,
            auto_execute: false,
            ..ExecutionLoopConfig::default()
        });
        let result = exec_loop.execute("acct-1", &market(), &portfolio()).await;
        if result.decision == ExecutionDecision::Approve {
            let decision = result.trading_decision.unwrap();
            assert!(decision.confidence >= 0.05);
            let risk = result.risk_assessment.unwrap();
            assert!(matches!(risk.action, RiskAction::Allow | RiskAction::Warning | RiskAction::Reduce));
        }
    }

    /// S3 — Execution rejects on low confidence.
    #[tokio::test]
    async fn s3_rejects_on_low_confidence() {
        let exec_loop = build_loop(ExecutionLoopConfig {
            min_confidence: 0.99,
            ..ExecutionLoopConfig::default()
        });
        let result = exec_loop.execute("acct-1", &market(), &portfolio()).await;
        assert_eq!(result.decision, ExecutionDecision::Reject);
        assert!(result.errors.iter().any(|e| e.contains("below minimum")));
    }

    /// P4 — a halted account never reaches the order executor.
    #[tokio::test]
    async fn p4_halted_account_blocks_order_executor() {
        let halt = Arc::new(DrawdownHalt::new(crate::config::DrawdownConfig::default(), None));
        halt.check_drawdown("acct-1", dec!(100));
        halt.check_drawdown("acct-1", dec!(50));
        assert!(halt.is_trading_halted("acct-1"));

        let exec_loop = ExecutionLoop::new(
            ExecutionLoopConfig {
                min_confidence: 0.05,
                auto_execute: true,
                ..ExecutionLoopConfig::default()
            },
            Arc::new(AnalystAgent::new(crate::config::AnalystConfig::default())),
            Arc::new(RiskManagerAgent::new(RiskManagerConfig::default())),
            Arc::new(TraderAgent::new(TraderConfig::default())),
            None,
            None,
            Some(Arc::new(MockOrderExecutor::new("test", true))),
            halt,
        );
        let result = exec_loop.execute("acct-1", &market(), &portfolio()).await;
        assert!(result.errors.iter().any(|e| e.contains("trading halted")));
    }

    #[tokio::test]
    async fn hold_decision_defers() {
        let exec_loop = build_loop(ExecutionLoopConfig::default());
        let mut neutral_market = market();
        neutral_market.trend = Trend::Sideways;
        neutral_market.liquidity = 0.5;
        let result = exec_loop.execute("acct-1", &neutral_market, &portfolio()).await;
        assert_eq!(result.decision, ExecutionDecision::Defer);
    }
}

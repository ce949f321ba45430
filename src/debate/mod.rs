//! Debate Loop / Coordinator (spec.md §4.5): multi-round consensus with an
//! optional rebuttal phase and weighted voting.

use crate::agents::{AnalystAgent, RiskManagerAgent, TraderAgent};
use crate::config::DebateConfig;
use crate::models::{
    Analysis, AnalystRole, MarketContext, PortfolioState, Recommendation, RiskAction, RiskAssessment, RiskSignal,
    TradingDecision,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundConsensus {
    Approved,
    Rejected,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Analyst,
    Risk,
    Trader,
}

/// One agent's position in a round, used by the Round-Robin variant's
/// weighted consensus.
#[derive(Debug, Clone)]
pub struct AgentVote {
    pub agent: AgentKind,
    pub action: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct DebateRound {
    pub round: u32,
    pub analysis: Analysis,
    pub risk_assessment: RiskAssessment,
    pub trading_decision: Option<TradingDecision>,
    pub votes: Vec<AgentVote>,
    pub rebuttal: Option<String>,
    pub consensus: RoundConsensus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalDecision {
    ApprovedByConsensus,
    RejectedByRisk,
    NoConsensus,
}

#[derive(Debug, Clone)]
pub struct DebateResult {
    pub debate_id: Uuid,
    pub rounds: Vec<DebateRound>,
    pub final_decision: FinalDecision,
    pub winning_action: Option<String>,
    pub consensus_score: f64,
}

/// A handle to an in-flight debate, cancellable independently of others.
struct DebateHandle {
    cancelled: std::sync::atomic::AtomicBool,
}

/// Coordinates concurrent debates. Open Question 1 (spec.md §9) resolves to
/// per-debate entries in a `DashMap` rather than one coarse lock, so debates
/// for different symbols never serialize against each other.
pub struct DebateCoordinator {
    config: DebateConfig,
    analyst: Arc<AnalystAgent>,
    risk_manager: Arc<RiskManagerAgent>,
    trader: Arc<TraderAgent>,
    active: Arc<DashMap<Uuid, DebateHandle>>,
}

impl DebateCoordinator {
    pub fn new(
        config: DebateConfig,
        analyst: Arc<AnalystAgent>,
        risk_manager: Arc<RiskManagerAgent>,
        trader: Arc<TraderAgent>,
    ) -> Self {
        Self {
            config,
            analyst,
            risk_manager,
            trader,
            active: Arc::new(DashMap::new()),
        }
    }

    pub fn active_debate_count(&self) -> usize {
        self.active.len()
    }

    /// `RunDebate(ctx, market, portfolio) -> DebateResult` (spec.md §4.5).
    #[instrument(skip(self, market, portfolio), fields(symbol = %market.symbol))]
    pub async fn run_debate(&self, market: &MarketContext, portfolio: &PortfolioState) -> DebateResult {
        let debate_id = Uuid::new_v4();
        self.active.insert(
            debate_id,
            DebateHandle {
                cancelled: std::sync::atomic::AtomicBool::new(false),
            },
        );

        let deadline = std::time::Duration::from_secs(self.config.debate_timeout_seconds);
        let result = tokio::time::timeout(deadline, self.run_rounds(debate_id, market, portfolio)).await;

        self.active.remove(&debate_id);

        match result {
            Ok(result) => result,
            Err(_) => DebateResult {
                debate_id,
                rounds: vec![],
                final_decision: FinalDecision::NoConsensus,
                winning_action: None,
                consensus_score: 0.0,
            },
        }
    }

    /// Cancels an in-flight debate; the next round boundary observes it and
    /// terminates with `NoConsensus`.
    pub fn cancel(&self, debate_id: Uuid) {
        if let Some(handle) = self.active.get(&debate_id) {
            handle.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    async fn run_rounds(&self, debate_id: Uuid, market: &MarketContext, portfolio: &PortfolioState) -> DebateResult {
        let mut rounds = Vec::new();

        for round_no in 1..=self.config.max_rounds {
            if let Some(handle) = self.active.get(&debate_id) {
                if handle.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
            }

            let analysis = match self.analyst.analyze(&market.symbol, AnalystRole::Technical, &market.signals) {
                Ok(a) => a,
                Err(e) => {
                    warn!(round = round_no, %e, "analyst failed in debate round");
                    break;
                }
            };

            let side_hint = match analysis.recommendation {
                Recommendation::Buy => "long",
                Recommendation::Sell => "short",
                _ => "none",
            };
            let risk_signals = round_risk_signals(market, portfolio, analysis.confidence);
            let risk_assessment = self.risk_manager.assess(&market.symbol, side_hint, &risk_signals);

            if matches!(risk_assessment.action, RiskAction::Block | RiskAction::Emergency) {
                let votes = vec![
                    AgentVote {
                        agent: AgentKind::Analyst,
                        action: format!("{:?}", analysis.recommendation),
                        confidence: analysis.confidence,
                    },
                    AgentVote {
                        agent: AgentKind::Risk,
                        action: format!("{:?}", risk_assessment.action),
                        confidence: risk_assessment.score,
                    },
                ];
                rounds.push(DebateRound {
                    round: round_no,
                    analysis,
                    risk_assessment,
                    trading_decision: None,
                    votes,
                    rebuttal: None,
                    consensus: RoundConsensus::Rejected,
                });
                return DebateResult {
                    debate_id,
                    rounds,
                    final_decision: FinalDecision::RejectedByRisk,
                    winning_action: None,
                    consensus_score: 0.0,
                };
            }

            let decision = self.trader.make_decision(market, portfolio);

            let rebuttal = if self.config.rebuttal_enabled && analysis.confidence < 0.6 && risk_assessment.score > 0.7 {
                Some(format!(
                    "risk manager challenges analyst: analyst confidence {:.2} is low while risk score {:.2} is high",
                    analysis.confidence, risk_assessment.score
                ))
            } else {
                None
            };

            let same_side = matches!(
                (analysis.recommendation, decision.action.side_family()),
                (Recommendation::Buy, Some(crate::models::Side::Long))
                    | (Recommendation::Sell, Some(crate::models::Side::Short))
            );
            let consensus = if same_side {
                RoundConsensus::Approved
            } else {
                RoundConsensus::Hold
            };

            let votes = vec![
                AgentVote {
                    agent: AgentKind::Analyst,
                    action: format!("{:?}", analysis.recommendation),
                    confidence: analysis.confidence,
                },
                AgentVote {
                    agent: AgentKind::Risk,
                    action: format!("{:?}", risk_assessment.action),
                    confidence: risk_assessment.score,
                },
                AgentVote {
                    agent: AgentKind::Trader,
                    action: format!("{:?}", decision.action),
                    confidence: decision.confidence,
                },
            ];

            let weighted = self.weighted_consensus(&votes);

            let round_is_terminal = consensus == RoundConsensus::Approved;
            rounds.push(DebateRound {
                round: round_no,
                analysis,
                risk_assessment,
                trading_decision: Some(decision),
                votes,
                rebuttal,
                consensus,
            });

            if round_is_terminal {
                info!(round = round_no, "debate reached consensus");
                return DebateResult {
                    debate_id,
                    rounds,
                    final_decision: FinalDecision::ApprovedByConsensus,
                    winning_action: weighted.0,
                    consensus_score: weighted.1,
                };
            }
        }

        DebateResult {
            debate_id,
            rounds,
            final_decision: FinalDecision::NoConsensus,
            winning_action: None,
            consensus_score: 0.0,
        }
    }

    /// Weighted consensus (Round-Robin variant, spec.md §4.5):
    /// `vote(action) = Σ weightᵢ · confidenceᵢ` across agents favoring that
    /// action, compared against `min_consensus_confidence` and the mean
    /// confidence across agents.
    fn weighted_consensus(&self, votes: &[AgentVote]) -> (Option<String>, f64) {
        let weight_of = |agent: AgentKind| match agent {
            AgentKind::Analyst => self.config.analyst_weight,
            AgentKind::Risk => self.config.risk_weight,
            AgentKind::Trader => self.config.trader_weight,
        };

        let mut tallies: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
        for vote in votes {
            *tallies.entry(vote.action.clone()).or_insert(0.0) += weight_of(vote.agent) * vote.confidence;
        }

        let Some((winning_action, score)) = tallies
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            return (None, 0.0);
        };

        let mean_confidence: f64 = votes.iter().map(|v| v.confidence).sum::<f64>() / votes.len().max(1) as f64;
        if score < self.config.min_consensus_confidence || mean_confidence < self.config.min_consensus_confidence {
            warn!(score, mean_confidence, "weighted consensus below minimum confidence");
        }
        (Some(winning_action), score)
    }
}

fn round_risk_signals(market: &MarketContext, portfolio: &PortfolioState, analyst_confidence: f64) -> Vec<RiskSignal> {
    vec![
        RiskSignal {
            name: "volatility".to_string(),
            value: market.volatility,
            weight: 0.3,
            threshold: 0.5,
            description: "market volatility".to_string(),
        },
        RiskSignal {
            name: "drawdown".to_string(),
            value: portfolio.current_drawdown,
            weight: 0.4,
            threshold: 0.1,
            description: "current portfolio drawdown".to_string(),
        },
        RiskSignal {
            name: "analyst_uncertainty".to_string(),
            value: 1.0 - analyst_confidence,
            weight: 0.3,
            threshold: 0.5,
            description: "inverse analyst confidence".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalystConfig, RiskManagerConfig, TraderConfig};
    use crate::models::{Direction, Signal, Trend};
    use rust_decimal_macros::dec;

    fn market_with_signals(signals: Vec<Signal>) -> MarketContext {
        MarketContext {
            symbol: "BTC/USDT".to_string(),
            current_price: dec!(50000),
            volatility: 0.9,
            liquidity: 0.9,
            volume_24h: dec!(1000000),
            funding_rate: 0.0,
            trend: Trend::Up,
            signals,
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

    /// S7 — debate early rejection: Analyst buys with confidence 0.9, Risk
    /// blocks. Expect a single round, consensus rejected, final decision
    /// rejected_by_risk, no Trader call that round.
    #[tokio::test]
    async fn s7_debate_early_rejection() {
        let bullish_signals = vec![
            Signal {
                name: "rsi".to_string(),
                value: 0.9,
                weight: 1.0,
                direction: Direction::Bullish,
                description: "".to_string(),
            },
            Signal {
                name: "macd".to_string(),
                value: 0.9,
                weight: 1.0,
                direction: Direction::Bullish,
                description: "".to_string(),
            },
        ];
        let coordinator = DebateCoordinator::new(
            DebateConfig {
                max_rounds: 3,
                ..DebateConfig::default()
            },
            Arc::new(AnalystAgent::new(AnalystConfig {
                signal_threshold: 0.1,
                min_confidence: 0.1,
            })),
            Arc::new(RiskManagerAgent::new(RiskManagerConfig {
                warn_threshold: 0.01,
                reduce_threshold: 0.02,
                block_threshold: 0.03,
                emergency_threshold: 0.9,
                ..RiskManagerConfig::default()
            })),
            Arc::new(TraderAgent::new(TraderConfig::default())),
        );

        let result = coordinator.run_debate(&market_with_signals(bullish_signals), &portfolio()).await;

        assert_eq!(result.rounds.len(), 1);
        assert_eq!(result.rounds[0].consensus, RoundConsensus::Rejected);
        assert_eq!(result.final_decision, FinalDecision::RejectedByRisk);
        assert!(result.rounds[0].trading_decision.is_none());
    }

    #[tokio::test]
    async fn debate_reaches_consensus_on_agreement() {
        let bullish_signals = vec![Signal {
            name: "rsi".to_string(),
            value: 0.9,
            weight: 1.0,
            direction: Direction::Bullish,
            description: "".to_string(),
        }];
        let coordinator = DebateCoordinator::new(
            DebateConfig::default(),
            Arc::new(AnalystAgent::new(AnalystConfig {
                signal_threshold: 0.1,
                min_confidence: 0.1,
            })),
            Arc::new(RiskManagerAgent::new(RiskManagerConfig::default())),
            Arc::new(TraderAgent::new(TraderConfig::default())),
        );
        let result = coordinator.run_debate(&market_with_signals(bullish_signals), &portfolio()).await;
        assert!(!result.rounds.is_empty());
    }

    #[tokio::test]
    async fn active_debates_do_not_serialize() {
        let coordinator = Arc::new(DebateCoordinator::new(
            DebateConfig::default(),
            Arc::new(AnalystAgent::new(AnalystConfig::default())),
            Arc::new(RiskManagerAgent::new(RiskManagerConfig::default())),
            Arc::new(TraderAgent::new(TraderConfig::default())),
        ));
        let c1 = coordinator.clone();
        let c2 = coordinator.clone();
        let market = market_with_signals(vec![]);
        let m1 = market.clone();
        let m2 = market.clone();
        let p = portfolio();
        let p2 = portfolio();

        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { c1.run_debate(&m1, &p).await }),
            tokio::spawn(async move { c2.run_debate(&m2, &p2).await })
        );
        assert!(r1.is_ok());
        assert!(r2.is_ok());
    }
}

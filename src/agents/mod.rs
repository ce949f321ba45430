//! The three decision roles in the pipeline (spec.md §4.1-4.3).

pub mod analyst;
pub mod risk;
pub mod trader;

pub use analyst::AnalystAgent;
pub use risk::RiskManagerAgent;
pub use trader::TraderAgent;

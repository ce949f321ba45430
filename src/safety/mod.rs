//! Safety Subsystem (spec.md §4.6): the gate every trade passes through.

pub mod api_key;
pub mod drawdown;
pub mod imbalance;
pub mod manipulation;
pub mod portfolio;
pub mod quality;
pub mod wallet;

pub use api_key::ApiKeyValidator;
pub use drawdown::DrawdownHalt;
pub use imbalance::ImbalanceDetector;
pub use manipulation::ManipulationFilter;
pub use portfolio::PortfolioSafety;
pub use quality::QualityFilter;
pub use wallet::WalletValidator;

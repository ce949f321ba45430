//! agent-trading-core - the agent orchestration core of an automated
//! cryptocurrency trading system.
//!
//! Analyst, Risk Manager and Trader agents feed a single-pass Execution
//! Loop or a multi-round Debate Loop; a Safety Subsystem gates every trade;
//! Session State is journaled with a checksum across restarts; the Event
//! Bus and Action Streamer fan results out; and a Worker Pool / Subagent
//! Spawner bound concurrency.

pub mod agents;
pub mod config;
pub mod debate;
pub mod error;
pub mod events;
pub mod execution;
pub mod external;
pub mod models;
pub mod safety;
pub mod session;
pub mod utils;
pub mod workers;

pub use config::AppConfig;
pub use error::{TradingError, TradingResult};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initializes tracing with the default `info` filter.
pub fn init() -> TradingResult<()> {
    utils::logging::init_logging("info").map_err(|e| TradingError::Configuration(e.to_string()))?;
    tracing::info!(version = VERSION, "{} initialized", NAME);
    Ok(())
}

/// Initializes tracing with a caller-supplied filter (e.g. `"debug"` or an
/// `EnvFilter` directive string).
pub fn init_with_tracing(log_level: &str) -> TradingResult<()> {
    utils::logging::init_logging(log_level).map_err(|e| TradingError::Configuration(e.to_string()))?;
    tracing::info!(version = VERSION, log_level, "{} initialized", NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}

//! API-Key Permission Validator (spec.md §4.6.4).

use crate::config::ApiKeyValidatorConfig;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ApiKeyAssessment {
    pub trade_only: bool,
    pub risk_score: f64,
    pub allowed: bool,
}

pub struct ApiKeyValidator {
    config: ApiKeyValidatorConfig,
}

impl ApiKeyValidator {
    pub fn new(config: ApiKeyValidatorConfig) -> Self {
        Self { config }
    }

    /// Classifies a key's scopes against the denied-permission set (spec.md
    /// §4.6.4). A key is trade-only iff it has `trade` and none of the
    /// denied permissions.
    pub fn assess(&self, scopes: &[String]) -> ApiKeyAssessment {
        let scopes: HashSet<&str> = scopes.iter().map(String::as_str).collect();
        let denied: HashSet<&str> = self.config.denied_permissions.iter().map(String::as_str).collect();

        let has_denied = scopes.iter().any(|s| denied.contains(s));
        let has_trade = scopes.contains("trade");
        let trade_only = has_trade && !has_denied;

        let risk_score = if scopes.contains("withdraw") {
            0.95
        } else if has_denied {
            0.7
        } else if has_trade {
            0.2
        } else {
            0.05
        };

        ApiKeyAssessment {
            trade_only,
            risk_score,
            allowed: trade_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_scope_is_high_risk_and_blocked() {
        let validator = ApiKeyValidator::new(ApiKeyValidatorConfig::default());
        let assessment = validator.assess(&["trade".to_string(), "withdraw".to_string()]);
        assert!(!assessment.allowed);
        assert!(assessment.risk_score > 0.9);
    }

    #[test]
    fn trade_only_scope_is_allowed() {
        let validator = ApiKeyValidator::new(ApiKeyValidatorConfig::default());
        let assessment = validator.assess(&["trade".to_string(), "read".to_string()]);
        assert!(assessment.allowed);
        assert!(assessment.trade_only);
    }

    #[test]
    fn read_only_scope_is_low_risk_but_not_trade_only() {
        let validator = ApiKeyValidator::new(ApiKeyValidatorConfig::default());
        let assessment = validator.assess(&["read".to_string()]);
        assert!(!assessment.trade_only);
        assert!(assessment.risk_score < 0.2);
    }
}

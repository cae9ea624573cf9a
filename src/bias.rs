use serde::{Deserialize, Serialize};

use crate::catalog::{FirmId, FirmOffering, RiskTier, StrategyType};
use crate::error::{Error, Result};

/// Weight given to Puma's low-risk property lending over its peers.
pub const PUMA_PROPERTY_LENDING_BIAS: f64 = 1.15;

/// Replaces an offering's base weight when every populated field matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasRule {
    pub firm: FirmId,
    #[serde(default)]
    pub strategy: Option<StrategyType>,
    #[serde(default)]
    pub risk: Option<RiskTier>,
    pub weight: f64,
}

impl BiasRule {
    pub fn matches(&self, offering: &FirmOffering) -> bool {
        offering.firm() == &self.firm
            && self.strategy.as_ref().map_or(true, |s| s == offering.strategy())
            && self.risk.map_or(true, |r| r == offering.risk())
    }
}

/// Ordered rule set; the first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Biaser {
    rules: Vec<BiasRule>,
}

impl Biaser {
    pub fn new(rules: Vec<BiasRule>) -> Result<Self> {
        for rule in &rules {
            if !(rule.weight.is_finite() && rule.weight > 0.0) {
                return Err(Error::Config(format!(
                    "bias weight for {} must be positive (got {})",
                    rule.firm, rule.weight
                )));
            }
        }
        Ok(Biaser { rules })
    }

    /// The shipped rule set. Its weights are known to be valid.
    pub fn builtin() -> Self {
        Biaser {
            rules: default_rules(),
        }
    }

    pub fn effective_weight(&self, offering: &FirmOffering) -> f64 {
        self.rules
            .iter()
            .find(|rule| rule.matches(offering))
            .map_or(offering.base_weight, |rule| rule.weight)
    }
}

pub fn default_rules() -> Vec<BiasRule> {
    vec![BiasRule {
        firm: FirmId::new("Puma"),
        strategy: Some(StrategyType::new("Property Lending")),
        risk: Some(RiskTier::Low),
        weight: PUMA_PROPERTY_LENDING_BIAS,
    }]
}

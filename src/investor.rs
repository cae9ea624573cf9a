use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::StrategyType;
use crate::error::{Result, ValidationError};

/// Slack allowed when checking that target fractions do not exceed 1.0.
const FRACTION_SUM_TOLERANCE: f64 = 1e-9;

// "Property Lending=30" or "Forestry = 12.5%"
static TARGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^=]+?)\s*=\s*([0-9]+(?:\.[0-9]+)?)\s*%?\s*$").expect("valid target regex")
});

/// Per-strategy-type target fractions in [0, 1], summing to at most 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyTargets(BTreeMap<StrategyType, f64>);

impl StrategyTargets {
    /// Build from fractions, rejecting out-of-range values, duplicates and an over-allocated total.
    pub fn from_fractions<I>(targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (StrategyType, f64)>,
    {
        let mut map = BTreeMap::new();
        for (strategy, fraction) in targets {
            if !(fraction.is_finite() && (0.0..=1.0).contains(&fraction)) {
                return Err(ValidationError::FractionOutOfRange {
                    strategy: strategy.to_string(),
                    fraction,
                }
                .into());
            }
            if map.contains_key(&strategy) {
                return Err(ValidationError::DuplicateTarget(strategy.to_string()).into());
            }
            map.insert(strategy, fraction);
        }

        let total: f64 = map.values().sum();
        if total > 1.0 + FRACTION_SUM_TOLERANCE {
            return Err(ValidationError::OverAllocated {
                total: total * 100.0,
            }
            .into());
        }
        Ok(StrategyTargets(map))
    }

    /// Build from whole-number style percentages (30 means 30%).
    pub fn from_percentages<I>(targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (StrategyType, f64)>,
    {
        Self::from_fractions(targets.into_iter().map(|(s, pct)| (s, pct / 100.0)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StrategyType, f64)> {
        self.0.iter().map(|(s, f)| (s, *f))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

/// Parse a "Strategy=PCT" argument into a strategy type and a percentage.
pub fn parse_target(raw: &str) -> Result<(StrategyType, f64)> {
    let caps = TARGET_PATTERN
        .captures(raw)
        .ok_or_else(|| ValidationError::MalformedTarget(raw.to_string()))?;
    let pct: f64 = caps[2]
        .parse()
        .map_err(|_| ValidationError::MalformedTarget(raw.to_string()))?;
    Ok((StrategyType::new(&caps[1]), pct))
}

/// How the caller wants the investment split. Passed explicitly on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AllocationMode {
    /// Product exposure: a target per strategy type.
    ByStrategy(StrategyTargets),
    /// Risk exposure: percentage in the low tier, remainder in the high tier.
    ByRisk { low_percent: u32 },
}

impl AllocationMode {
    pub fn label(&self) -> &'static str {
        match self {
            AllocationMode::ByStrategy(_) => "Product Exposure",
            AllocationMode::ByRisk { .. } => "Risk Exposure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentRequest {
    pub total_investment: f64,
    pub mode: AllocationMode,
}

impl InvestmentRequest {
    pub fn new(total_investment: f64, mode: AllocationMode) -> Self {
        InvestmentRequest {
            total_investment,
            mode,
        }
    }

    /// Check everything that can be checked before any allocation happens.
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.total_investment)?;
        if let AllocationMode::ByRisk { low_percent } = self.mode {
            if low_percent > 100 {
                return Err(ValidationError::PercentOutOfRange(low_percent).into());
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(ValidationError::NonFiniteAmount.into());
    }
    if amount < 0.0 {
        return Err(ValidationError::NegativeAmount(amount).into());
    }
    Ok(())
}

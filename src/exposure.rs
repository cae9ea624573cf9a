use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::{FirmId, OfferingKey, RiskTier, StrategyType};

/// Amounts held in each risk tier of one strategy type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskSplit {
    pub low: f64,
    pub high: f64,
}

impl RiskSplit {
    pub fn get(&self, risk: RiskTier) -> f64 {
        match risk {
            RiskTier::Low => self.low,
            RiskTier::High => self.high,
        }
    }

    pub fn add(&mut self, risk: RiskTier, amount: f64) {
        match risk {
            RiskTier::Low => self.low += amount,
            RiskTier::High => self.high += amount,
        }
    }

    pub fn total(&self) -> f64 {
        self.low + self.high
    }
}

/// Outcome of allocating one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllocationResult {
    #[serde(skip)]
    pub per_offering: BTreeMap<OfferingKey, f64>,
    pub per_firm: BTreeMap<FirmId, f64>,
    pub per_strategy_risk: BTreeMap<StrategyType, RiskSplit>,
}

impl AllocationResult {
    /// Project per-offering amounts onto firms and strategy/risk cells.
    pub fn from_offerings(per_offering: BTreeMap<OfferingKey, f64>) -> Self {
        let mut per_firm: BTreeMap<FirmId, f64> = BTreeMap::new();
        let mut per_strategy_risk: BTreeMap<StrategyType, RiskSplit> = BTreeMap::new();

        for (key, amount) in &per_offering {
            *per_firm.entry(key.firm.clone()).or_insert(0.0) += amount;
            per_strategy_risk
                .entry(key.strategy.clone())
                .or_default()
                .add(key.risk, *amount);
        }

        AllocationResult {
            per_offering,
            per_firm,
            per_strategy_risk,
        }
    }

    pub fn total(&self) -> f64 {
        self.per_firm.values().sum()
    }
}

/// Running totals across every bucket of one request. Merged in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioSummary {
    #[serde(skip)]
    pub per_offering: BTreeMap<OfferingKey, f64>,
    pub per_firm: BTreeMap<FirmId, f64>,
    pub per_strategy_risk: BTreeMap<StrategyType, RiskSplit>,
}

impl PortfolioSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bucket's result entrywise. Missing keys start at zero.
    pub fn merge(&mut self, result: &AllocationResult) {
        for (key, amount) in &result.per_offering {
            *self.per_offering.entry(key.clone()).or_insert(0.0) += amount;
        }
        for (firm, amount) in &result.per_firm {
            *self.per_firm.entry(firm.clone()).or_insert(0.0) += amount;
        }
        for (strategy, split) in &result.per_strategy_risk {
            let cell = self.per_strategy_risk.entry(strategy.clone()).or_default();
            cell.low += split.low;
            cell.high += split.high;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_firm.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.per_firm.values().sum()
    }

    pub fn firm_total(&self, firm: &FirmId) -> f64 {
        self.per_firm.get(firm).copied().unwrap_or(0.0)
    }

    pub fn tier_total(&self, risk: RiskTier) -> f64 {
        self.per_strategy_risk.values().map(|s| s.get(risk)).sum()
    }

    /// Strategy types a firm actually received money for, sorted and deduplicated.
    pub fn strategies_for(&self, firm: &FirmId) -> Vec<&StrategyType> {
        let mut out: Vec<&StrategyType> = self
            .per_offering
            .iter()
            .filter(|(k, amount)| &k.firm == firm && **amount > 0.0)
            .map(|(k, _)| &k.strategy)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

impl<'a> FromIterator<&'a AllocationResult> for PortfolioSummary {
    fn from_iter<I: IntoIterator<Item = &'a AllocationResult>>(iter: I) -> Self {
        let mut summary = PortfolioSummary::new();
        for result in iter {
            summary.merge(result);
        }
        summary
    }
}

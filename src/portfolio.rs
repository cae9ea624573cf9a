use log::debug;
use std::collections::BTreeMap;

use crate::allocator::{allocate, cap_firm, ConcentrationCap};
use crate::bias::Biaser;
use crate::catalog::{Catalog, OfferingKey, RiskTier, Selector};
use crate::error::{Error, Result, ValidationError};
use crate::exposure::{AllocationResult, PortfolioSummary};
use crate::investor::{validate_amount, AllocationMode, InvestmentRequest, StrategyTargets};
use crate::settings::Settings;

/// Runs catalog lookup, biasing, proportional allocation and capping for each bucket
/// of a request, and folds the buckets into one summary.
///
/// Holds no state between calls; every request gets a fresh `PortfolioSummary`.
#[derive(Debug, Clone)]
pub struct Diversifier {
    catalog: Catalog,
    biaser: Biaser,
    cap: Option<ConcentrationCap>,
}

impl Diversifier {
    pub fn new(catalog: Catalog, biaser: Biaser, cap: Option<ConcentrationCap>) -> Self {
        Diversifier {
            catalog,
            biaser,
            cap,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Diversifier::new(
            settings.catalog()?,
            settings.biaser()?,
            settings.concentration_cap.clone(),
        ))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Allocate one bucket across the offerings matching `selector`.
    ///
    /// `bucket_amount` may exceed `total_investment`; only the cap limit is derived
    /// from the total.
    pub fn allocate_bucket(
        &self,
        selector: &Selector,
        bucket_amount: f64,
        total_investment: f64,
    ) -> Result<AllocationResult> {
        validate_amount(bucket_amount)?;
        validate_amount(total_investment)?;

        let offerings = self.catalog.offerings_for(selector)?;
        if offerings.is_empty() {
            if bucket_amount > 0.0 {
                return Err(Error::empty_options(selector));
            }
            return Ok(AllocationResult::default());
        }

        let weights: BTreeMap<OfferingKey, f64> = offerings
            .iter()
            .map(|o| (o.key.clone(), self.biaser.effective_weight(o)))
            .collect();
        let options: Vec<(OfferingKey, f64)> =
            weights.iter().map(|(k, w)| (k.clone(), *w)).collect();

        let mut allocations = allocate(bucket_amount, &options)?;

        if let Some(cap) = &self.cap {
            if offerings.iter().any(|o| o.firm() == &cap.firm) {
                let limit = cap.limit(total_investment);
                let before: f64 = allocations
                    .iter()
                    .filter(|(k, _)| k.firm == cap.firm)
                    .map(|(_, v)| v)
                    .sum();
                if before > limit {
                    debug!(
                        "capping {} at {:.2} in {} (was {:.2})",
                        cap.firm, limit, selector, before
                    );
                }
                allocations = cap_firm(allocations, &weights, &cap.firm, limit)?;
            }
        }

        debug!(
            "allocated {:.2} across {} offerings for {}",
            bucket_amount,
            allocations.len(),
            selector
        );
        Ok(AllocationResult::from_offerings(allocations))
    }

    /// Product exposure: one bucket per strategy type with a positive target.
    pub fn allocate_by_strategy(
        &self,
        total_investment: f64,
        targets: &StrategyTargets,
    ) -> Result<PortfolioSummary> {
        validate_amount(total_investment)?;

        let mut results = Vec::new();
        for (strategy, fraction) in targets.iter() {
            let bucket = total_investment * fraction;
            if fraction <= 0.0 || bucket == 0.0 {
                debug!("skipping empty bucket for {}", strategy);
                continue;
            }
            let selector = Selector::Strategy(strategy.clone());
            results.push(self.allocate_bucket(&selector, bucket, total_investment)?);
        }

        Ok(results.iter().collect())
    }

    /// Risk exposure: `low_percent` of the total goes to low-risk offerings, the rest to high.
    pub fn allocate_by_risk(&self, total_investment: f64, low_percent: u32) -> Result<PortfolioSummary> {
        validate_amount(total_investment)?;
        if low_percent > 100 {
            return Err(ValidationError::PercentOutOfRange(low_percent).into());
        }

        let low = total_investment * (f64::from(low_percent) / 100.0);
        let high = total_investment * (f64::from(100 - low_percent) / 100.0);

        let mut results = Vec::new();
        for (tier, bucket) in [(RiskTier::Low, low), (RiskTier::High, high)] {
            if bucket == 0.0 {
                debug!("skipping empty {} risk bucket", tier);
                continue;
            }
            results.push(self.allocate_bucket(&Selector::Risk(tier), bucket, total_investment)?);
        }

        Ok(results.iter().collect())
    }

    /// Validate a request up front, then dispatch on its mode.
    pub fn run(&self, request: &InvestmentRequest) -> Result<PortfolioSummary> {
        request.validate()?;
        match &request.mode {
            AllocationMode::ByStrategy(targets) => {
                self.allocate_by_strategy(request.total_investment, targets)
            }
            AllocationMode::ByRisk { low_percent } => {
                self.allocate_by_risk(request.total_investment, *low_percent)
            }
        }
    }
}

impl Default for Diversifier {
    fn default() -> Self {
        Diversifier::new(
            Catalog::builtin().clone(),
            Biaser::builtin(),
            Some(ConcentrationCap::default()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FirmId, FirmOffering, StrategyType};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn property_lending_bucket_prefers_puma() {
        let d = Diversifier::default();
        let r = d
            .allocate_bucket(&Selector::Strategy("Property Lending".into()), 3000.0, 10_000.0)
            .unwrap();
        let puma = r.per_firm[&FirmId::new("Puma")];
        let time = r.per_firm[&FirmId::new("Time")];
        assert!(close(puma, 3000.0 * 1.15 / 3.15));
        assert!(close(time, 3000.0 / 3.15));
        assert!(close(r.total(), 3000.0));

        let lending = &r.per_strategy_risk[&StrategyType::new("Property Lending")];
        assert!(close(lending.high, time));
        assert!(close(lending.low, puma + r.per_firm[&FirmId::new("Downing")]));
    }

    #[test]
    fn oversized_bucket_is_capped_at_half_the_total() {
        // Bucket larger than the total is a caller error the core tolerates.
        let d = Diversifier::default();
        let r = d
            .allocate_bucket(&Selector::Strategy("Property Lending".into()), 20_000.0, 10_000.0)
            .unwrap();
        assert_eq!(r.per_firm[&FirmId::new("Puma")], 5000.0);
        assert!(close(r.per_firm[&FirmId::new("Time")], 7500.0));
        assert!(close(r.per_firm[&FirmId::new("Downing")], 7500.0));
        assert!(close(r.total(), 20_000.0));
    }

    #[test]
    fn unknown_strategy_with_money_is_an_error() {
        let d = Diversifier::default();
        let err = d
            .allocate_bucket(&Selector::Strategy("Crypto".into()), 100.0, 100.0)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyOptionSet { .. }));

        let empty = d
            .allocate_bucket(&Selector::Strategy("Crypto".into()), 0.0, 100.0)
            .unwrap();
        assert!(empty.per_firm.is_empty());
    }

    #[test]
    fn negative_bucket_is_rejected() {
        let d = Diversifier::default();
        assert!(matches!(
            d.allocate_bucket(&Selector::Risk(RiskTier::Low), -5.0, 100.0),
            Err(Error::InvalidInput(ValidationError::NegativeAmount(_)))
        ));
    }

    #[test]
    fn cap_is_skipped_when_firm_is_absent() {
        let d = Diversifier::default();
        let r = d
            .allocate_bucket(&Selector::Strategy("Forestry".into()), 50_000.0, 10_000.0)
            .unwrap();
        assert!(close(r.per_firm[&FirmId::new("Octopus")], 25_000.0));
        assert!(!r.per_firm.contains_key(&FirmId::new("Puma")));
    }

    #[test]
    fn very_large_totals_allocate_without_overflow() {
        let d = Diversifier::default();

        let by_risk = d.allocate_by_risk(1e307, 60).unwrap();
        assert!(by_risk.per_firm.values().all(|v| v.is_finite()));
        assert!(close(by_risk.tier_total(RiskTier::Low), 6e306));
        assert!(close(by_risk.total(), 1e307));

        let targets =
            StrategyTargets::from_percentages(vec![("Property Lending".into(), 100.0)]).unwrap();
        let by_strategy = d.allocate_by_strategy(1.6e308, &targets).unwrap();
        assert!(by_strategy.per_firm.values().all(|v| v.is_finite()));
        assert!(close(by_strategy.firm_total(&"Time".into()), 1.6e308 / 3.15));
        assert!(close(by_strategy.firm_total(&"Downing".into()), 1.6e308 / 3.15));
        assert!(close(by_strategy.total(), 1.6e308));
    }

    #[test]
    fn risk_mode_rejects_out_of_range_percent() {
        let d = Diversifier::default();
        assert!(matches!(
            d.allocate_by_risk(10_000.0, 150),
            Err(Error::InvalidInput(ValidationError::PercentOutOfRange(150)))
        ));
    }

    #[test]
    fn zero_investment_produces_an_empty_summary() {
        let d = Diversifier::default();
        assert!(d.allocate_by_risk(0.0, 60).unwrap().is_empty());
        let targets =
            StrategyTargets::from_percentages(vec![("Forestry".into(), 100.0)]).unwrap();
        assert!(d.allocate_by_strategy(0.0, &targets).unwrap().is_empty());
    }

    #[test]
    fn failure_in_a_later_bucket_returns_no_partial_summary() {
        let catalog = Catalog::new(vec![
            FirmOffering::new("Puma", "Property Lending", RiskTier::Low, 1.0),
            FirmOffering::new("Time", "Renewables", RiskTier::Low, 1.0),
        ])
        .unwrap();
        let d = Diversifier::new(catalog, Biaser::default(), Some(ConcentrationCap::default()));
        let targets = StrategyTargets::from_percentages(vec![
            ("Renewables".into(), 40.0),
            ("Property Lending".into(), 60.0),
        ])
        .unwrap();

        // Puma is alone in its bucket and over the cap.
        let err = d.allocate_by_strategy(10_000.0, &targets).unwrap_err();
        assert!(matches!(err, Error::NoRedistributionTarget { .. }));
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::catalog::{FirmId, OfferingKey};
use crate::error::{Error, Result, ValidationError};

/// Maximum share of the total investment Puma may receive from a single bucket.
pub const PUMA_MAX_SHARE: f64 = 0.5;

/// Limit on a single firm's share of the total investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationCap {
    pub firm: FirmId,
    pub fraction: f64,
}

impl ConcentrationCap {
    pub fn new(firm: impl Into<FirmId>, fraction: f64) -> Result<Self> {
        if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::Config(format!(
                "concentration cap fraction must be within (0, 1] (got {})",
                fraction
            )));
        }
        Ok(ConcentrationCap {
            firm: firm.into(),
            fraction,
        })
    }

    /// Absolute limit in currency units for a given total investment.
    pub fn limit(&self, total_investment: f64) -> f64 {
        self.fraction * total_investment
    }
}

impl Default for ConcentrationCap {
    fn default() -> Self {
        ConcentrationCap {
            firm: FirmId::new("Puma"),
            fraction: PUMA_MAX_SHARE,
        }
    }
}

/// Split `pool` across `options` in proportion to weight.
///
/// Duplicate keys accumulate. Every weight must be positive and finite.
pub fn allocate<K>(pool: f64, options: &[(K, f64)]) -> Result<BTreeMap<K, f64>>
where
    K: Ord + Clone + Display,
{
    if !pool.is_finite() {
        return Err(ValidationError::NonFiniteAmount.into());
    }
    if pool < 0.0 {
        return Err(ValidationError::NegativeAmount(pool).into());
    }
    if options.is_empty() {
        return Err(Error::empty_options("an empty option set"));
    }
    for (key, weight) in options {
        if !(weight.is_finite() && *weight > 0.0) {
            return Err(ValidationError::NonPositiveWeight {
                key: key.to_string(),
                weight: *weight,
            }
            .into());
        }
    }

    let total_weight: f64 = options.iter().map(|(_, w)| w).sum();

    // The last option takes the remainder so the shares sum to the pool exactly.
    let mut allocations = BTreeMap::new();
    let mut assigned = 0.0;
    for (i, (key, weight)) in options.iter().enumerate() {
        let share = if i + 1 == options.len() {
            (pool - assigned).max(0.0)
        } else {
            pool * (weight / total_weight)
        };
        assigned += share;
        *allocations.entry(key.clone()).or_insert(0.0) += share;
    }
    Ok(allocations)
}

/// Hold `firm` to at most `cap`, handing the excess to every other offering in
/// proportion to its effective weight (not its current allocation).
///
/// When the firm holds several offerings they are scaled down together so that their
/// sum is exactly `cap`. Allocations at or under the cap are returned unchanged.
pub fn cap_firm(
    mut allocations: BTreeMap<OfferingKey, f64>,
    weights: &BTreeMap<OfferingKey, f64>,
    firm: &FirmId,
    cap: f64,
) -> Result<BTreeMap<OfferingKey, f64>> {
    let capped: Vec<OfferingKey> = allocations
        .keys()
        .filter(|k| &k.firm == firm)
        .cloned()
        .collect();
    let firm_total: f64 = capped.iter().map(|k| allocations[k]).sum();

    if capped.is_empty() || firm_total <= cap {
        return Ok(allocations);
    }

    let others: Vec<(OfferingKey, f64)> = allocations
        .keys()
        .filter(|k| &k.firm != firm)
        .map(|k| (k.clone(), weights.get(k).copied().unwrap_or(0.0)))
        .collect();
    let other_weight: f64 = others.iter().map(|(_, w)| w).sum();

    if others.is_empty() || other_weight <= 0.0 {
        return Err(Error::NoRedistributionTarget {
            firm: firm.to_string(),
        });
    }

    let excess = firm_total - cap;
    let scale = cap / firm_total;
    let mut assigned = 0.0;
    for (i, key) in capped.iter().enumerate() {
        let slot = allocations.entry(key.clone()).or_insert(0.0);
        if i + 1 == capped.len() {
            *slot = cap - assigned;
        } else {
            *slot *= scale;
            assigned += *slot;
        }
    }

    for (key, weight) in others {
        *allocations.entry(key).or_insert(0.0) += excess * (weight / other_weight);
    }

    Ok(allocations)
}

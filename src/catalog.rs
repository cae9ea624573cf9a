use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Offering labels look like "Property Lending (Low)".
static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(.+?)\s*\(\s*(Low|High)\s*\)\s*$").expect("valid label regex"));

/// Built once per process; never mutated afterwards.
static BUILTIN: Lazy<Catalog> = Lazy::new(builtin_catalog);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmId(String);

impl FirmId {
    pub fn new(name: impl Into<String>) -> Self {
        FirmId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FirmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FirmId {
    fn from(s: &str) -> Self {
        FirmId::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyType(String);

impl StrategyType {
    pub fn new(name: impl Into<String>) -> Self {
        StrategyType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StrategyType {
    fn from(s: &str) -> Self {
        StrategyType::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 2] = [RiskTier::Low, RiskTier::High];
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => f.write_str("Low"),
            RiskTier::High => f.write_str("High"),
        }
    }
}

/// Identifies one (firm, strategy type, risk tier) offering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfferingKey {
    pub firm: FirmId,
    pub strategy: StrategyType,
    pub risk: RiskTier,
}

impl fmt::Display for OfferingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.firm, self.strategy, self.risk)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmOffering {
    pub key: OfferingKey,
    /// Relative weight used for proportional allocation before biasing.
    pub base_weight: f64,
    /// Share of the firm's own product made up by this strategy (display only).
    pub mix: f64,
}

impl FirmOffering {
    pub fn new(firm: &str, strategy: &str, risk: RiskTier, mix: f64) -> Self {
        FirmOffering {
            key: OfferingKey {
                firm: FirmId::new(firm),
                strategy: StrategyType::new(strategy),
                risk,
            },
            base_weight: 1.0,
            mix,
        }
    }

    pub fn firm(&self) -> &FirmId {
        &self.key.firm
    }

    pub fn strategy(&self) -> &StrategyType {
        &self.key.strategy
    }

    pub fn risk(&self) -> RiskTier {
        self.key.risk
    }
}

/// What a bucket targets: every offering of a strategy type, or every offering of a risk tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Strategy(StrategyType),
    Risk(RiskTier),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Strategy(s) => write!(f, "strategy '{}'", s),
            Selector::Risk(r) => write!(f, "{} risk tier", r),
        }
    }
}

/// Split an offering label such as "Renewables (Low)" into its strategy type and risk tier.
pub fn parse_offering_label(label: &str) -> Result<(StrategyType, RiskTier)> {
    let caps = LABEL_PATTERN
        .captures(label)
        .ok_or_else(|| Error::Config(format!("malformed offering label '{}'", label)))?;

    let risk = match &caps[2] {
        "Low" => RiskTier::Low,
        _ => RiskTier::High,
    };

    Ok((StrategyType::new(&caps[1]), risk))
}

/// Static registry of what each firm offers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    offerings: Vec<FirmOffering>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate offerings and non-positive weights.
    pub fn new(offerings: Vec<FirmOffering>) -> Result<Self> {
        let mut seen = std::collections::BTreeSet::new();
        for offering in &offerings {
            if !seen.insert(offering.key.clone()) {
                return Err(Error::Config(format!("duplicate offering {}", offering.key)));
            }
            if !(offering.base_weight.is_finite() && offering.base_weight > 0.0) {
                return Err(Error::Config(format!(
                    "base weight for {} must be positive (got {})",
                    offering.key, offering.base_weight
                )));
            }
        }
        Ok(Catalog { offerings })
    }

    /// The catalog shipped with the tool.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn offerings(&self) -> &[FirmOffering] {
        &self.offerings
    }

    /// Offerings matching `selector`, in catalog order.
    ///
    /// A strategy type with no offerings yields an empty list. A risk tier with no
    /// offerings is an `UnknownSelector` error.
    pub fn offerings_for(&self, selector: &Selector) -> Result<Vec<&FirmOffering>> {
        let matches: Vec<&FirmOffering> = self
            .offerings
            .iter()
            .filter(|o| match selector {
                Selector::Strategy(s) => o.strategy() == s,
                Selector::Risk(r) => o.risk() == *r,
            })
            .collect();

        if matches.is_empty() {
            if let Selector::Risk(_) = selector {
                return Err(Error::UnknownSelector {
                    selector: selector.to_string(),
                });
            }
        }
        Ok(matches)
    }

    /// Offerings grouped by firm, firms sorted by name.
    pub fn by_firm(&self) -> BTreeMap<&FirmId, Vec<&FirmOffering>> {
        let mut grouped: BTreeMap<&FirmId, Vec<&FirmOffering>> = BTreeMap::new();
        for o in &self.offerings {
            grouped.entry(o.firm()).or_default().push(o);
        }
        grouped
    }

    pub fn contains_firm(&self, firm: &FirmId) -> bool {
        self.offerings.iter().any(|o| o.firm() == firm)
    }
}

fn builtin_catalog() -> Catalog {
    let third = 1.0 / 3.0;
    Catalog {
        offerings: vec![
            FirmOffering::new("Puma", "Property Lending", RiskTier::Low, 1.0),
            FirmOffering::new("Time", "Property Lending", RiskTier::High, 0.5),
            FirmOffering::new("Time", "Renewables", RiskTier::Low, 0.5),
            FirmOffering::new("Octopus", "Company Investing", RiskTier::High, 0.5),
            FirmOffering::new("Octopus", "Forestry", RiskTier::High, 0.5),
            FirmOffering::new("Downing", "Property Lending", RiskTier::Low, third),
            FirmOffering::new("Downing", "Renewables", RiskTier::Low, third),
            FirmOffering::new("Downing", "Forestry", RiskTier::High, third),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_once_into_typed_tiers() {
        let (strategy, risk) = parse_offering_label("Property Lending (Low)").unwrap();
        assert_eq!(strategy.as_str(), "Property Lending");
        assert_eq!(risk, RiskTier::Low);

        let (strategy, risk) = parse_offering_label("Forestry (High)").unwrap();
        assert_eq!(strategy.as_str(), "Forestry");
        assert_eq!(risk, RiskTier::High);
    }

    #[test]
    fn rejects_labels_without_a_tier() {
        assert!(matches!(parse_offering_label("Forestry"), Err(Error::Config(_))));
        assert!(matches!(parse_offering_label("Forestry (Medium)"), Err(Error::Config(_))));
    }

    #[test]
    fn strategy_selector_returns_every_tier() {
        let catalog = Catalog::builtin();
        let hits = catalog
            .offerings_for(&Selector::Strategy("Property Lending".into()))
            .unwrap();
        let firms: Vec<&str> = hits.iter().map(|o| o.firm().as_str()).collect();
        assert_eq!(firms, vec!["Puma", "Time", "Downing"]);
        assert!(hits.iter().any(|o| o.risk() == RiskTier::High));
    }

    #[test]
    fn unknown_strategy_is_empty_not_an_error() {
        let hits = Catalog::builtin()
            .offerings_for(&Selector::Strategy("Crypto".into()))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn risk_selector_with_no_offerings_is_unknown() {
        let catalog =
            Catalog::new(vec![FirmOffering::new("Puma", "Property Lending", RiskTier::Low, 1.0)])
                .unwrap();
        let err = catalog.offerings_for(&Selector::Risk(RiskTier::High)).unwrap_err();
        assert!(matches!(err, Error::UnknownSelector { .. }));
    }

    #[test]
    fn duplicate_offerings_are_rejected() {
        let dup = vec![
            FirmOffering::new("Puma", "Property Lending", RiskTier::Low, 1.0),
            FirmOffering::new("Puma", "Property Lending", RiskTier::Low, 1.0),
        ];
        assert!(matches!(Catalog::new(dup), Err(Error::Config(_))));
    }
}

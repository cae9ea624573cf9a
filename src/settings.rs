use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::allocator::ConcentrationCap;
use crate::bias::{default_rules, BiasRule, Biaser};
use crate::catalog::{parse_offering_label, Catalog, FirmOffering, OfferingKey, StrategyType};
use crate::error::{Error, Result};

/// One product line of a firm, e.g. `{"label": "Renewables (Low)", "mix": 0.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingSpec {
    pub label: String,
    /// Share of the firm's product this line makes up.
    pub mix: f64,
    /// Overrides the default base weight of 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmSpec {
    pub name: String,
    pub offerings: Vec<OfferingSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub strategy: StrategyType,
    pub percent: f64,
}

/// Values the front end starts from when the user gives none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiDefaults {
    pub investment: f64,
    pub product_targets: Vec<TargetSpec>,
    pub low_risk_percent: u32,
}

impl Default for UiDefaults {
    fn default() -> Self {
        let target = |strategy: &str, percent: f64| TargetSpec {
            strategy: StrategyType::new(strategy),
            percent,
        };
        UiDefaults {
            investment: 10_000.0,
            product_targets: vec![
                target("Property Lending", 30.0),
                target("Renewables", 30.0),
                target("Company Investing", 20.0),
                target("Forestry", 20.0),
            ],
            low_risk_percent: 60,
        }
    }
}

/// Tool configuration. Any field missing from a settings file keeps its built-in value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub firms: Vec<FirmSpec>,
    pub bias_rules: Vec<BiasRule>,
    pub concentration_cap: Option<ConcentrationCap>,
    pub defaults: UiDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        let firms = Catalog::builtin()
            .offerings()
            .iter()
            .fold(Vec::<FirmSpec>::new(), |mut firms, o| {
                let spec = OfferingSpec {
                    label: format!("{} ({})", o.strategy(), o.risk()),
                    mix: o.mix,
                    weight: None,
                };
                match firms.iter_mut().find(|f| f.name == o.firm().as_str()) {
                    Some(firm) => firm.offerings.push(spec),
                    None => firms.push(FirmSpec {
                        name: o.firm().to_string(),
                        offerings: vec![spec],
                    }),
                }
                firms
            });

        Settings {
            firms,
            bias_rules: default_rules(),
            concentration_cap: Some(ConcentrationCap::default()),
            defaults: UiDefaults::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file and validate them.
    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let catalog = self.catalog()?;
        self.biaser()?;

        if let Some(cap) = &self.concentration_cap {
            ConcentrationCap::new(cap.firm.clone(), cap.fraction)?;
            if !catalog.contains_firm(&cap.firm) {
                warn!("concentration cap names {} which offers nothing", cap.firm);
            }
        }

        if self.defaults.low_risk_percent > 100 {
            return Err(Error::Config(format!(
                "default low risk percent must be within [0, 100] (got {})",
                self.defaults.low_risk_percent
            )));
        }
        Ok(())
    }

    /// Parse offering labels into a typed catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        let mut offerings = Vec::new();
        for firm in &self.firms {
            for spec in &firm.offerings {
                let (strategy, risk) = parse_offering_label(&spec.label)?;
                offerings.push(FirmOffering {
                    key: OfferingKey {
                        firm: firm.name.as_str().into(),
                        strategy,
                        risk,
                    },
                    base_weight: spec.weight.unwrap_or(1.0),
                    mix: spec.mix,
                });
            }
        }
        Catalog::new(offerings)
    }

    pub fn biaser(&self) -> Result<Biaser> {
        Biaser::new(self.bias_rules.clone())
    }
}

//! Splits a lump sum across a fixed set of investment firms, either by target
//! exposure per strategy type or by target exposure per risk tier, while holding
//! any single capped firm to a maximum share of the total.

pub mod allocator;
pub mod bias;
pub mod catalog;
pub mod error;
pub mod exposure;
pub mod investor;
pub mod portfolio;
pub mod report;
pub mod settings;

pub use catalog::{Catalog, FirmId, RiskTier, Selector, StrategyType};
pub use error::{Error, Result, ValidationError};
pub use exposure::{AllocationResult, PortfolioSummary, RiskSplit};
pub use investor::{AllocationMode, InvestmentRequest, StrategyTargets};
pub use portfolio::Diversifier;
pub use settings::Settings;

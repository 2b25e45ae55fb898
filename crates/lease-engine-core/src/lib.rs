pub mod calendar;
pub mod config;
pub mod error;
pub mod lease_accounting;
pub mod time_value;
pub mod types;

#[cfg(feature = "consolidation")]
pub mod consolidation;

pub use config::EngineConfig;
pub use error::LeaseEngineError;
pub use lease_accounting::calculate::{calculate, CalculationRequest, LeaseCalculation};
pub use lease_accounting::classification::classify_lease;
pub use lease_accounting::contract::LeaseContract;
pub use lease_accounting::escalation::build_rental_periods;
pub use lease_accounting::maturity::maturity_analysis;
pub use types::*;

#[cfg(feature = "consolidation")]
pub use consolidation::{
    consolidate, ConsolidationRequest, LeaseBook, LeaseFilters, LeaseSource, PortfolioDisclosures,
};

/// Standard result type for all lease-engine operations
pub type LeaseEngineResult<T> = Result<T, LeaseEngineError>;

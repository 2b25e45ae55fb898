//! Request-scoped engine configuration.
//!
//! Every entry point takes an [`EngineConfig`] explicitly. Callers that do
//! not care use `EngineConfig::default()`, which rounds half-up to cents,
//! splits the liability twelve months forward of the evaluation date and
//! projects yearly until the schedule ends.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::calendar::{add_months, days_in_month};
use crate::error::LeaseEngineError;
use crate::types::{GaapStandard, Money};
use crate::LeaseEngineResult;

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfUp,
    HalfEven,
    Truncate,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::Truncate => RoundingStrategy::ToZero,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingPolicy {
    /// Decimal places for monetary amounts
    pub decimal_places: u32,
    pub strategy: RoundingMode,
    /// Decimal places for PV factors
    pub factor_places: u32,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            strategy: RoundingMode::HalfUp,
            factor_places: 10,
        }
    }
}

impl RoundingPolicy {
    pub fn money(&self, value: Money) -> Money {
        value.round_dp_with_strategy(self.decimal_places, self.strategy.strategy())
    }

    pub fn factor(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.factor_places, self.strategy.strategy())
    }
}

// ---------------------------------------------------------------------------
// Current / non-current split
// ---------------------------------------------------------------------------

/// Date from which the current-portion horizon is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitReference {
    /// The window's closing date
    #[default]
    EvaluationDate,
    /// The first lease anniversary on or after the closing date
    ContractAnniversary,
    /// The first fiscal year end on or after the closing date
    FiscalYearEnd { month: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Closing liability less the liability standing at the horizon mark
    #[default]
    LiabilityRunoff,
    /// Payments due inside the horizon, discounted back to the closing date
    DiscountedPayments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentPortionPolicy {
    pub reference: SplitReference,
    pub horizon_months: u32,
    pub method: SplitMethod,
}

impl Default for CurrentPortionPolicy {
    fn default() -> Self {
        Self {
            reference: SplitReference::EvaluationDate,
            horizon_months: 12,
            method: SplitMethod::LiabilityRunoff,
        }
    }
}

impl CurrentPortionPolicy {
    /// The date the current portion runs to, for balances at `closing`.
    pub fn horizon_mark(
        &self,
        closing: NaiveDate,
        lease_start: NaiveDate,
    ) -> LeaseEngineResult<NaiveDate> {
        let reference = match self.reference {
            SplitReference::EvaluationDate => closing,
            SplitReference::ContractAnniversary => {
                let mut years = closing.year() - lease_start.year();
                let mut anniversary = add_months(lease_start, years * 12)?;
                while anniversary < closing {
                    years += 1;
                    anniversary = add_months(lease_start, years * 12)?;
                }
                anniversary
            }
            SplitReference::FiscalYearEnd { month } => {
                if !(1..=12).contains(&month) {
                    return Err(LeaseEngineError::InvalidInput {
                        field: "current_split.reference.month".into(),
                        reason: "Fiscal year end month must be 1-12".into(),
                    });
                }
                let this_year = fiscal_year_end(closing.year(), month)?;
                if this_year >= closing {
                    this_year
                } else {
                    fiscal_year_end(closing.year() + 1, month)?
                }
            }
        };
        add_months(reference, self.horizon_months as i32)
    }
}

fn fiscal_year_end(year: i32, month: u32) -> LeaseEngineResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))
        .ok_or_else(|| LeaseEngineError::DateError(format!("fiscal year end {year}-{month:02}")))
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub enabled: bool,
    /// Length of each projection period in months
    pub period_months: u32,
    /// Stop after this many periods; `None` projects until the schedule ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_periods: Option<u32>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_months: 12,
            max_periods: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rounding: RoundingPolicy,
    pub current_split: CurrentPortionPolicy,
    pub projection: ProjectionConfig,
    /// Reporting basis used when a request does not name one
    pub gaap_standard: GaapStandard,
    /// Upper bound on consolidation workers; defaults to available cores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl EngineConfig {
    pub fn validate(&self) -> LeaseEngineResult<()> {
        if self.rounding.decimal_places > 10 {
            return Err(LeaseEngineError::InvalidInput {
                field: "rounding.decimal_places".into(),
                reason: "At most 10 decimal places are supported for money".into(),
            });
        }
        if self.rounding.factor_places > 20 {
            return Err(LeaseEngineError::InvalidInput {
                field: "rounding.factor_places".into(),
                reason: "At most 20 decimal places are supported for factors".into(),
            });
        }
        if self.projection.enabled && self.projection.period_months == 0 {
            return Err(LeaseEngineError::DegenerateInput {
                field: "projection.period_months".into(),
                reason: "Projection periods must span at least one month".into(),
            });
        }
        if let SplitReference::FiscalYearEnd { month } = self.current_split.reference {
            if !(1..=12).contains(&month) {
                return Err(LeaseEngineError::InvalidInput {
                    field: "current_split.reference.month".into(),
                    reason: "Fiscal year end month must be 1-12".into(),
                });
            }
        }
        if self.max_workers == Some(0) {
            return Err(LeaseEngineError::InvalidInput {
                field: "max_workers".into(),
                reason: "At least one worker is required".into(),
            });
        }
        Ok(())
    }
}

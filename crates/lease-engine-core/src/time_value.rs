use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LeaseEngineError;
use crate::types::{Money, Rate};
use crate::LeaseEngineResult;

const DAYS_PER_YEAR: Decimal = dec!(365);
const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Compounding interval in months for a payment frequency.
///
/// An explicit compounding period is honoured only when it matches the
/// payment frequency; otherwise quarterly and half-yearly payers compound
/// on their own cycle, annual-or-longer payers compound yearly, and every
/// other frequency compounds monthly.
pub fn compounding_interval(frequency_months: u32, compound_months: Option<u32>) -> u32 {
    match compound_months {
        Some(c) if c == frequency_months && c > 0 => c,
        _ => match frequency_months {
            3 => 3,
            6 => 6,
            f if f >= 12 => 12,
            _ => 1,
        },
    }
}

/// Day-accurate periodic compounding at a nominal annual rate.
///
/// A span of `d` days grows by `(1 + r*c/12)^((d/365) * 12/c)` where `r` is
/// the annual rate as a decimal and `c` the compounding interval in months.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compounding {
    /// Annual nominal rate as a decimal (0.10 = 10%)
    pub annual_rate: Rate,
    /// Compounding interval in months
    pub interval_months: u32,
}

impl Compounding {
    /// Build from an annual percentage (10 = 10%).
    pub fn from_percent(annual_percent: Rate, interval_months: u32) -> Self {
        Self {
            annual_rate: annual_percent / dec!(100),
            interval_months: interval_months.max(1),
        }
    }

    pub fn periodic_rate(&self) -> Rate {
        self.annual_rate * Decimal::from(self.interval_months) / MONTHS_PER_YEAR
    }

    /// Growth factor over `days` days.
    pub fn growth(&self, days: i64) -> LeaseEngineResult<Decimal> {
        if days == 0 || self.annual_rate.is_zero() {
            return Ok(Decimal::ONE);
        }
        let base = Decimal::ONE + self.periodic_rate();
        if base <= Decimal::ZERO {
            return Err(LeaseEngineError::InvalidInput {
                field: "rate".into(),
                reason: "Periodic rate must be greater than -100%".into(),
            });
        }
        let periods = Decimal::from(days) / DAYS_PER_YEAR * MONTHS_PER_YEAR
            / Decimal::from(self.interval_months);
        base.checked_powd(periods)
            .ok_or_else(|| LeaseEngineError::DegenerateInput {
                field: "rate".into(),
                reason: format!("Compounding over {days} days overflowed"),
            })
    }

    /// Discount factor over `days` days.
    pub fn discount(&self, days: i64) -> LeaseEngineResult<Decimal> {
        let growth = self.growth(days)?;
        if growth.is_zero() {
            return Err(LeaseEngineError::DivisionByZero {
                context: format!("discount factor over {days} days"),
            });
        }
        Ok(Decimal::ONE / growth)
    }
}

/// Present value of dated amounts, each `(days from valuation, amount)`.
/// Flows dated before the valuation date are not grown.
pub fn present_value(
    compounding: &Compounding,
    flows: impl IntoIterator<Item = (i64, Money)>,
) -> LeaseEngineResult<Money> {
    let mut pv = Decimal::ZERO;
    for (days, amount) in flows {
        pv += amount * compounding.discount(days.max(0))?;
    }
    Ok(pv)
}

//! Forward projection past the evaluation window.
//!
//! Projection resumes the same schedule walker the window was computed
//! from, grouping the remaining rows into fixed-length periods. Each period
//! closes at a month end and the last one is clamped to the final schedule
//! date.

use std::iter::Peekable;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::{add_months, end_of_month};
use crate::config::ProjectionConfig;
use crate::error::LeaseEngineError;
use crate::types::Money;
use crate::LeaseEngineResult;

use super::amortization::ScheduleRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// 1-based period number
    pub period_index: u32,
    pub start_date: NaiveDate,
    /// Period close
    pub date: NaiveDate,
    pub closing_liability: Money,
    pub closing_rou: Money,
    pub depreciation: Money,
    pub interest: Money,
    pub rent_paid: Money,
    pub aro_interest: Money,
}

/// Where projection starts and stops.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionBounds {
    /// Last date already reported; projection starts the day after
    pub after: NaiveDate,
    /// Final schedule date
    pub last_date: NaiveDate,
    /// Exit date of an early-terminated lease; balances are nil from here
    pub terminated_on: Option<NaiveDate>,
}

/// Group the rows still to come into projection periods.
///
/// `opening` is the last row already reported, so that periods with no
/// rows of their own carry its balances forward.
pub fn project<I>(
    rows: I,
    opening: Option<&ScheduleRow>,
    bounds: ProjectionBounds,
    config: &ProjectionConfig,
) -> LeaseEngineResult<Vec<Projection>>
where
    I: Iterator<Item = ScheduleRow>,
{
    if !config.enabled || bounds.after >= bounds.last_date {
        return Ok(Vec::new());
    }
    if config.period_months == 0 {
        return Err(LeaseEngineError::DegenerateInput {
            field: "projection.period_months".into(),
            reason: "Projection periods must span at least one month".into(),
        });
    }

    let mut rows: Peekable<I> = rows.peekable();
    let mut projections = Vec::new();
    let mut closing_liability = opening.map_or(Decimal::ZERO, |r| r.lease_liability);
    let mut closing_rou = opening.map_or(Decimal::ZERO, |r| r.rou_asset);
    let mut previous_close = bounds.after;

    while previous_close < bounds.last_date {
        if config
            .max_periods
            .is_some_and(|max| projections.len() as u32 >= max)
        {
            break;
        }
        let start_date = previous_close
            .checked_add_days(Days::new(1))
            .ok_or_else(|| LeaseEngineError::DateError(format!("no day after {previous_close}")))?;
        let close = end_of_month(add_months(previous_close, config.period_months as i32)?)?
            .min(bounds.last_date);

        let mut entry = Projection {
            period_index: projections.len() as u32 + 1,
            start_date,
            date: close,
            closing_liability,
            closing_rou,
            depreciation: Decimal::ZERO,
            interest: Decimal::ZERO,
            rent_paid: Decimal::ZERO,
            aro_interest: Decimal::ZERO,
        };
        while let Some(row) = rows.next_if(|r| r.date <= close) {
            entry.depreciation += row.depreciation;
            entry.interest += row.interest;
            entry.rent_paid += row.rent;
            entry.aro_interest += row.aro_interest;
            entry.closing_liability = row.lease_liability;
            entry.closing_rou = row.rou_asset;
        }
        if bounds.terminated_on.is_some_and(|t| t <= close) {
            entry.closing_liability = Decimal::ZERO;
            entry.closing_rou = Decimal::ZERO;
        }

        closing_liability = entry.closing_liability;
        closing_rou = entry.closing_rou;
        previous_close = close;
        projections.push(entry);
    }

    Ok(projections)
}

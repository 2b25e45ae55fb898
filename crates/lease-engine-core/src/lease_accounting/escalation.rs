//! Rental schedule construction.
//!
//! Expands a contract's base rental and escalation terms into contiguous
//! [`RentalPeriod`]s. An explicit rental schedule on the contract is the
//! source of truth and bypasses escalation entirely.
//!
//! Escalation cycles start at the escalation start date: cycle `k` is
//! billed at `base * (1 + pct/100)^k`, and cycle 0 also absorbs any stub
//! between the first payment and the escalation start. When the escalation
//! start falls between payment-grid dates (the grid is anchored on the
//! accrual day), the payment period straddling each escalation boundary is
//! billed at a day-weighted blend of the two cycle amounts.

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calendar::{
    add_months, payment_dates, resolve_payment_day, shifted_payment_day, DayOfMonth,
};
use crate::error::LeaseEngineError;
use crate::types::{Money, Rate};
use crate::LeaseEngineResult;

use super::contract::{LeaseContract, RentalPeriod};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on escalation cycles and grid steps. Generation stops at the
/// bound; payment dates past the last period are left uncovered.
const MAX_ESCALATION_ITERATIONS: u32 = 1000;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Everything the builder needs, detached from the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationInputs {
    pub lease_start: NaiveDate,
    pub lease_end: NaiveDate,
    pub base_amount: Money,
    pub escalation_start: Option<NaiveDate>,
    /// Percent per cycle (5 = 5%)
    pub escalation_percent: Rate,
    pub escalation_frequency_months: u32,
    pub payment_frequency_months: u32,
    pub first_payment_date: NaiveDate,
    pub accrual_day: u32,
    pub day_of_month: Option<DayOfMonth>,
}

impl EscalationInputs {
    pub fn from_contract(contract: &LeaseContract) -> Self {
        Self {
            lease_start: contract.start_date,
            lease_end: contract.end_date,
            base_amount: contract.base_rental,
            escalation_start: contract.escalation_start,
            escalation_percent: contract.escalation_percent.unwrap_or(Decimal::ZERO),
            escalation_frequency_months: contract.escalation_frequency(),
            payment_frequency_months: contract.payment_frequency(),
            first_payment_date: contract.first_payment(),
            accrual_day: contract.accrual_day_or_default(),
            day_of_month: contract.day_of_month,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Rental periods for a contract: its explicit schedule when present,
/// otherwise the escalated base rental.
pub fn build_rental_periods(contract: &LeaseContract) -> LeaseEngineResult<Vec<RentalPeriod>> {
    contract.validate()?;

    if let Some(explicit) = &contract.rental_schedule {
        let grid = payment_dates(
            contract.first_payment(),
            contract.end_date,
            contract.payment_frequency(),
            contract.day_of_month,
        )?;
        // Verbatim, only filling payment counts the caller left out
        return Ok(explicit
            .iter()
            .map(|p| RentalPeriod {
                payment_count: if p.payment_count == 0 {
                    payments_within(&grid, p.start, p.end)
                } else {
                    p.payment_count
                },
                ..p.clone()
            })
            .collect());
    }

    generate_rental_periods(&EscalationInputs::from_contract(contract))
}

/// Escalate a single base rental into contiguous rental periods.
pub fn generate_rental_periods(inputs: &EscalationInputs) -> LeaseEngineResult<Vec<RentalPeriod>> {
    if inputs.payment_frequency_months == 0 {
        return Err(LeaseEngineError::DegenerateInput {
            field: "frequency_months".into(),
            reason: "Payment frequency must be at least one month".into(),
        });
    }
    if inputs.lease_end < inputs.first_payment_date {
        return Err(LeaseEngineError::DegenerateInput {
            field: "end_date".into(),
            reason: "End date precedes the first payment".into(),
        });
    }

    let grid = payment_dates(
        inputs.first_payment_date,
        inputs.lease_end,
        inputs.payment_frequency_months,
        inputs.day_of_month,
    )?;

    let escalation_start = match inputs.escalation_start {
        Some(start) if inputs.escalation_percent > Decimal::ZERO && start <= inputs.lease_end => {
            start
        }
        _ => {
            return Ok(vec![RentalPeriod {
                start: inputs.first_payment_date,
                end: inputs.lease_end,
                payment_count: grid.len() as u32,
                amount: inputs.base_amount,
            }])
        }
    };
    if inputs.escalation_frequency_months == 0 {
        return Err(LeaseEngineError::DegenerateInput {
            field: "escalation_frequency_months".into(),
            reason: "Escalation frequency must be at least one month".into(),
        });
    }

    let accrual = DayOfMonth::Fixed(inputs.accrual_day);
    let anchor = escalation_anchor(inputs.lease_start, escalation_start, inputs.accrual_day)?;
    let grid_start = cycle_grid_start(anchor, escalation_start, inputs, accrual)?;
    let aligned = grid_start == escalation_start;

    let factor = Decimal::ONE + inputs.escalation_percent / dec!(100);
    let esc_freq = inputs.escalation_frequency_months as i32;
    let pay_freq = inputs.payment_frequency_months as i32;

    let mut spans: Vec<(NaiveDate, NaiveDate, Money)> = Vec::new();
    let mut cursor = inputs.first_payment_date;
    let mut amount = inputs.base_amount;
    let mut cycle = 1i32;

    while cursor <= inputs.lease_end {
        if cycle as u32 > MAX_ESCALATION_ITERATIONS {
            warn!(
                "Escalation stopped after {MAX_ESCALATION_ITERATIONS} cycles at {}",
                cursor
            );
            break;
        }
        let boundary = add_months(escalation_start, cycle * esc_freq)?;
        let next_amount = amount * factor;

        if aligned {
            let end = day_before(boundary)?.min(inputs.lease_end);
            if end >= cursor {
                spans.push((cursor, end, amount));
            }
            cursor = cursor.max(boundary);
        } else {
            let grid_boundary = shifted_payment_day(grid_start, cycle * esc_freq, accrual)?;
            let stub_end = day_before(grid_boundary)?.min(inputs.lease_end);
            if stub_end >= cursor {
                spans.push((cursor, stub_end, amount));
            }
            let straddle_close = day_before(shifted_payment_day(grid_boundary, pay_freq, accrual)?)?;
            let straddle_start = grid_boundary.max(cursor);
            let straddle_end = straddle_close.min(inputs.lease_end);
            if straddle_start <= straddle_end {
                let blended =
                    blended_amount(grid_boundary, straddle_close, boundary, amount, next_amount);
                spans.push((straddle_start, straddle_end, blended));
            }
            let after_straddle = straddle_close
                .checked_add_days(Days::new(1))
                .ok_or_else(|| LeaseEngineError::DateError("date overflow".into()))?;
            cursor = cursor.max(after_straddle);
        }

        amount = next_amount;
        cycle += 1;
    }

    Ok(spans
        .into_iter()
        .filter_map(|(start, end, amount)| {
            let payment_count = payments_within(&grid, start, end);
            (payment_count > 0).then_some(RentalPeriod {
                start,
                end,
                payment_count,
                amount,
            })
        })
        .collect())
}

/// Day-weighted rental for a payment period that straddles an escalation
/// boundary: days before the boundary at `amount_before`, the boundary day
/// and later at `amount_after`. Both period ends are inclusive.
pub fn blended_amount(
    period_start: NaiveDate,
    period_end: NaiveDate,
    cycle_boundary: NaiveDate,
    amount_before: Money,
    amount_after: Money,
) -> Money {
    let total_days = (period_end - period_start).num_days() + 1;
    if total_days <= 0 {
        return amount_after;
    }
    let days_before = (cycle_boundary - period_start).num_days().clamp(0, total_days);
    let days_after = total_days - days_before;
    (amount_before * Decimal::from(days_before) + amount_after * Decimal::from(days_after))
        / Decimal::from(total_days)
}

// ---------------------------------------------------------------------------
// Grid helpers
// ---------------------------------------------------------------------------

/// One year before the escalation-start year, in the lease-start month, on
/// the accrual day.
fn escalation_anchor(
    lease_start: NaiveDate,
    escalation_start: NaiveDate,
    accrual_day: u32,
) -> LeaseEngineResult<NaiveDate> {
    resolve_payment_day(
        escalation_start.year() - 1,
        lease_start.month(),
        DayOfMonth::Fixed(accrual_day),
    )
}

/// Last payment-grid date on or before the escalation start, stepping from
/// the anchor in payment-frequency strides.
fn cycle_grid_start(
    anchor: NaiveDate,
    escalation_start: NaiveDate,
    inputs: &EscalationInputs,
    accrual: DayOfMonth,
) -> LeaseEngineResult<NaiveDate> {
    let stride = inputs.payment_frequency_months as i32;
    let mut current = anchor;
    for step in 1..=MAX_ESCALATION_ITERATIONS as i32 {
        let next = shifted_payment_day(anchor, step * stride, accrual)?;
        if next > escalation_start {
            return Ok(current);
        }
        current = next;
    }
    Err(LeaseEngineError::DegenerateInput {
        field: "frequency_months".into(),
        reason: "Escalation start could not be placed on the payment grid".into(),
    })
}

fn day_before(date: NaiveDate) -> LeaseEngineResult<NaiveDate> {
    date.pred_opt()
        .ok_or_else(|| LeaseEngineError::DateError(format!("no day before {date}")))
}

fn payments_within(grid: &[NaiveDate], start: NaiveDate, end: NaiveDate) -> u32 {
    grid.iter().filter(|d| **d >= start && **d <= end).count() as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

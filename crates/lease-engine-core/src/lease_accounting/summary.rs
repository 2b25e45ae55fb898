//! Opening/closing balances and period totals for an evaluation window.
//!
//! A window `[from, to]` opens on the balances standing at `from - 1` and
//! closes on those standing at `to`. Activity is every schedule row dated
//! after `from - 1` up to and including `to`. Because the schedule's
//! movements are differences of rounded balances, the roll-forwards
//!
//! ```text
//! liability: opening + initial + interest - rent - derecognised = closing
//! ROU:       opening + initial + change - depreciation - impairment - derecognised = closing
//! ```
//!
//! hold to the cent.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{CurrentPortionPolicy, SplitMethod};
use crate::error::LeaseEngineError;
use crate::types::{Currency, GaapStandard, Money, Rate};
use crate::LeaseEngineResult;

use super::amortization::{AmortizationPlan, ScheduleRow, TerminationOutcome};
use super::classification::LeaseClassification;
use super::contract::LeaseContract;
use super::projection::Projection;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Balances standing at a date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub lease_liability: Money,
    pub current_liability: Money,
    pub non_current_liability: Money,
    pub rou_asset: Money,
    pub aro_provision: Money,
    pub security_deposit: Money,
    pub security_deposit_current: Money,
    pub security_deposit_non_current: Money,
}

/// Movements over a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub interest: Money,
    pub principal: Money,
    pub rent_paid: Money,
    pub depreciation: Money,
    pub impairment: Money,
    pub change_in_rou: Money,
    pub aro_interest: Money,
    pub aro_revisions: Money,
    pub security_deposit_interest: Money,
    pub security_deposit_additions: Money,
    pub liability_derecognised: Money,
    pub rou_derecognised: Money,
    pub security_deposit_derecognised: Money,
    /// Rent expensed under the short-term exemption
    pub short_term_expense: Money,
    /// Positive is a gain
    pub gain_loss: Money,
}

impl PeriodTotals {
    fn accumulate(&mut self, row: &ScheduleRow) {
        self.interest += row.interest;
        self.principal += row.principal;
        self.rent_paid += row.rent;
        self.depreciation += row.depreciation;
        self.impairment += row.impairment;
        self.change_in_rou += row.change_in_rou;
        self.aro_interest += row.aro_interest;
        self.aro_revisions += row.aro_revision;
        self.security_deposit_interest += row.security_deposit_interest;
        self.security_deposit_additions += row.security_deposit_additions;
    }

    /// Totals over any run of rows.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ScheduleRow>) -> Self {
        let mut totals = Self::default();
        for row in rows {
            totals.accumulate(row);
        }
        totals
    }
}

/// Amounts recognised at commencement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialRecognition {
    pub date: NaiveDate,
    pub lease_liability: Money,
    pub rou_asset: Money,
    pub aro_provision: Money,
    pub security_deposit: Money,
}

/// Balances and activity for one window on one basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub opening: BalanceSnapshot,
    pub closing: BalanceSnapshot,
    pub totals: PeriodTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_recognition: Option<InitialRecognition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationOutcome>,
    pub remaining_rou_life_days: i64,
    /// Measured under the short-term exemption: rent expensed, nothing capitalised
    pub short_term: bool,
}

// ---------------------------------------------------------------------------
// Window summaries
// ---------------------------------------------------------------------------

fn day_before(date: NaiveDate) -> LeaseEngineResult<NaiveDate> {
    date.checked_sub_days(Days::new(1))
        .ok_or_else(|| LeaseEngineError::DateError(format!("no day before {date}")))
}

fn activity<'a>(
    rows: &'a [ScheduleRow],
    after: NaiveDate,
    through: NaiveDate,
) -> impl Iterator<Item = &'a ScheduleRow> {
    rows.iter()
        .filter(move |r| r.date > after && r.date <= through)
}

/// Summarise `[from, to]` from a schedule walked at least through `to`.
pub fn summarize_window(
    plan: &AmortizationPlan,
    rows: &[ScheduleRow],
    from: NaiveDate,
    to: NaiveDate,
    policy: &CurrentPortionPolicy,
) -> LeaseEngineResult<WindowSummary> {
    if to < from {
        return Err(LeaseEngineError::DegenerateInput {
            field: "to_date".into(),
            reason: "Window closes before it opens".into(),
        });
    }
    let open_mark = day_before(from)?;
    let in_window = |date: NaiveDate| date > open_mark && date <= to;

    let opening = snapshot_at(plan, rows, open_mark, policy)?;
    let closing = snapshot_at(plan, rows, to, policy)?;
    let mut totals = PeriodTotals::from_rows(activity(rows, open_mark, to));

    let initial_recognition = in_window(plan.lease_start()).then(|| InitialRecognition {
        date: plan.lease_start(),
        lease_liability: plan.initial_liability(),
        rou_asset: plan.initial_rou(),
        aro_provision: plan.initial_aro_provision(),
        security_deposit: plan.initial_security_deposit(),
    });

    let termination = if plan.is_terminated() && in_window(plan.exit_date()) {
        rows.iter()
            .find(|r| r.date == plan.exit_date())
            .and_then(|r| plan.termination_outcome(r))
    } else {
        None
    };
    if let Some(outcome) = &termination {
        totals.liability_derecognised = outcome.liability_derecognised;
        totals.rou_derecognised = outcome.rou_derecognised;
        totals.security_deposit_derecognised = outcome.security_deposit_carrying;
        totals.gain_loss = outcome.gain_loss;
    }

    let remaining_rou_life_days = if plan.is_terminated() && plan.exit_date() <= to {
        0
    } else {
        (plan.depreciation_end() - to).num_days().max(0)
    };

    Ok(WindowSummary {
        from_date: from,
        to_date: to,
        opening,
        closing,
        totals,
        initial_recognition,
        termination,
        remaining_rou_life_days,
        short_term: false,
    })
}

/// Summarise a lease measured under the short-term exemption: rent paid in
/// the window is expensed and no balances are carried.
pub fn summarize_short_term(
    rows: &[ScheduleRow],
    from: NaiveDate,
    to: NaiveDate,
) -> LeaseEngineResult<WindowSummary> {
    let open_mark = day_before(from)?;
    let rent: Money = activity(rows, open_mark, to).map(|r| r.rent).sum();
    Ok(WindowSummary {
        from_date: from,
        to_date: to,
        opening: BalanceSnapshot::default(),
        closing: BalanceSnapshot::default(),
        totals: PeriodTotals {
            rent_paid: rent,
            short_term_expense: rent,
            ..PeriodTotals::default()
        },
        initial_recognition: None,
        termination: None,
        remaining_rou_life_days: 0,
        short_term: true,
    })
}

/// Balances standing at the end of `date`.
fn snapshot_at(
    plan: &AmortizationPlan,
    rows: &[ScheduleRow],
    date: NaiveDate,
    policy: &CurrentPortionPolicy,
) -> LeaseEngineResult<BalanceSnapshot> {
    if date < plan.lease_start() {
        return Ok(BalanceSnapshot::default());
    }
    let idx = rows.partition_point(|r| r.date <= date);
    let Some(row) = idx.checked_sub(1).and_then(|i| rows.get(i)) else {
        return Ok(BalanceSnapshot::default());
    };

    let exited = plan.is_terminated() && plan.exit_date() <= date;
    if exited {
        return Ok(BalanceSnapshot {
            aro_provision: row.aro_provision,
            ..BalanceSnapshot::default()
        });
    }

    let mark = policy.horizon_mark(date, plan.lease_start())?;
    let liability = row.lease_liability;
    let exits_within = plan.is_terminated() && plan.exit_date() <= mark;
    let due = if exits_within {
        liability
    } else {
        match policy.method {
            SplitMethod::LiabilityRunoff => liability - plan.liability_after(mark)?,
            SplitMethod::DiscountedPayments => plan.discounted_payments(date, mark)?,
        }
    };
    let current = due.max(Decimal::ZERO).min(liability);

    let deposit = row.security_deposit_pv;
    let deposit_due = exits_within || plan.lease_end() <= mark;
    let deposit_current = if deposit_due { deposit } else { Decimal::ZERO };

    Ok(BalanceSnapshot {
        lease_liability: liability,
        current_liability: current,
        non_current_liability: liability - current,
        rou_asset: row.rou_asset,
        aro_provision: row.aro_provision,
        security_deposit: deposit,
        security_deposit_current: deposit_current,
        security_deposit_non_current: deposit - deposit_current,
    })
}

// ---------------------------------------------------------------------------
// Lease result
// ---------------------------------------------------------------------------

/// Summary of one lease over the requested window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseResult {
    pub lease_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    pub currency: Currency,
    /// Annual percent
    pub borrowing_rate: Rate,
    pub gaap_standard: GaapStandard,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub opening: BalanceSnapshot,
    pub closing: BalanceSnapshot,
    pub totals: PeriodTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_recognition: Option<InitialRecognition>,
    pub gain_loss: Money,
    pub remaining_rou_life_days: i64,
    pub short_term: bool,
    pub classification: LeaseClassification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationOutcome>,
    pub projections: Vec<Projection>,
}

impl LeaseResult {
    pub fn new(
        contract: &LeaseContract,
        standard: GaapStandard,
        window: WindowSummary,
        classification: LeaseClassification,
        projections: Vec<Projection>,
    ) -> Self {
        Self {
            lease_id: contract.lease_id.clone(),
            description: contract.description.clone(),
            asset_class: contract.asset_class.clone(),
            asset_code: contract.asset_code.clone(),
            cost_center: contract.cost_center.clone(),
            profit_center: contract.profit_center.clone(),
            entity_name: contract.entity_name.clone(),
            currency: contract.currency.clone(),
            borrowing_rate: contract.borrowing_rate.unwrap_or(Decimal::ZERO),
            gaap_standard: standard,
            from_date: window.from_date,
            to_date: window.to_date,
            opening: window.opening,
            closing: window.closing,
            gain_loss: window.totals.gain_loss,
            totals: window.totals,
            initial_recognition: window.initial_recognition,
            remaining_rou_life_days: window.remaining_rou_life_days,
            short_term: window.short_term,
            classification,
            termination: window.termination,
            projections,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

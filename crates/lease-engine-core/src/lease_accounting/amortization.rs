//! Day-accurate lease liability and ROU asset schedule.
//!
//! An [`AmortizationPlan`] fixes everything about a run up front: the cash
//! flows, the boundary dates and the compounding factors at each boundary.
//! Walking the plan with [`ScheduleWalker`] then produces one
//! [`ScheduleRow`] per boundary. The walker is an ordinary iterator, so a
//! caller can stop at the evaluation date and later resume it to project
//! forward without recomputing anything.
//!
//! Balances are carried unrounded. Each row emits rounded balances and
//! derives its movements as differences of consecutive rounded balances,
//! so every column telescopes exactly at the configured precision.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::{month_ends_between, payment_dates};
use crate::config::RoundingPolicy;
use crate::error::LeaseEngineError;
use crate::time_value::{compounding_interval, present_value, Compounding};
use crate::types::{GaapStandard, Money};
use crate::LeaseEngineResult;

use super::classification::LeaseClassification;
use super::contract::{AroTerms, LeaseContract, RentalPeriod, TransitionOption};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One schedule boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub date: NaiveDate,
    /// Rent paid on this date, including any purchase option
    pub rent: Money,
    pub principal: Money,
    pub interest: Money,
    /// Liability after this row's payment
    pub lease_liability: Money,
    /// Undiscounted rent still to be paid after this row
    pub remaining_balance: Money,
    /// Discount factor from commencement to this date
    pub pv_factor: Decimal,
    pub pv_of_rent: Money,
    pub rou_asset: Money,
    pub depreciation: Money,
    pub impairment: Money,
    pub change_in_rou: Money,
    pub security_deposit_pv: Money,
    /// PV of deposit increases made on this date
    pub security_deposit_additions: Money,
    pub security_deposit_interest: Money,
    pub aro_gross: Money,
    pub aro_interest: Money,
    /// Remeasurement of the ARO provision from a revised estimate
    pub aro_revision: Money,
    pub aro_provision: Money,
}

/// Derecognition of a lease that exits before its contractual end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    pub date: NaiveDate,
    pub liability_derecognised: Money,
    pub rou_derecognised: Money,
    pub penalty: Money,
    /// Undiscounted deposit returned on exit
    pub security_deposit_refund: Money,
    /// Carrying amount of the deposit at exit
    pub security_deposit_carrying: Money,
    /// Positive is a gain
    pub gain_loss: Money,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Compounding factors at a boundary date.
#[derive(Debug, Clone)]
struct Node {
    date: NaiveDate,
    /// Growth of the lease discount rate from commencement
    growth: Decimal,
    /// Discount factor from this date to lease end at the deposit rate
    security_discount: Decimal,
    /// Discount factor from this date to lease end at the ARO rate
    aro_discount: Decimal,
}

#[derive(Debug, Clone)]
pub struct AmortizationPlan {
    start: NaiveDate,
    end: NaiveDate,
    exit: NaiveDate,
    depreciation_end: NaiveDate,
    nodes: Vec<Node>,
    /// Rounded cash flows keyed by date
    flows: BTreeMap<NaiveDate, Money>,
    total_rent: Money,
    discount: Compounding,
    opening_deposit: Money,
    /// Deposit increases after commencement
    increases: Vec<(NaiveDate, Money)>,
    aro: Option<AroTerms>,
    impairments: BTreeMap<NaiveDate, Money>,
    rou_reset: Option<NaiveDate>,
    prepaid: Money,
    residual: Money,
    penalty: Money,
    terminated: bool,
    single_lease_cost: bool,
    rounding: RoundingPolicy,
    initial_liability: Money,
    initial_rou: Money,
    initial_security: Money,
    initial_aro: Money,
    warnings: Vec<String>,
}

/// Present value at commencement of every scheduled payment.
pub fn initial_lease_liability(
    contract: &LeaseContract,
    periods: &[RentalPeriod],
) -> LeaseEngineResult<Money> {
    let rounding = RoundingPolicy::default();
    let (flows, _) = cash_flows(contract, periods, &rounding)?;
    let pv = present_value(
        &lease_compounding(contract),
        flows
            .iter()
            .map(|(date, amount)| ((*date - contract.start_date).num_days(), *amount)),
    )?;
    Ok(rounding.money(pv))
}

fn lease_compounding(contract: &LeaseContract) -> Compounding {
    let interval = compounding_interval(
        contract.payment_frequency(),
        contract.compound_months.map(|c| c.max(0) as u32),
    );
    Compounding::from_percent(contract.borrowing_rate.unwrap_or(Decimal::ZERO), interval)
}

/// Payment flows on the contract's grid, plus the purchase option on the end
/// date. Returns the flows and how many grid dates no rental period covers.
fn cash_flows(
    contract: &LeaseContract,
    periods: &[RentalPeriod],
    rounding: &RoundingPolicy,
) -> LeaseEngineResult<(BTreeMap<NaiveDate, Money>, usize)> {
    let grid = payment_dates(
        contract.first_payment(),
        contract.end_date,
        contract.payment_frequency(),
        contract.day_of_month,
    )?;
    let mut flows = BTreeMap::new();
    let mut uncovered = 0;
    for date in grid {
        match periods.iter().find(|p| p.covers(date)) {
            Some(period) => {
                *flows.entry(date).or_insert(Decimal::ZERO) += rounding.money(period.amount)
            }
            None => uncovered += 1,
        }
    }
    if contract.flags.bargain_purchase {
        if let Some(price) = contract.purchase_option_price {
            *flows.entry(contract.end_date).or_insert(Decimal::ZERO) += rounding.money(price);
        }
    }
    Ok((flows, uncovered))
}

fn day_before(date: NaiveDate) -> LeaseEngineResult<NaiveDate> {
    date.checked_sub_days(Days::new(1))
        .ok_or_else(|| LeaseEngineError::DateError(format!("no day before {date}")))
}

impl AmortizationPlan {
    /// Build a plan for one reporting basis.
    ///
    /// `observations` are extra boundary dates the caller needs balances at,
    /// typically the day before a window opens and the window close. Dates
    /// outside the schedule are ignored.
    pub fn new(
        contract: &LeaseContract,
        periods: &[RentalPeriod],
        classification: &LeaseClassification,
        standard: GaapStandard,
        rounding: &RoundingPolicy,
        observations: &[NaiveDate],
    ) -> LeaseEngineResult<Self> {
        let start = contract.start_date;
        let end = contract.end_date;
        let exit = contract.exit_date();
        let terminated = contract.is_terminated_early();
        let depreciation_end = classification.depreciation_end;
        let last_date = if terminated {
            exit
        } else {
            end.max(depreciation_end)
        };

        let (flows, uncovered) = cash_flows(contract, periods, rounding)?;
        let mut warnings = Vec::new();
        if uncovered > 0 {
            warnings.push(format!(
                "{uncovered} payment date(s) fall outside the rental schedule and carry no rent"
            ));
        }
        let total_rent: Money = flows.values().copied().sum();

        // -- Boundaries --
        let mut dates = BTreeSet::new();
        dates.insert(start);
        dates.insert(end);
        dates.insert(depreciation_end);
        dates.insert(exit);
        dates.extend(flows.keys().copied());
        dates.extend(month_ends_between(start, last_date)?);
        dates.extend(contract.impairments.iter().map(|i| i.date));
        dates.extend(contract.security_increases.iter().map(|i| i.date));
        if let Some(aro) = &contract.aro {
            dates.extend(aro.revisions.iter().map(|r| r.effective_date));
        }
        let rou_reset = match &contract.transition {
            Some(t) if t.option == TransitionOption::ModifiedB => {
                let reset = day_before(t.date)?;
                dates.insert(reset);
                Some(reset)
            }
            _ => None,
        };
        dates.extend(observations.iter().copied());
        dates.retain(|d| *d >= start && *d <= last_date);

        // -- Rates --
        let discount = lease_compounding(contract);
        let security_rate = contract
            .security_discount_rate
            .filter(|r| !r.is_zero())
            .map(|r| Compounding::from_percent(r, 1));
        let aro_rate = contract
            .aro
            .as_ref()
            .and_then(|a| a.discount_rate)
            .filter(|r| !r.is_zero())
            .map(|r| Compounding::from_percent(r, 1));

        let to_end = |rate: &Option<Compounding>, date: NaiveDate| -> LeaseEngineResult<Decimal> {
            match rate {
                Some(c) => c.discount((end - date).num_days().max(0)),
                None => Ok(Decimal::ONE),
            }
        };

        let mut nodes = Vec::with_capacity(dates.len());
        for date in dates {
            nodes.push(Node {
                date,
                growth: discount.growth((date - start).num_days())?,
                security_discount: to_end(&security_rate, date)?,
                aro_discount: to_end(&aro_rate, date)?,
            });
        }

        // -- Initial recognition --
        let initial_liability = present_value(
            &discount,
            flows
                .iter()
                .map(|(date, amount)| ((*date - start).num_days(), *amount)),
        )?;

        let mut increases: Vec<(NaiveDate, Money)> = contract
            .security_increases
            .iter()
            .map(|i| (i.date, i.amount))
            .collect();
        increases.sort_by_key(|(date, _)| *date);

        let opening_deposit = contract.security_deposit.unwrap_or(Decimal::ZERO);
        let initial_security = opening_deposit * to_end(&security_rate, start)?;

        let initial_aro = match &contract.aro {
            Some(aro) => aro.gross_at(start) * to_end(&aro_rate, start)?,
            None => Decimal::ZERO,
        };

        let prepaid = contract.prepaid_rent.unwrap_or(Decimal::ZERO);
        let initial_rou = match contract.sublease_rou {
            Some(rou) if contract.flags.sublease => rou,
            _ => {
                initial_liability
                    + contract.initial_direct_costs.unwrap_or(Decimal::ZERO)
                    + initial_aro
                    - contract.lease_incentive.unwrap_or(Decimal::ZERO)
                    + prepaid
                    + (opening_deposit - initial_security)
            }
        };

        let mut impairments = BTreeMap::new();
        for imp in &contract.impairments {
            *impairments.entry(imp.date).or_insert(Decimal::ZERO) += imp.amount;
        }

        Ok(Self {
            start,
            end,
            exit,
            depreciation_end,
            nodes,
            flows,
            total_rent,
            discount,
            opening_deposit,
            increases,
            aro: contract.aro.clone(),
            impairments,
            rou_reset,
            prepaid,
            residual: contract.residual_value.unwrap_or(Decimal::ZERO),
            penalty: contract.termination_penalty.unwrap_or(Decimal::ZERO),
            terminated,
            single_lease_cost: classification.uses_single_lease_cost(standard),
            rounding: rounding.clone(),
            initial_liability,
            initial_rou,
            initial_security,
            initial_aro,
            warnings,
        })
    }

    pub fn lease_start(&self) -> NaiveDate {
        self.start
    }

    pub fn lease_end(&self) -> NaiveDate {
        self.end
    }

    pub fn exit_date(&self) -> NaiveDate {
        self.exit
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn depreciation_end(&self) -> NaiveDate {
        self.depreciation_end
    }

    /// Date of the final schedule row.
    pub fn last_date(&self) -> NaiveDate {
        self.nodes.last().map_or(self.start, |n| n.date)
    }

    pub fn boundary_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.nodes.iter().map(|n| n.date)
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn initial_liability(&self) -> Money {
        self.rounding.money(self.initial_liability)
    }

    pub fn initial_rou(&self) -> Money {
        self.rounding.money(self.initial_rou)
    }

    pub fn initial_security_deposit(&self) -> Money {
        self.rounding.money(self.initial_security)
    }

    pub fn initial_aro_provision(&self) -> Money {
        self.rounding.money(self.initial_aro)
    }

    /// Liability standing after all payments on or before `date`.
    pub fn liability_after(&self, date: NaiveDate) -> LeaseEngineResult<Money> {
        self.discounted_flows(date, |d| d > date)
    }

    /// Payments in `(as_of, through]`, discounted back to `as_of`.
    pub fn discounted_payments(
        &self,
        as_of: NaiveDate,
        through: NaiveDate,
    ) -> LeaseEngineResult<Money> {
        self.discounted_flows(as_of, |d| d > as_of && d <= through)
    }

    fn discounted_flows(
        &self,
        as_of: NaiveDate,
        include: impl Fn(NaiveDate) -> bool,
    ) -> LeaseEngineResult<Money> {
        let pv = present_value(
            &self.discount,
            self.flows
                .iter()
                .filter(|(d, _)| include(**d))
                .map(|(date, amount)| ((*date - as_of).num_days(), *amount)),
        )?;
        Ok(self.rounding.money(pv))
    }

    /// Undiscounted deposits lodged on or before `date`.
    pub fn security_deposit_gross(&self, date: NaiveDate) -> Money {
        if date < self.start {
            return Decimal::ZERO;
        }
        self.opening_deposit + self.lodged_between(self.start, date)
    }

    /// Increases lodged on dates in `[from, to]`.
    fn lodged_between(&self, from: NaiveDate, to: NaiveDate) -> Money {
        self.increases
            .iter()
            .filter(|(d, _)| *d >= from && *d <= to)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Derecognition at the exit row of an early-terminated lease.
    pub fn termination_outcome(&self, row: &ScheduleRow) -> Option<TerminationOutcome> {
        if !self.terminated || row.date != self.exit {
            return None;
        }
        let refund = self.rounding.money(self.security_deposit_gross(row.date));
        let penalty = self.rounding.money(self.penalty);
        let gain_loss = row.lease_liability - row.rou_asset - penalty
            + (refund - row.security_deposit_pv);
        Some(TerminationOutcome {
            date: row.date,
            liability_derecognised: row.lease_liability,
            rou_derecognised: row.rou_asset,
            penalty,
            security_deposit_refund: refund,
            security_deposit_carrying: row.security_deposit_pv,
            gain_loss,
        })
    }

    pub fn walk(&self) -> ScheduleWalker<'_> {
        let aro_gross = self
            .aro
            .as_ref()
            .map_or(Decimal::ZERO, |a| a.gross_at(self.start));
        let aro_discount = self.nodes.first().map_or(Decimal::ONE, |n| n.aro_discount);
        ScheduleWalker {
            plan: self,
            index: 0,
            state: WalkState {
                date: self.start,
                growth: Decimal::ONE,
                liability: self.initial_liability,
                liability_r: self.rounding.money(self.initial_liability),
                remaining_rent: self.total_rent,
                rou: self.initial_rou,
                rou_r: self.rounding.money(self.initial_rou),
                security_gross: self.opening_deposit,
                security: self.initial_security,
                security_r: self.rounding.money(self.initial_security),
                aro_gross,
                aro_discount,
                aro_r: self.rounding.money(self.initial_aro),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// Running balances after the last emitted row.
#[derive(Debug, Clone)]
struct WalkState {
    date: NaiveDate,
    growth: Decimal,
    liability: Money,
    liability_r: Money,
    remaining_rent: Money,
    rou: Money,
    rou_r: Money,
    security_gross: Money,
    security: Money,
    security_r: Money,
    aro_gross: Money,
    aro_discount: Decimal,
    aro_r: Money,
}

/// Resumable iterator over a plan's schedule rows.
#[derive(Debug, Clone)]
pub struct ScheduleWalker<'a> {
    plan: &'a AmortizationPlan,
    index: usize,
    state: WalkState,
}

impl ScheduleWalker<'_> {
    /// Date of the last emitted row, or commencement before the first.
    pub fn position(&self) -> NaiveDate {
        self.state.date
    }

    fn step(&mut self, node: &Node) -> ScheduleRow {
        let plan = self.plan;
        let round = |v: Money| plan.rounding.money(v);
        let prev = &self.state;
        let date = node.date;

        // -- Liability --
        let rent = plan.flows.get(&date).copied().unwrap_or(Decimal::ZERO);
        let grown = prev.liability * node.growth / prev.growth;
        let interest_exact = grown - prev.liability;
        let remaining_rent = prev.remaining_rent - rent;
        let liability = if remaining_rent <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            grown - rent
        };
        let liability_r = round(liability);
        let principal = prev.liability_r - liability_r;
        let interest = rent - principal;

        // -- Depreciation --
        let depreciation_exact = if prev.date >= plan.depreciation_end {
            Decimal::ZERO
        } else {
            let days = Decimal::from((date.min(plan.depreciation_end) - prev.date).num_days());
            let days_remaining = Decimal::from((plan.depreciation_end - prev.date).num_days());
            let depreciable = (prev.rou - plan.residual).max(Decimal::ZERO);
            if plan.single_lease_cost {
                // Straight-line total cost less the interest accrued
                let remaining_interest =
                    (prev.remaining_rent - prev.liability).max(Decimal::ZERO);
                let cost = (depreciable + remaining_interest) * days / days_remaining;
                (cost - interest_exact).max(Decimal::ZERO).min(depreciable)
            } else {
                depreciable * days / days_remaining
            }
        };
        let after_depreciation = prev.rou - depreciation_exact;

        let impairment_exact = plan
            .impairments
            .get(&date)
            .map_or(Decimal::ZERO, |amount| {
                (*amount).min(after_depreciation.max(Decimal::ZERO))
            });

        // -- ARO --
        let aro_gross = plan.aro.as_ref().map_or(Decimal::ZERO, |a| a.gross_at(date));
        let aro_revision_exact = (aro_gross - prev.aro_gross) * node.aro_discount;
        let aro_provision = aro_gross * node.aro_discount;
        let aro_r = round(aro_provision);
        let aro_revision = round(aro_revision_exact);
        let aro_interest = aro_r - prev.aro_r - aro_revision;

        // -- Security deposit --
        let lodged = plan.lodged_between(date, date);
        let security_gross = prev.security_gross + lodged;
        let security = security_gross * node.security_discount;
        let additions_exact = lodged * node.security_discount;
        let security_r = round(security);
        let additions = round(additions_exact);
        let security_interest = security_r - prev.security_r - additions;

        // -- ROU --
        let mut change_exact = aro_revision_exact + (lodged - additions_exact);
        let mut rou = after_depreciation - impairment_exact + change_exact;
        if plan.rou_reset == Some(date) {
            let target = liability + plan.prepaid;
            change_exact += target - rou;
            rou = target;
        }
        let rou_r = round(rou);
        let change_in_rou = round(change_exact);
        let impairment = round(impairment_exact);
        let depreciation = prev.rou_r - rou_r + change_in_rou - impairment;

        let pv_factor = plan.rounding.factor(Decimal::ONE / node.growth);

        let row = ScheduleRow {
            date,
            rent,
            principal,
            interest,
            lease_liability: liability_r,
            remaining_balance: round(remaining_rent),
            pv_factor,
            pv_of_rent: round(rent / node.growth),
            rou_asset: rou_r,
            depreciation,
            impairment,
            change_in_rou,
            security_deposit_pv: security_r,
            security_deposit_additions: additions,
            security_deposit_interest: security_interest,
            aro_gross: round(aro_gross),
            aro_interest,
            aro_revision,
            aro_provision: aro_r,
        };

        self.state = WalkState {
            date,
            growth: node.growth,
            liability,
            liability_r,
            remaining_rent,
            rou,
            rou_r,
            security_gross,
            security,
            security_r,
            aro_gross,
            aro_discount: node.aro_discount,
            aro_r,
        };
        row
    }
}

impl Iterator for ScheduleWalker<'_> {
    type Item = ScheduleRow;

    fn next(&mut self) -> Option<ScheduleRow> {
        let plan = self.plan;
        let node = plan.nodes.get(self.index)?;
        self.index += 1;
        Some(self.step(node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.nodes.len() - self.index;
        (remaining, Some(remaining))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Lease contract input model and validation.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::{whole_months, DayOfMonth};
use crate::error::LeaseEngineError;
use crate::types::{Currency, Money, Rate};
use crate::LeaseEngineResult;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// A span during which the rental per payment is constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Scheduled payments falling inside the span
    #[serde(default)]
    pub payment_count: u32,
    /// Rental per payment
    pub amount: Money,
}

impl RentalPeriod {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedAmount {
    pub date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AroRevision {
    pub effective_date: NaiveDate,
    /// Revised undiscounted estimate
    pub amount: Money,
}

/// Asset retirement obligation terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AroTerms {
    /// Undiscounted restoration cost expected at lease end
    pub initial_estimate: Money,
    /// Annual discount rate in percent; undiscounted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revisions: Vec<AroRevision>,
}

impl AroTerms {
    /// Undiscounted estimate in force on `date`.
    pub fn gross_at(&self, date: NaiveDate) -> Money {
        self.revisions
            .iter()
            .filter(|r| r.effective_date <= date)
            .max_by_key(|r| r.effective_date)
            .map(|r| r.amount)
            .unwrap_or(self.initial_estimate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOption {
    #[serde(rename = "retrospective", alias = "1")]
    Retrospective,
    /// Modified retrospective, ROU measured as if applied from commencement
    #[serde(rename = "2A")]
    ModifiedA,
    /// Modified retrospective, ROU equal to the lease liability
    #[serde(rename = "2B")]
    ModifiedB,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub date: NaiveDate,
    pub option: TransitionOption,
}

/// Classification flags as captured on the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseFlags {
    /// Designated a finance lease under ASC 842
    pub finance_lease_usgaap: bool,
    pub sublease: bool,
    /// Purchase option reasonably certain to be exercised
    pub bargain_purchase: bool,
    pub title_transfer: bool,
    pub practical_expedient: bool,
    pub short_term_ifrs: bool,
    pub short_term_usgaap: bool,
    pub specialized_asset: bool,
    /// Extension or renewal option outside the lease term
    pub extension_option: bool,
}

// ---------------------------------------------------------------------------
// Lease contract
// ---------------------------------------------------------------------------

fn default_frequency() -> i32 {
    1
}

/// Immutable lease contract supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseContract {
    pub lease_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_center: Option<String>,
    /// Group entity carrying the lease
    #[serde(default, alias = "group_entity_name", skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub currency: Currency,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Defaults to the start date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_payment_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure_months: Option<u32>,

    /// Months between payments
    #[serde(default = "default_frequency")]
    pub frequency_months: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<DayOfMonth>,
    /// Day anchoring the escalation grid; defaults to the start date's day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual_day: Option<u32>,

    /// Rental per payment before escalation
    #[serde(default)]
    pub base_rental: Money,
    /// Explicit rental schedule; replaces escalation when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_schedule: Option<Vec<RentalPeriod>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_start: Option<NaiveDate>,
    /// Escalation per cycle in percent (5 = 5%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_percent: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_frequency_months: Option<i32>,

    /// Incremental borrowing rate, annual percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrowing_rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound_months: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_deposit: Option<Money>,
    /// Annual percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_discount_rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_increases: Vec<DatedAmount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aro: Option<AroTerms>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_direct_costs: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_incentive: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepaid_rent: Option<Money>,

    #[serde(default)]
    pub flags: LeaseFlags,

    /// Paid on the end date when a bargain purchase is expected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_option_price: Option<Money>,
    /// ROU carrying amount left at the end of the depreciation horizon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublease_rou: Option<Money>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_penalty: Option<Money>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub impairments: Vec<DatedAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_life_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl LeaseContract {
    pub fn first_payment(&self) -> NaiveDate {
        self.first_payment_date.unwrap_or(self.start_date)
    }

    /// Payment frequency in months. Only meaningful after validation.
    pub fn payment_frequency(&self) -> u32 {
        self.frequency_months.max(1) as u32
    }

    pub fn accrual_day_or_default(&self) -> u32 {
        self.accrual_day.unwrap_or(self.start_date.day())
    }

    pub fn escalation_frequency(&self) -> u32 {
        self.escalation_frequency_months.unwrap_or(12).max(1) as u32
    }

    pub fn escalates(&self) -> bool {
        self.escalation_percent.is_some_and(|p| p > Decimal::ZERO)
    }

    /// Date the schedule stops: the termination date when the lease exits
    /// early, otherwise the contractual end.
    pub fn exit_date(&self) -> NaiveDate {
        match self.termination_date {
            Some(t) if t < self.end_date => t,
            _ => self.end_date,
        }
    }

    pub fn is_terminated_early(&self) -> bool {
        self.termination_date.is_some_and(|t| t < self.end_date)
    }

    /// Advisory notes that do not stop a calculation.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(tenure) = self.tenure_months {
            let months = whole_months(self.start_date, self.end_date);
            if months != tenure as i32 {
                warnings.push(format!(
                    "Tenure of {tenure} months differs from the {months} months between start and end dates"
                ));
            }
        }
        if self.flags.practical_expedient {
            warnings.push(
                "Practical expedient flagged; rent concession gains are not computed".to_string(),
            );
        }
        if self.purchase_option_price.is_some() && !self.flags.bargain_purchase {
            warnings.push(
                "Purchase option price ignored: exercise is not flagged as reasonably certain"
                    .to_string(),
            );
        }
        warnings
    }

    /// Check every field the engine depends on.
    pub fn validate(&self) -> LeaseEngineResult<()> {
        validate_contract(self)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, reason: impl Into<String>) -> LeaseEngineError {
    LeaseEngineError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn degenerate(field: &str, reason: impl Into<String>) -> LeaseEngineError {
    LeaseEngineError::DegenerateInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn non_negative(field: &str, value: Option<Money>) -> LeaseEngineResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(invalid(field, "Must not be negative")),
        _ => Ok(()),
    }
}

fn validate_contract(c: &LeaseContract) -> LeaseEngineResult<()> {
    if c.lease_id.trim().is_empty() {
        return Err(invalid("lease_id", "Lease identifier is required"));
    }
    if c.end_date < c.start_date {
        return Err(degenerate("end_date", "End date precedes start date"));
    }
    if c.frequency_months <= 0 {
        return Err(degenerate(
            "frequency_months",
            "Payment frequency must be at least one month",
        ));
    }

    let first = c.first_payment();
    if first < c.start_date || first > c.end_date {
        return Err(invalid(
            "first_payment_date",
            "First payment must fall between the start and end dates",
        ));
    }
    if let Some(day) = c.accrual_day {
        if !(1..=31).contains(&day) {
            return Err(invalid("accrual_day", "Accrual day must be 1-31"));
        }
    }

    match c.borrowing_rate {
        None => return Err(invalid("borrowing_rate", "Incremental borrowing rate is required")),
        Some(r) if r < Decimal::ZERO => {
            return Err(invalid("borrowing_rate", "Borrowing rate must not be negative"))
        }
        _ => {}
    }
    if let Some(cm) = c.compound_months {
        if cm <= 0 {
            return Err(degenerate("compound_months", "Compounding period must be positive"));
        }
    }

    match &c.rental_schedule {
        Some(periods) => validate_rental_schedule(periods)?,
        None => {
            if c.base_rental <= Decimal::ZERO {
                return Err(invalid(
                    "base_rental",
                    "Base rental must be positive when no rental schedule is supplied",
                ));
            }
        }
    }

    if let Some(pct) = c.escalation_percent {
        if pct < Decimal::ZERO {
            return Err(invalid("escalation_percent", "Escalation must not be negative"));
        }
    }
    if c.escalates() {
        let Some(esc_start) = c.escalation_start else {
            return Err(invalid(
                "escalation_start",
                "Escalation start date is required when escalation percent is positive",
            ));
        };
        if esc_start < c.start_date {
            return Err(invalid(
                "escalation_start",
                "Escalation cannot start before the lease",
            ));
        }
        if c.escalation_frequency_months.is_some_and(|f| f <= 0) {
            return Err(degenerate(
                "escalation_frequency_months",
                "Escalation frequency must be at least one month",
            ));
        }
    }

    non_negative("security_deposit", c.security_deposit)?;
    non_negative("security_discount_rate", c.security_discount_rate)?;
    for inc in &c.security_increases {
        if inc.date < c.start_date || inc.date > c.end_date {
            return Err(invalid(
                "security_increases",
                "Security deposit increases must fall within the lease term",
            ));
        }
    }

    if let Some(aro) = &c.aro {
        non_negative("aro.initial_estimate", Some(aro.initial_estimate))?;
        non_negative("aro.discount_rate", aro.discount_rate)?;
        for rev in &aro.revisions {
            non_negative("aro.revisions", Some(rev.amount))?;
            if rev.effective_date < c.start_date || rev.effective_date > c.end_date {
                return Err(invalid(
                    "aro.revisions",
                    "ARO revisions must take effect within the lease term",
                ));
            }
        }
    }

    non_negative("initial_direct_costs", c.initial_direct_costs)?;
    non_negative("lease_incentive", c.lease_incentive)?;
    non_negative("prepaid_rent", c.prepaid_rent)?;
    non_negative("purchase_option_price", c.purchase_option_price)?;
    non_negative("residual_value", c.residual_value)?;
    non_negative("termination_penalty", c.termination_penalty)?;
    non_negative("sublease_rou", c.sublease_rou)?;
    if let Some(fv) = c.fair_value {
        if fv <= Decimal::ZERO {
            return Err(invalid("fair_value", "Fair value must be positive"));
        }
    }

    if let Some(life) = c.useful_life_end {
        if life < c.start_date {
            return Err(degenerate(
                "useful_life_end",
                "Useful life cannot end before the lease starts",
            ));
        }
    }
    if let Some(t) = c.termination_date {
        if t < c.start_date || t > c.end_date {
            return Err(invalid(
                "termination_date",
                "Termination must fall within the lease term",
            ));
        }
    }
    for imp in &c.impairments {
        non_negative("impairments", Some(imp.amount))?;
        if imp.date < c.start_date {
            return Err(invalid("impairments", "Impairment precedes the lease start"));
        }
    }
    if let Some(tr) = &c.transition {
        if tr.date <= c.start_date || tr.date > c.end_date {
            return Err(invalid(
                "transition.date",
                "Transition date must fall after the start date and within the term",
            ));
        }
    }

    Ok(())
}

fn validate_rental_schedule(periods: &[RentalPeriod]) -> LeaseEngineResult<()> {
    if periods.is_empty() {
        return Err(invalid("rental_schedule", "Rental schedule must not be empty"));
    }
    for (i, p) in periods.iter().enumerate() {
        if p.end < p.start {
            return Err(degenerate(
                "rental_schedule",
                format!("Period {} ends before it starts", i + 1),
            ));
        }
        if p.amount < Decimal::ZERO {
            return Err(invalid(
                "rental_schedule",
                format!("Period {} has a negative amount", i + 1),
            ));
        }
    }
    for pair in periods.windows(2) {
        if pair[1].start <= pair[0].end {
            return Err(invalid(
                "rental_schedule",
                format!(
                    "Periods starting {} and {} overlap or are out of order",
                    pair[0].start, pair[1].start
                ),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn office_lease() -> LeaseContract {
        serde_json::from_value(serde_json::json!({
            "lease_id": "L-100",
            "description": "Office - Level 4",
            "start_date": "2024-01-01",
            "end_date": "2026-12-31",
            "base_rental": "1000",
            "borrowing_rate": "10",
            "compound_months": 12
        }))
        .unwrap()
    }

    fn field_of(err: LeaseEngineError) -> String {
        match err {
            LeaseEngineError::InvalidInput { field, .. }
            | LeaseEngineError::DegenerateInput { field, .. } => field,
            other => panic!("Expected a field error, got {other:?}"),
        }
    }

    #[test]
    fn test_minimal_contract_defaults() {
        let c = office_lease();
        assert!(c.validate().is_ok());
        assert_eq!(c.first_payment(), d(2024, 1, 1));
        assert_eq!(c.payment_frequency(), 1);
        assert_eq!(c.accrual_day_or_default(), 1);
        assert_eq!(c.currency, Currency::USD);
        assert!(!c.escalates());
        assert_eq!(c.exit_date(), d(2026, 12, 31));
    }

    #[test]
    fn test_missing_borrowing_rate_is_validation_error() {
        let mut c = office_lease();
        c.borrowing_rate = None;
        match c.validate().unwrap_err() {
            LeaseEngineError::InvalidInput { field, .. } => assert_eq!(field, "borrowing_rate"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_inverted_dates_are_degenerate() {
        let mut c = office_lease();
        c.end_date = d(2023, 12, 31);
        match c.validate().unwrap_err() {
            LeaseEngineError::DegenerateInput { field, .. } => assert_eq!(field, "end_date"),
            other => panic!("Expected DegenerateInput, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_and_negative_frequency_rejected() {
        for f in [0, -3] {
            let mut c = office_lease();
            c.frequency_months = f;
            assert_eq!(field_of(c.validate().unwrap_err()), "frequency_months");
        }
    }

    #[test]
    fn test_escalation_requires_start_date() {
        let mut c = office_lease();
        c.escalation_percent = Some(dec!(5));
        assert_eq!(field_of(c.validate().unwrap_err()), "escalation_start");

        c.escalation_start = Some(d(2024, 7, 1));
        c.escalation_frequency_months = Some(0);
        assert_eq!(field_of(c.validate().unwrap_err()), "escalation_frequency_months");
    }

    #[test]
    fn test_overlapping_rental_schedule_rejected() {
        let mut c = office_lease();
        c.rental_schedule = Some(vec![
            RentalPeriod {
                start: d(2024, 1, 1),
                end: d(2024, 12, 31),
                payment_count: 12,
                amount: dec!(1000),
            },
            RentalPeriod {
                start: d(2024, 12, 1),
                end: d(2026, 12, 31),
                payment_count: 25,
                amount: dec!(1100),
            },
        ]);
        assert_eq!(field_of(c.validate().unwrap_err()), "rental_schedule");
    }

    #[test]
    fn test_termination_outside_term_rejected() {
        let mut c = office_lease();
        c.termination_date = Some(d(2027, 3, 31));
        assert_eq!(field_of(c.validate().unwrap_err()), "termination_date");

        c.termination_date = Some(d(2025, 6, 30));
        assert!(c.validate().is_ok());
        assert!(c.is_terminated_early());
        assert_eq!(c.exit_date(), d(2025, 6, 30));
    }

    #[test]
    fn test_aro_gross_follows_latest_revision() {
        let aro = AroTerms {
            initial_estimate: dec!(5000),
            discount_rate: None,
            revisions: vec![
                AroRevision {
                    effective_date: d(2025, 1, 1),
                    amount: dec!(6000),
                },
                AroRevision {
                    effective_date: d(2026, 1, 1),
                    amount: dec!(5500),
                },
            ],
        };
        assert_eq!(aro.gross_at(d(2024, 6, 30)), dec!(5000));
        assert_eq!(aro.gross_at(d(2025, 1, 1)), dec!(6000));
        assert_eq!(aro.gross_at(d(2026, 6, 30)), dec!(5500));
    }

    #[test]
    fn test_tenure_mismatch_warns() {
        let mut c = office_lease();
        c.tenure_months = Some(36);
        assert!(c.warnings().is_empty());
        c.tenure_months = Some(24);
        assert!(c.warnings().iter().any(|w| w.contains("Tenure")));
    }

    #[test]
    fn test_transition_option_serde() {
        let t: Transition =
            serde_json::from_str(r#"{"date": "2025-04-01", "option": "2B"}"#).unwrap();
        assert_eq!(t.option, TransitionOption::ModifiedB);
    }
}

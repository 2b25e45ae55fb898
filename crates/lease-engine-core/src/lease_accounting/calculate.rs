//! Single-lease pipeline: rental periods, schedule, window summaries,
//! journals, projection and maturity analysis.

use std::time::Instant;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::LeaseEngineError;
use crate::time_value::compounding_interval;
use crate::types::{with_metadata, ComputationOutput, GaapStandard};
use crate::LeaseEngineResult;

use super::amortization::{initial_lease_liability, AmortizationPlan, ScheduleRow};
use super::classification::{classify, LeaseClassification};
use super::contract::{LeaseContract, RentalPeriod};
use super::escalation::build_rental_periods;
use super::journal::{build_journal_entries, BasisView, Divergence, JournalEntry};
use super::maturity::{maturity_analysis, MaturityAnalysis};
use super::projection::{project, ProjectionBounds};
use super::summary::{
    summarize_short_term, summarize_window, LeaseResult, PeriodTotals, WindowSummary,
};

// ---------------------------------------------------------------------------
// Request / output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub contract: LeaseContract,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    /// Falls back to the engine configuration's standard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaap_standard: Option<GaapStandard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseCalculation {
    pub lease_result: LeaseResult,
    /// Schedule rows through the window close
    pub schedule: Vec<ScheduleRow>,
    pub journal_entries: Vec<JournalEntry>,
    pub rental_periods: Vec<RentalPeriod>,
    /// Totals over the whole schedule, including rows after the window
    pub totals: PeriodTotals,
    pub maturity: MaturityAnalysis,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Calculate one lease over `[from_date, to_date]`.
pub fn calculate(
    request: &CalculationRequest,
    config: &EngineConfig,
) -> LeaseEngineResult<ComputationOutput<LeaseCalculation>> {
    let start = Instant::now();
    let standard = request.gaap_standard.unwrap_or(config.gaap_standard);

    let (calculation, warnings) = run_calculation(
        &request.contract,
        request.from_date,
        request.to_date,
        standard,
        config,
    )
    .map_err(|e| e.for_lease(&request.contract.lease_id))?;

    let contract = &request.contract;
    let assumptions = serde_json::json!({
        "gaap_standard": standard,
        "compounding_interval_months": compounding_interval(
            contract.payment_frequency(),
            contract.compound_months.map(|c| c.max(0) as u32),
        ),
        "day_count": "actual/365",
        "depreciation_end": calculation.lease_result.classification.depreciation_end,
        "rounding": config.rounding,
        "current_split": config.current_split,
    });

    let elapsed = start.elapsed().as_micros() as u64;
    let methodology = format!("Lease amortization and escalation ({})", standard.label());
    Ok(with_metadata(
        &methodology,
        &assumptions,
        warnings,
        elapsed,
        calculation,
    ))
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn day_before(date: NaiveDate) -> LeaseEngineResult<NaiveDate> {
    date.checked_sub_days(Days::new(1))
        .ok_or_else(|| LeaseEngineError::DateError(format!("no day before {date}")))
}

/// The evaluation window and the window of equal length preceding it.
#[derive(Debug, Clone, Copy)]
struct Windows {
    from: NaiveDate,
    to: NaiveDate,
    previous_from: NaiveDate,
    previous_to: NaiveDate,
}

impl Windows {
    fn new(from: NaiveDate, to: NaiveDate) -> LeaseEngineResult<Self> {
        if to < from {
            return Err(LeaseEngineError::DegenerateInput {
                field: "to_date".into(),
                reason: "Window closes before it opens".into(),
            });
        }
        let length = (to - from).num_days() as u64 + 1;
        let previous_from = from
            .checked_sub_days(Days::new(length))
            .ok_or_else(|| LeaseEngineError::DateError(format!("no window before {from}")))?;
        Ok(Self {
            from,
            to,
            previous_from,
            previous_to: day_before(from)?,
        })
    }

    /// Dates the schedule must carry a row for.
    fn observations(&self) -> LeaseEngineResult<[NaiveDate; 3]> {
        Ok([day_before(self.previous_from)?, self.previous_to, self.to])
    }
}

/// Everything needed to measure a lease once its periods are known.
struct Measurement<'a> {
    contract: &'a LeaseContract,
    periods: &'a [RentalPeriod],
    classification: &'a LeaseClassification,
    config: &'a EngineConfig,
    windows: Windows,
}

impl Measurement<'_> {
    fn plan(&self, standard: GaapStandard) -> LeaseEngineResult<AmortizationPlan> {
        AmortizationPlan::new(
            self.contract,
            self.periods,
            self.classification,
            standard,
            &self.config.rounding,
            &self.windows.observations()?,
        )
    }

    fn summarize(
        &self,
        plan: &AmortizationPlan,
        rows: &[ScheduleRow],
        standard: GaapStandard,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LeaseEngineResult<WindowSummary> {
        if self.classification.is_short_term(standard) {
            summarize_short_term(rows, from, to)
        } else {
            summarize_window(plan, rows, from, to, &self.config.current_split)
        }
    }

    fn view(
        &self,
        plan: &AmortizationPlan,
        rows: &[ScheduleRow],
        standard: GaapStandard,
    ) -> LeaseEngineResult<BasisView> {
        let w = self.windows;
        Ok(BasisView {
            current: self.summarize(plan, rows, standard, w.from, w.to)?,
            previous: self.summarize(plan, rows, standard, w.previous_from, w.previous_to)?,
        })
    }

    /// Current-window summary on another basis.
    fn other_basis(&self, standard: GaapStandard) -> LeaseEngineResult<WindowSummary> {
        let plan = self.plan(standard)?;
        let rows: Vec<ScheduleRow> = plan.walk().take_while(|r| r.date <= self.windows.to).collect();
        self.summarize(&plan, &rows, standard, self.windows.from, self.windows.to)
    }
}

/// Run the pipeline for one lease, returning the calculation and its
/// warnings. Errors are not tagged with the lease identifier.
pub(crate) fn run_calculation(
    contract: &LeaseContract,
    from_date: NaiveDate,
    to_date: NaiveDate,
    standard: GaapStandard,
    config: &EngineConfig,
) -> LeaseEngineResult<(LeaseCalculation, Vec<String>)> {
    config.validate()?;
    let windows = Windows::new(from_date, to_date)?;

    let periods = build_rental_periods(contract)?;
    debug!(lease_id = %contract.lease_id, periods = periods.len(), "rental periods built");

    let classification = classify(contract, initial_lease_liability(contract, &periods)?);

    let mut warnings = contract.warnings();
    if classification.is_short_term(standard) {
        warnings.push(format!(
            "Lease qualifies for the short-term exemption under {}; rent is expensed and nothing is capitalised",
            standard.label()
        ));
    }

    let measurement = Measurement {
        contract,
        periods: &periods,
        classification: &classification,
        config,
        windows,
    };
    let plan = measurement.plan(standard)?;
    warnings.extend(plan.warnings().iter().cloned());
    for w in &warnings {
        warn!(lease_id = %contract.lease_id, "{w}");
    }

    // -- Schedule through the window, then resume for projection --
    let mut walker = plan.walk().peekable();
    let mut schedule = Vec::new();
    while let Some(row) = walker.next_if(|r| r.date <= windows.to) {
        schedule.push(row);
    }

    let mut future = Vec::new();
    let bounds = ProjectionBounds {
        after: windows.to,
        last_date: plan.last_date(),
        terminated_on: plan.is_terminated().then(|| plan.exit_date()),
    };
    let projections = project(
        walker.by_ref().inspect(|r| future.push(r.clone())),
        schedule.last(),
        bounds,
        &config.projection,
    )?;
    future.extend(walker);
    debug!(
        lease_id = %contract.lease_id,
        reported = schedule.len(),
        projected = future.len(),
        "schedule rows emitted"
    );

    // -- Summaries and journals --
    let view = measurement.view(&plan, &schedule, standard)?;
    let journal_entries = if classification.basis_diverges() {
        let ifrs = if standard.is_ifrs_basis() {
            view.current.clone()
        } else {
            measurement.other_basis(GaapStandard::Ifrs)?
        };
        let usgaap = if standard == GaapStandard::UsGaap {
            view.current.clone()
        } else {
            measurement.other_basis(GaapStandard::UsGaap)?
        };
        build_journal_entries(
            &view,
            Some(Divergence {
                ifrs: &ifrs,
                usgaap: &usgaap,
            }),
        )
    } else {
        build_journal_entries(&view, None)
    };

    // -- Whole-schedule totals and maturity --
    let totals = PeriodTotals::from_rows(schedule.iter().chain(future.iter()));
    let reported = schedule.len();
    schedule.extend(future);
    let maturity = maturity_analysis(&schedule, windows.to)?;
    schedule.truncate(reported);

    let lease_result = LeaseResult::new(
        contract,
        standard,
        view.current,
        classification,
        projections,
    );

    Ok((
        LeaseCalculation {
            lease_result,
            schedule,
            journal_entries,
            rental_periods: periods,
            totals,
            maturity,
        },
        warnings,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn retail_lease() -> LeaseContract {
        serde_json::from_value(serde_json::json!({
            "lease_id": "RT-22",
            "description": "Retail unit 22",
            "start_date": "2024-01-01",
            "end_date": "2028-12-31",
            "base_rental": "5000",
            "borrowing_rate": "8",
            "escalation_start": "2025-01-01",
            "escalation_percent": "3",
            "security_deposit": "15000",
            "security_discount_rate": "6"
        }))
        .unwrap()
    }

    fn request(contract: LeaseContract, from: NaiveDate, to: NaiveDate) -> CalculationRequest {
        CalculationRequest {
            contract,
            from_date: from,
            to_date: to,
            gaap_standard: None,
        }
    }

    #[test]
    fn test_calculate_wraps_output_with_metadata() {
        let req = request(retail_lease(), d(2024, 1, 1), d(2024, 12, 31));
        let out = calculate(&req, &EngineConfig::default()).unwrap();
        assert!(out.methodology.contains("IFRS 16"));
        assert_eq!(out.result.lease_result.gaap_standard, GaapStandard::Ifrs);
        assert!(out.result.schedule.iter().all(|r| r.date <= d(2024, 12, 31)));
        assert_eq!(out.result.lease_result.projections.len(), 4);
        assert_eq!(out.result.rental_periods.len(), 5);
    }

    #[test]
    fn test_errors_carry_lease_id_and_field() {
        let mut contract = retail_lease();
        contract.borrowing_rate = None;
        let req = request(contract, d(2024, 1, 1), d(2024, 12, 31));
        let err = calculate(&req, &EngineConfig::default()).unwrap_err();
        match &err {
            LeaseEngineError::Lease { lease_id, .. } => assert_eq!(lease_id, "RT-22"),
            other => panic!("Expected a lease-tagged error, got {other:?}"),
        }
        assert_eq!(err.field(), Some("borrowing_rate"));
    }

    #[test]
    fn test_inverted_window_is_degenerate() {
        let req = request(retail_lease(), d(2025, 1, 1), d(2024, 12, 31));
        let err = calculate(&req, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err.root(), LeaseEngineError::DegenerateInput { .. }));
    }

    #[test]
    fn test_whole_schedule_totals_cover_future_rows() {
        let req = request(retail_lease(), d(2024, 1, 1), d(2024, 12, 31));
        let out = calculate(&req, &EngineConfig::default()).unwrap();
        let calc = &out.result;
        let initial = calc.lease_result.initial_recognition.clone().unwrap();
        assert_eq!(calc.totals.principal, initial.lease_liability);
        assert_eq!(
            calc.maturity.total_undiscounted,
            calc.schedule.last().unwrap().remaining_balance
        );
        assert_eq!(
            calc.maturity.lease_liability,
            calc.lease_result.closing.lease_liability
        );
    }

    #[test]
    fn test_operating_usgaap_fills_basis_columns() {
        let mut req = request(retail_lease(), d(2025, 1, 1), d(2025, 12, 31));
        req.gaap_standard = Some(GaapStandard::UsGaap);
        let out = calculate(&req, &EngineConfig::default()).unwrap();
        let dep = out
            .result
            .journal_entries
            .iter()
            .find(|e| e.account_code == "5102")
            .unwrap();
        assert_eq!(dep.usgaap_entry, dep.result_period);
        assert_ne!(dep.ifrs_adjustment, dep.usgaap_entry);
        assert!(dep.ifrs_adjustment > Decimal::ZERO);
    }

    #[test]
    fn test_finance_lease_has_no_basis_columns() {
        let mut contract = retail_lease();
        contract.flags.finance_lease_usgaap = true;
        let req = request(contract, d(2025, 1, 1), d(2025, 12, 31));
        let out = calculate(&req, &EngineConfig::default()).unwrap();
        assert!(out
            .result
            .journal_entries
            .iter()
            .all(|e| e.ifrs_adjustment.is_zero() && e.usgaap_entry.is_zero()));
    }

    #[test]
    fn test_short_term_lease_proceeds_with_warning() {
        let mut contract = retail_lease();
        contract.flags.short_term_ifrs = true;
        let req = request(contract, d(2024, 1, 1), d(2024, 12, 31));
        let out = calculate(&req, &EngineConfig::default()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("short-term")));
        let result = &out.result.lease_result;
        assert!(result.short_term);
        assert_eq!(result.totals.short_term_expense, dec!(60000));
        assert_eq!(result.closing.lease_liability, Decimal::ZERO);
        let codes: Vec<&str> = out
            .result
            .journal_entries
            .iter()
            .map(|e| e.account_code.as_str())
            .collect();
        assert!(codes.contains(&"5107"));
    }
}

//! ASC 842 / IFRS 16 lease classification.
//!
//! IFRS 16 and Ind AS 116 put every lease on the single lessee model.
//! ASC 842 classifies a lease as finance when any of the 842-10-25-2 tests
//! triggers (or the lease is designated finance), and as operating
//! otherwise, in which case the lessee recognises a straight-line single
//! lease cost instead of front-loaded interest plus depreciation.
//!
//! The classification also fixes the depreciation horizon: the asset's
//! useful life when ownership is expected to pass, the shorter of useful
//! life and lease term otherwise.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{GaapStandard, Money, Rate};
use crate::LeaseEngineResult;

use super::contract::LeaseContract;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const FINANCE_LEASE_TERM_THRESHOLD: Decimal = dec!(0.75);
const FINANCE_LEASE_PV_THRESHOLD: Decimal = dec!(0.90);

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LeaseType {
    Finance,
    Operating,
}

/// A single classification test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationCriterion {
    /// Name of the test
    pub test_name: String,
    /// Whether the test triggered finance classification
    pub test_result: bool,
    /// Descriptive detail
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseClassification {
    /// Classification under ASC 842
    pub usgaap_classification: LeaseType,
    pub classification_criteria: Vec<ClassificationCriterion>,
    /// Date the ROU asset is depreciated to
    pub depreciation_end: NaiveDate,
    pub short_term_ifrs: bool,
    pub short_term_usgaap: bool,
    pub sublease: bool,
    pub practical_expedient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_term_to_useful_life_pct: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present_value_to_fair_value_pct: Option<Rate>,
}

impl LeaseClassification {
    pub fn is_short_term(&self, standard: GaapStandard) -> bool {
        if standard.is_ifrs_basis() {
            self.short_term_ifrs
        } else {
            self.short_term_usgaap
        }
    }

    /// Operating leases under ASC 842 recognise a single straight-line cost.
    pub fn uses_single_lease_cost(&self, standard: GaapStandard) -> bool {
        standard == GaapStandard::UsGaap && self.usgaap_classification == LeaseType::Operating
    }

    /// True when IFRS and US-GAAP measure this lease differently.
    pub fn basis_diverges(&self) -> bool {
        self.short_term_ifrs != self.short_term_usgaap
            || (self.usgaap_classification == LeaseType::Operating && !self.short_term_usgaap)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify a contract, measuring its lease liability first.
pub fn classify_lease(contract: &LeaseContract) -> LeaseEngineResult<LeaseClassification> {
    let periods = super::escalation::build_rental_periods(contract)?;
    let liability = super::amortization::initial_lease_liability(contract, &periods)?;
    Ok(classify(contract, liability))
}

/// Classify given the lease liability at commencement.
pub fn classify(contract: &LeaseContract, initial_liability: Money) -> LeaseClassification {
    let term_ratio = contract.useful_life_end.and_then(|life| {
        let life_days = (life - contract.start_date).num_days() + 1;
        let term_days = (contract.end_date - contract.start_date).num_days() + 1;
        (life_days > 0).then(|| Decimal::from(term_days) / Decimal::from(life_days))
    });
    let pv_ratio = contract
        .fair_value
        .filter(|fv| !fv.is_zero())
        .map(|fv| initial_liability / fv);

    let criteria = run_classification_tests(contract, initial_liability, term_ratio, pv_ratio);
    let is_finance = criteria.iter().any(|c| c.test_result);

    LeaseClassification {
        usgaap_classification: if is_finance {
            LeaseType::Finance
        } else {
            LeaseType::Operating
        },
        classification_criteria: criteria,
        depreciation_end: depreciation_horizon(contract),
        short_term_ifrs: contract.flags.short_term_ifrs,
        short_term_usgaap: contract.flags.short_term_usgaap,
        sublease: contract.flags.sublease,
        practical_expedient: contract.flags.practical_expedient,
        lease_term_to_useful_life_pct: term_ratio.map(|r| (r * dec!(100)).round_dp(2)),
        present_value_to_fair_value_pct: pv_ratio.map(|r| (r * dec!(100)).round_dp(2)),
    }
}

/// Useful-life end when ownership is expected to pass or the lease is
/// designated finance, otherwise the earlier of useful-life end and lease end.
pub fn depreciation_horizon(contract: &LeaseContract) -> NaiveDate {
    let flags = &contract.flags;
    let full_life = flags.title_transfer || flags.bargain_purchase || flags.finance_lease_usgaap;
    match contract.useful_life_end {
        Some(life) if full_life => life,
        Some(life) => life.min(contract.end_date),
        None => contract.end_date,
    }
}

// ---------------------------------------------------------------------------
// Classification tests
// ---------------------------------------------------------------------------

fn run_classification_tests(
    contract: &LeaseContract,
    pv_of_payments: Money,
    term_ratio: Option<Decimal>,
    pv_ratio: Option<Decimal>,
) -> Vec<ClassificationCriterion> {
    let flags = &contract.flags;
    let mut criteria = Vec::with_capacity(6);

    // Test 1: Transfer of ownership
    criteria.push(ClassificationCriterion {
        test_name: "Transfer of Ownership".to_string(),
        test_result: flags.title_transfer,
        detail: if flags.title_transfer {
            "Title transfers to the lessee by the end of the lease term".to_string()
        } else {
            "No transfer of title at lease end".to_string()
        },
    });

    // Test 2: Purchase option reasonably certain
    criteria.push(ClassificationCriterion {
        test_name: "Purchase Option Reasonably Certain".to_string(),
        test_result: flags.bargain_purchase,
        detail: match (flags.bargain_purchase, contract.purchase_option_price) {
            (true, Some(price)) => {
                format!("Purchase option of {price} is reasonably certain to be exercised")
            }
            (true, None) => "Purchase option is reasonably certain to be exercised".to_string(),
            (false, _) => "No purchase option reasonably certain to be exercised".to_string(),
        },
    });

    // Test 3: Lease term >= 75% of useful life
    let term_test = term_ratio.is_some_and(|r| r >= FINANCE_LEASE_TERM_THRESHOLD);
    criteria.push(ClassificationCriterion {
        test_name: "Lease Term >= 75% of Useful Life".to_string(),
        test_result: term_test,
        detail: match term_ratio {
            Some(r) => format!(
                "Lease term is {:.1}% of the remaining useful life (threshold: 75%)",
                r * dec!(100)
            ),
            None => "Useful life end not provided".to_string(),
        },
    });

    // Test 4: PV of payments >= 90% of fair value
    let pv_test = pv_ratio.is_some_and(|r| r >= FINANCE_LEASE_PV_THRESHOLD);
    criteria.push(ClassificationCriterion {
        test_name: "PV of Payments >= 90% of Fair Value".to_string(),
        test_result: pv_test,
        detail: match (pv_ratio, contract.fair_value) {
            (Some(r), Some(fv)) => format!(
                "PV of payments {} / fair value {} = {:.1}% (threshold: 90%)",
                pv_of_payments.round_dp(2),
                fv,
                r * dec!(100)
            ),
            _ => "Fair value of the underlying asset not provided".to_string(),
        },
    });

    // Test 5: Specialized asset
    criteria.push(ClassificationCriterion {
        test_name: "Specialized Asset with No Alternative Use".to_string(),
        test_result: flags.specialized_asset,
        detail: if flags.specialized_asset {
            "Asset is specialized with no alternative use to the lessor".to_string()
        } else {
            "Asset is not specialized; has alternative uses".to_string()
        },
    });

    // Test 6: Explicit designation
    criteria.push(ClassificationCriterion {
        test_name: "Designated Finance Lease".to_string(),
        test_result: flags.finance_lease_usgaap,
        detail: if flags.finance_lease_usgaap {
            "Lease is designated finance under ASC 842".to_string()
        } else {
            "No finance designation".to_string()
        },
    });

    criteria
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

    /// Helper: five-year office lease on a building with a long life
    fn standard_office_lease() -> LeaseContract {
        serde_json::from_value(serde_json::json!({
            "lease_id": "OFF-01",
            "description": "Office Lease - 123 Main St",
            "start_date": "2024-01-01",
            "end_date": "2028-12-31",
            "base_rental": "10000",
            "borrowing_rate": "6",
            "useful_life_end": "2043-12-31",
            "fair_value": "1000000"
        }))
        .unwrap()
    }

    fn criterion<'a>(c: &'a LeaseClassification, name: &str) -> &'a ClassificationCriterion {
        c.classification_criteria
            .iter()
            .find(|x| x.test_name == name)
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // 1. Operating lease classification (no finance tests triggered)
    // -----------------------------------------------------------------------
    #[test]
    fn test_operating_lease_classification() {
        let result = classify_lease(&standard_office_lease()).unwrap();
        assert_eq!(result.usgaap_classification, LeaseType::Operating);
        assert!(
            !result.classification_criteria.iter().any(|c| c.test_result),
            "No finance criteria should trigger for a short office lease"
        );
        assert_eq!(result.classification_criteria.len(), 6);
        assert_eq!(result.depreciation_end, d(2028, 12, 31));
        assert!(result.uses_single_lease_cost(GaapStandard::UsGaap));
        assert!(!result.uses_single_lease_cost(GaapStandard::Ifrs));
    }

    // -----------------------------------------------------------------------
    // 2. Transfer of ownership: finance, depreciated over useful life
    // -----------------------------------------------------------------------
    #[test]
    fn test_title_transfer_is_finance_over_useful_life() {
        let mut contract = standard_office_lease();
        contract.flags.title_transfer = true;
        let result = classify_lease(&contract).unwrap();
        assert_eq!(result.usgaap_classification, LeaseType::Finance);
        assert!(criterion(&result, "Transfer of Ownership").test_result);
        assert_eq!(result.depreciation_end, d(2043, 12, 31));
    }

    // -----------------------------------------------------------------------
    // 3. 75% of useful life
    // -----------------------------------------------------------------------
    #[test]
    fn test_major_part_of_useful_life() {
        let mut contract = standard_office_lease();
        contract.useful_life_end = Some(d(2029, 12, 31));
        let result = classify_lease(&contract).unwrap();
        assert_eq!(result.usgaap_classification, LeaseType::Finance);
        assert!(criterion(&result, "Lease Term >= 75% of Useful Life").test_result);
        // Shorter of life and term
        assert_eq!(result.depreciation_end, d(2028, 12, 31));
    }

    // -----------------------------------------------------------------------
    // 4. 90% of fair value
    // -----------------------------------------------------------------------
    #[test]
    fn test_substantially_all_fair_value() {
        let mut contract = standard_office_lease();
        contract.fair_value = Some(dec!(550000));
        let result = classify_lease(&contract).unwrap();
        // 60 payments of 10,000 at 6% are worth well over 90% of 550,000
        assert!(criterion(&result, "PV of Payments >= 90% of Fair Value").test_result);
        assert!(result.present_value_to_fair_value_pct.unwrap() > dec!(90));
    }

    #[test]
    fn test_missing_inputs_do_not_trigger() {
        let mut contract = standard_office_lease();
        contract.useful_life_end = None;
        contract.fair_value = None;
        let result = classify(&contract, dec!(500000));
        assert_eq!(result.usgaap_classification, LeaseType::Operating);
        assert!(result.lease_term_to_useful_life_pct.is_none());
        assert!(result.present_value_to_fair_value_pct.is_none());
    }

    // -----------------------------------------------------------------------
    // 5. Basis divergence
    // -----------------------------------------------------------------------
    #[test]
    fn test_basis_divergence_flags() {
        let mut contract = standard_office_lease();
        contract.flags.finance_lease_usgaap = true;
        let finance = classify(&contract, dec!(500000));
        assert!(!finance.basis_diverges());

        contract.flags.short_term_usgaap = true;
        let short = classify(&contract, dec!(500000));
        assert!(short.basis_diverges());
        assert!(short.is_short_term(GaapStandard::UsGaap));
        assert!(!short.is_short_term(GaapStandard::IndAs));

        contract.flags.finance_lease_usgaap = false;
        contract.flags.short_term_usgaap = false;
        assert!(classify(&contract, dec!(500000)).basis_diverges());
    }
}

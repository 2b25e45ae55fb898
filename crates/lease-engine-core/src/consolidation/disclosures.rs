//! Portfolio lease disclosures (IFRS 16.53-59 / ASC 842-20-50).
//!
//! Built alongside the consolidation from the processed leases and the
//! leases exempted as short-term under the requested basis.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lease_accounting::contract::LeaseContract;
use crate::lease_accounting::maturity::{maturity_analysis, MaturityAnalysis};
use crate::lease_accounting::summary::LeaseResult;
use crate::types::Money;
use crate::LeaseEngineResult;

/// Grouping key for leases without the field.
pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortTermLease {
    pub lease_id: String,
    pub description: String,
    /// Rental per payment
    pub rental: Money,
    pub annual_rent: Money,
}

/// Leases kept off balance sheet under the short-term exemption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortTermLeases {
    pub count: usize,
    pub total_annual_rent: Money,
    pub leases: Vec<ShortTermLease>,
}

/// Processed leases whose rent changes over the term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablePayments {
    pub lease_count: usize,
    /// Rent paid inside the window by those leases
    pub rent_paid: Money,
    pub lease_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionOptions {
    pub count: usize,
    pub lease_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOptions {
    pub count: usize,
    pub total_purchase_price: Money,
    pub lease_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioDisclosures {
    /// Undiscounted payments after the window close, summed by bucket
    pub maturity: MaturityAnalysis,
    /// Closing lease liability by group entity
    pub liability_by_entity: BTreeMap<String, Money>,
    /// Closing ROU asset by asset class
    pub rou_by_asset_class: BTreeMap<String, Money>,
    pub variable_payments: VariablePayments,
    pub short_term_leases: ShortTermLeases,
    /// Incentives received on processed leases
    pub lease_incentives: Money,
    pub extension_options: ExtensionOptions,
    pub purchase_options: PurchaseOptions,
}

fn group_key(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNASSIGNED.to_string(),
    }
}

fn has_stepped_rent(contract: &LeaseContract) -> bool {
    if contract.escalates() {
        return true;
    }
    contract.rental_schedule.as_ref().is_some_and(|periods| {
        periods
            .windows(2)
            .any(|pair| pair[0].amount != pair[1].amount)
    })
}

/// First rental per payment on the contract.
fn opening_rental(contract: &LeaseContract) -> Money {
    contract
        .rental_schedule
        .as_ref()
        .and_then(|periods| periods.first())
        .map_or(contract.base_rental, |p| p.amount)
}

impl PortfolioDisclosures {
    /// Empty disclosures as at the window close.
    pub fn new(as_of: NaiveDate) -> LeaseEngineResult<Self> {
        Ok(Self {
            maturity: maturity_analysis(&[], as_of)?,
            liability_by_entity: BTreeMap::new(),
            rou_by_asset_class: BTreeMap::new(),
            variable_payments: VariablePayments::default(),
            short_term_leases: ShortTermLeases::default(),
            lease_incentives: Decimal::ZERO,
            extension_options: ExtensionOptions::default(),
            purchase_options: PurchaseOptions::default(),
        })
    }

    /// Add a processed lease. `maturity` must be taken as at the same date.
    pub fn absorb_processed(
        &mut self,
        contract: &LeaseContract,
        result: &LeaseResult,
        maturity: &MaturityAnalysis,
    ) {
        for (into, from) in self.maturity.buckets.iter_mut().zip(&maturity.buckets) {
            into.undiscounted_payments += from.undiscounted_payments;
            into.payment_count += from.payment_count;
        }
        self.maturity.total_undiscounted += maturity.total_undiscounted;
        self.maturity.lease_liability += maturity.lease_liability;
        self.maturity.unearned_interest += maturity.unearned_interest;

        *self
            .liability_by_entity
            .entry(group_key(&contract.entity_name))
            .or_default() += result.closing.lease_liability;
        *self
            .rou_by_asset_class
            .entry(group_key(&contract.asset_class))
            .or_default() += result.closing.rou_asset;

        if has_stepped_rent(contract) {
            let variable = &mut self.variable_payments;
            variable.lease_count += 1;
            variable.rent_paid += result.totals.rent_paid;
            variable.lease_ids.push(contract.lease_id.clone());
        }

        self.lease_incentives += contract.lease_incentive.unwrap_or(Decimal::ZERO);

        if contract.flags.extension_option {
            self.extension_options.count += 1;
            self.extension_options
                .lease_ids
                .push(contract.lease_id.clone());
        }

        let price = contract.purchase_option_price.unwrap_or(Decimal::ZERO);
        if contract.flags.bargain_purchase || price > Decimal::ZERO {
            let options = &mut self.purchase_options;
            options.count += 1;
            options.total_purchase_price += price;
            options.lease_ids.push(contract.lease_id.clone());
        }
    }

    /// Add a lease exempted as short-term.
    pub fn absorb_short_term(&mut self, contract: &LeaseContract) {
        let rental = opening_rental(contract);
        let payments_per_year = Decimal::from(12) / Decimal::from(contract.payment_frequency());
        let annual_rent = (rental * payments_per_year).round_dp(2);

        let short_term = &mut self.short_term_leases;
        short_term.count += 1;
        short_term.total_annual_rent += annual_rent;
        short_term.leases.push(ShortTermLease {
            lease_id: contract.lease_id.clone(),
            description: contract.description.clone(),
            rental,
            annual_rent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::lease_accounting::calculate::{run_calculation, LeaseCalculation};
    use crate::types::GaapStandard;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn contract(overrides: serde_json::Value) -> LeaseContract {
        let mut value = serde_json::json!({
            "lease_id": "X",
            "start_date": "2024-01-01",
            "end_date": "2026-12-31",
            "base_rental": "1000",
            "borrowing_rate": "6",
        });
        if let (Some(into), Some(from)) = (value.as_object_mut(), overrides.as_object()) {
            for (k, v) in from {
                into.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    fn calculation(contract: &LeaseContract) -> LeaseCalculation {
        run_calculation(
            contract,
            d(2024, 1, 1),
            d(2024, 12, 31),
            GaapStandard::Ifrs,
            &EngineConfig::default(),
        )
        .unwrap()
        .0
    }

    fn absorb(
        disclosures: &mut PortfolioDisclosures,
        contract: &LeaseContract,
    ) -> LeaseCalculation {
        let calc = calculation(contract);
        disclosures.absorb_processed(contract, &calc.lease_result, &calc.maturity);
        calc
    }

    // -----------------------------------------------------------------------
    // 1. Grouping by entity and asset class
    // -----------------------------------------------------------------------
    #[test]
    fn test_balances_grouped_by_entity_and_asset_class() {
        let mut disclosures = PortfolioDisclosures::new(d(2024, 12, 31)).unwrap();
        let a = absorb(
            &mut disclosures,
            &contract(serde_json::json!({
                "lease_id": "A", "entity_name": "Acme UK", "asset_class": "Property"
            })),
        );
        let b = absorb(
            &mut disclosures,
            &contract(serde_json::json!({
                "lease_id": "B", "group_entity_name": "Acme UK", "asset_class": "Vehicles",
                "base_rental": "400"
            })),
        );
        let c = absorb(
            &mut disclosures,
            &contract(serde_json::json!({ "lease_id": "C", "asset_class": "Property" })),
        );
        let (a, b, c) = (a.lease_result, b.lease_result, c.lease_result);

        assert_eq!(
            disclosures.liability_by_entity["Acme UK"],
            a.closing.lease_liability + b.closing.lease_liability
        );
        assert_eq!(
            disclosures.liability_by_entity[UNASSIGNED],
            c.closing.lease_liability
        );
        assert_eq!(
            disclosures.rou_by_asset_class["Property"],
            a.closing.rou_asset + c.closing.rou_asset
        );
        assert_eq!(disclosures.rou_by_asset_class["Vehicles"], b.closing.rou_asset);
        assert_eq!(disclosures.rou_by_asset_class.len(), 2);
    }

    #[test]
    fn test_maturity_buckets_summed_across_leases() {
        let mut disclosures = PortfolioDisclosures::new(d(2024, 12, 31)).unwrap();
        let a = absorb(&mut disclosures, &contract(serde_json::json!({ "lease_id": "A" })));
        let b = absorb(
            &mut disclosures,
            &contract(serde_json::json!({ "lease_id": "B", "base_rental": "250" })),
        );
        // 24 payments remain on each lease after 2024
        assert_eq!(disclosures.maturity.total_undiscounted, dec!(30000));
        assert_eq!(disclosures.maturity.buckets[0].payment_count, 24);
        assert_eq!(
            disclosures.maturity.lease_liability,
            a.maturity.lease_liability + b.maturity.lease_liability
        );
    }

    // -----------------------------------------------------------------------
    // 2. Short-term exemption
    // -----------------------------------------------------------------------
    #[test]
    fn test_short_term_rent_annualised_by_frequency() {
        let mut disclosures = PortfolioDisclosures::new(d(2024, 12, 31)).unwrap();
        disclosures.absorb_short_term(&contract(serde_json::json!({
            "lease_id": "KIOSK", "base_rental": "600"
        })));
        disclosures.absorb_short_term(&contract(serde_json::json!({
            "lease_id": "YARD", "base_rental": "1500", "frequency_months": 3
        })));

        let short_term = &disclosures.short_term_leases;
        assert_eq!(short_term.count, 2);
        assert_eq!(short_term.leases[0].annual_rent, dec!(7200));
        assert_eq!(short_term.leases[1].annual_rent, dec!(6000));
        assert_eq!(short_term.total_annual_rent, dec!(13200));
    }

    // -----------------------------------------------------------------------
    // 3. Options, incentives and stepped rent
    // -----------------------------------------------------------------------
    #[test]
    fn test_options_incentives_and_variable_rent() {
        let mut disclosures = PortfolioDisclosures::new(d(2024, 12, 31)).unwrap();
        let escalating = absorb(
            &mut disclosures,
            &contract(serde_json::json!({
                "lease_id": "ESC",
                "escalation_start": "2025-01-01",
                "escalation_percent": "4",
                "lease_incentive": "2500",
                "flags": { "extension_option": true }
            })),
        );
        absorb(
            &mut disclosures,
            &contract(serde_json::json!({
                "lease_id": "BUY",
                "purchase_option_price": "8000",
                "useful_life_end": "2030-12-31",
                "flags": { "bargain_purchase": true }
            })),
        );

        assert_eq!(disclosures.variable_payments.lease_ids, vec!["ESC"]);
        assert_eq!(
            disclosures.variable_payments.rent_paid,
            escalating.lease_result.totals.rent_paid
        );
        assert_eq!(disclosures.lease_incentives, dec!(2500));
        assert_eq!(disclosures.extension_options.lease_ids, vec!["ESC"]);
        assert_eq!(disclosures.purchase_options.count, 1);
        assert_eq!(disclosures.purchase_options.total_purchase_price, dec!(8000));
    }
}

use std::collections::HashMap;

use chrono::NaiveDate;
use lease_engine_core::consolidation::SkippedLease;
use lease_engine_core::{
    calculate, consolidate, CalculationRequest, ConsolidationRequest, EngineConfig, GaapStandard,
    LeaseBook, LeaseContract, LeaseFilters,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn portfolio() -> LeaseBook {
    let leases = serde_json::json!([
        {
            "lease_id": "STORE-01",
            "entity_name": "Northwind Retail Ltd",
            "asset_class": "Property",
            "cost_center": "CC-RETAIL",
            "start_date": "2023-07-01",
            "end_date": "2028-06-30",
            "base_rental": "4200",
            "borrowing_rate": "6.5",
            "escalation_start": "2024-07-01",
            "escalation_percent": "3"
        },
        {
            "lease_id": "FLEET-09",
            "entity_name": "Northwind Logistics Ltd",
            "asset_class": "Vehicles",
            "cost_center": "CC-FLEET",
            "start_date": "2024-03-01",
            "end_date": "2027-02-28",
            "frequency_months": 3,
            "base_rental": "9000",
            "borrowing_rate": "8",
            "purchase_option_price": "5000",
            "flags": { "bargain_purchase": true },
            "useful_life_end": "2030-02-28"
        },
        {
            "lease_id": "KIOSK-3",
            "start_date": "2025-01-01",
            "end_date": "2025-10-31",
            "base_rental": "600",
            "borrowing_rate": "5",
            "flags": { "short_term_usgaap": true }
        },
        {
            "lease_id": "BROKEN-1",
            "start_date": "2025-06-01",
            "end_date": "2025-03-31",
            "base_rental": "100",
            "borrowing_rate": "5"
        }
    ]);
    serde_json::from_value(leases).unwrap()
}

fn request(standard: GaapStandard) -> ConsolidationRequest {
    ConsolidationRequest {
        lease_ids: Vec::new(),
        from_date: d(2025, 1, 1),
        to_date: d(2025, 12, 31),
        gaap_standard: Some(standard),
        filters: LeaseFilters::default(),
    }
}

// ===========================================================================
// Consolidation
// ===========================================================================

#[test]
fn test_counts_partition_requested_leases() {
    let out = consolidate(
        &request(GaapStandard::UsGaap),
        &portfolio(),
        &EngineConfig::default(),
    )
    .unwrap();
    let stats = out.result.statistics;
    assert_eq!(stats.total_count, 4);
    assert_eq!(stats.processed_count + stats.skipped_count, stats.total_count);
    assert_eq!(stats.processed_count, 2);

    let skipped: Vec<&SkippedLease> = out.result.skipped.iter().collect();
    assert_eq!(skipped[0].lease_id, "KIOSK-3");
    assert_eq!(skipped[0].field.as_deref(), Some("flags.short_term_usgaap"));
    assert_eq!(skipped[1].lease_id, "BROKEN-1");
    assert_eq!(skipped[1].field.as_deref(), Some("end_date"));
}

#[test]
fn test_short_term_skip_depends_on_basis() {
    let out = consolidate(
        &request(GaapStandard::Ifrs),
        &portfolio(),
        &EngineConfig::default(),
    )
    .unwrap();
    let processed: Vec<&str> = out
        .result
        .results
        .iter()
        .map(|r| r.lease_id.as_str())
        .collect();
    assert_eq!(processed, vec!["STORE-01", "FLEET-09", "KIOSK-3"]);
}

#[test]
fn test_totals_match_individual_calculations() {
    let book = portfolio();
    let config = EngineConfig::default();
    let out = consolidate(&request(GaapStandard::UsGaap), &book, &config).unwrap();
    let totals = &out.result.aggregated_totals;

    let mut closing_liability = Decimal::ZERO;
    let mut closing_rou = Decimal::ZERO;
    let mut interest = Decimal::ZERO;
    let mut depreciation = Decimal::ZERO;
    for id in ["STORE-01", "FLEET-09"] {
        let contract: LeaseContract = book.iter().find(|c| c.lease_id == id).unwrap().clone();
        let single = calculate(
            &CalculationRequest {
                contract,
                from_date: d(2025, 1, 1),
                to_date: d(2025, 12, 31),
                gaap_standard: Some(GaapStandard::UsGaap),
            },
            &config,
        )
        .unwrap()
        .result
        .lease_result;
        closing_liability += single.closing.lease_liability;
        closing_rou += single.closing.rou_asset;
        interest += single.totals.interest;
        depreciation += single.totals.depreciation;
    }

    assert_eq!(totals.closing.lease_liability, closing_liability);
    assert_eq!(totals.closing.rou_asset, closing_rou);
    assert_eq!(totals.totals.interest, interest);
    assert_eq!(totals.totals.depreciation, depreciation);
}

#[test]
fn test_consolidated_journals_balance() {
    let out = consolidate(
        &request(GaapStandard::UsGaap),
        &portfolio(),
        &EngineConfig::default(),
    )
    .unwrap();
    let journals = &out.result.consolidated_journals;
    let liability = journals
        .iter()
        .find(|e| e.account_code == "2101")
        .unwrap();
    let per_lease: Decimal = out
        .result
        .results
        .iter()
        .map(|r| r.closing.non_current_liability)
        .sum();
    assert_eq!(liability.result_period, -per_lease);
    let net: Decimal = journals.iter().map(|e| e.result_period).sum();
    assert_eq!(net, Decimal::ZERO);
}

#[test]
fn test_hash_map_and_book_sources_agree() {
    let book = portfolio();
    let map: HashMap<String, LeaseContract> = book
        .iter()
        .map(|c| (c.lease_id.clone(), c.clone()))
        .collect();
    let mut req = request(GaapStandard::Ifrs);
    req.lease_ids = vec!["FLEET-09".into(), "STORE-01".into()];
    let config = EngineConfig::default();

    let from_book = consolidate(&req, &book, &config).unwrap().result;
    let from_map = consolidate(&req, &map, &config).unwrap().result;
    assert_eq!(from_book.aggregated_totals, from_map.aggregated_totals);
    assert_eq!(from_book.consolidated_journals, from_map.consolidated_journals);
    assert_eq!(from_book.results[0].lease_id, "FLEET-09");
}

// ===========================================================================
// Lease selection
// ===========================================================================

#[test]
fn test_expired_lease_is_skipped_not_processed() {
    let mut book = portfolio();
    let expired: LeaseContract = serde_json::from_value(serde_json::json!({
        "lease_id": "DEPOT-OLD",
        "start_date": "2020-01-01",
        "end_date": "2022-12-31",
        "base_rental": "3000",
        "borrowing_rate": "5"
    }))
    .unwrap();
    book.push(expired);

    let out = consolidate(
        &request(GaapStandard::Ifrs),
        &book,
        &EngineConfig::default(),
    )
    .unwrap();
    let stats = out.result.statistics;
    assert_eq!(stats.total_count, 5);
    assert_eq!(stats.processed_count, 3);
    let skip = out
        .result
        .skipped
        .iter()
        .find(|s| s.lease_id == "DEPOT-OLD")
        .unwrap();
    assert_eq!(skip.reason, "Outside evaluation window");
    assert_eq!(skip.field.as_deref(), Some("end_date"));
    assert!(out.result.results.iter().all(|r| r.lease_id != "DEPOT-OLD"));
}

#[test]
fn test_cost_center_filter_skips_other_leases() {
    let mut req = request(GaapStandard::UsGaap);
    req.filters.cost_center = Some("CC-FLEET".into());
    let out = consolidate(&req, &portfolio(), &EngineConfig::default()).unwrap();

    let processed: Vec<&str> = out
        .result
        .results
        .iter()
        .map(|r| r.lease_id.as_str())
        .collect();
    assert_eq!(processed, vec!["FLEET-09"]);
    let store = &out.result.skipped[0];
    assert_eq!(store.lease_id, "STORE-01");
    assert_eq!(store.field.as_deref(), Some("cost_center"));
    assert_eq!(
        out.result.statistics.processed_count + out.result.statistics.skipped_count,
        4
    );
}

// ===========================================================================
// Disclosures
// ===========================================================================

#[test]
fn test_disclosures_group_processed_leases() {
    let out = consolidate(
        &request(GaapStandard::UsGaap),
        &portfolio(),
        &EngineConfig::default(),
    )
    .unwrap();
    let result = &out.result;
    let disclosures = &result.disclosures;
    let by_id = |id: &str| result.results.iter().find(|r| r.lease_id == id).unwrap();

    assert_eq!(
        disclosures.liability_by_entity["Northwind Retail Ltd"],
        by_id("STORE-01").closing.lease_liability
    );
    assert_eq!(
        disclosures.rou_by_asset_class["Vehicles"],
        by_id("FLEET-09").closing.rou_asset
    );
    let entity_total: Decimal = disclosures.liability_by_entity.values().copied().sum();
    assert_eq!(entity_total, result.aggregated_totals.closing.lease_liability);

    assert_eq!(disclosures.short_term_leases.count, 1);
    assert_eq!(disclosures.short_term_leases.leases[0].lease_id, "KIOSK-3");
    assert_eq!(disclosures.short_term_leases.total_annual_rent, Decimal::from(7200));
    assert_eq!(disclosures.purchase_options.count, 1);
    assert_eq!(disclosures.variable_payments.lease_ids, vec!["STORE-01"]);
}

#[test]
fn test_no_short_term_disclosure_when_basis_measures_lease() {
    let out = consolidate(
        &request(GaapStandard::Ifrs),
        &portfolio(),
        &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(out.result.disclosures.short_term_leases.count, 0);
}

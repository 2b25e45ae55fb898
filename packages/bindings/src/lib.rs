use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use lease_engine_core::lease_accounting::amortization::ScheduleRow;
use lease_engine_core::{
    CalculationRequest, ConsolidationRequest, EngineConfig, LeaseBook, LeaseContract,
};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse the optional engine configuration argument.
fn engine_config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    match config_json.as_deref().map(str::trim) {
        None | Some("") => Ok(EngineConfig::default()),
        Some(json) => serde_json::from_str(json).map_err(to_napi_error),
    }
}

// ---------------------------------------------------------------------------
// Single lease
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_lease(request_json: String, config_json: Option<String>) -> NapiResult<String> {
    let request: CalculationRequest =
        serde_json::from_str(&request_json).map_err(to_napi_error)?;
    let config = engine_config(config_json)?;
    let output = lease_engine_core::calculate(&request, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn build_rental_schedule(contract_json: String) -> NapiResult<String> {
    let contract: LeaseContract = serde_json::from_str(&contract_json).map_err(to_napi_error)?;
    let periods = lease_engine_core::build_rental_periods(&contract).map_err(to_napi_error)?;
    serde_json::to_string(&periods).map_err(to_napi_error)
}

#[napi]
pub fn classify_lease(contract_json: String) -> NapiResult<String> {
    let contract: LeaseContract = serde_json::from_str(&contract_json).map_err(to_napi_error)?;
    let classification = lease_engine_core::classify_lease(&contract).map_err(to_napi_error)?;
    serde_json::to_string(&classification).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct MaturityInput {
    schedule: Vec<ScheduleRow>,
    as_of: NaiveDate,
}

#[napi]
pub fn maturity_analysis(input_json: String) -> NapiResult<String> {
    let input: MaturityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let analysis = lease_engine_core::maturity_analysis(&input.schedule, input.as_of)
        .map_err(to_napi_error)?;
    serde_json::to_string(&analysis).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ConsolidationInput {
    #[serde(flatten)]
    request: ConsolidationRequest,
    leases: LeaseBook,
}

#[napi]
pub fn consolidate_leases(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: ConsolidationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let config = engine_config(config_json)?;
    let output = lease_engine_core::consolidate(&input.request, &input.leases, &config)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Consolidate, returning only the portfolio disclosures.
#[napi]
pub fn portfolio_disclosures(
    input_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let input: ConsolidationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let config = engine_config(config_json)?;
    let output = lease_engine_core::consolidate(&input.request, &input.leases, &config)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output.result.disclosures).map_err(to_napi_error)
}

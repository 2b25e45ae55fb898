use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use lease_engine_core::{
    build_rental_periods, calculate, classify_lease, CalculationRequest, GaapStandard,
    LeaseContract,
};

use crate::input;

/// Arguments for a lease calculation over a window
#[derive(Args)]
pub struct CalculateArgs {
    /// Path to a JSON/YAML calculation request, or a bare contract with --from/--to
    #[arg(long)]
    pub input: Option<String>,

    /// Window start (YYYY-MM-DD); overrides the request
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Window end (YYYY-MM-DD); overrides the request
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Reporting basis: IFRS, IndAS or US-GAAP
    #[arg(long, value_parser = parse_standard)]
    pub standard: Option<GaapStandard>,
}

/// Arguments for commands that take a single contract
#[derive(Args)]
pub struct ContractArgs {
    /// Path to a JSON/YAML lease contract
    #[arg(long)]
    pub input: Option<String>,
}

pub(crate) fn parse_standard(s: &str) -> Result<GaapStandard, String> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|_| format!("unknown standard '{s}' (expected IFRS, IndAS or US-GAAP)"))
}

/// Build a request from either a full request document or a bare contract.
fn calculation_request(args: &CalculateArgs) -> Result<CalculationRequest, Box<dyn std::error::Error>> {
    let data = input::read_input(args.input.as_deref(), "lease calculation")?;

    let mut request = if data.get("contract").is_some() {
        serde_json::from_value::<CalculationRequest>(data)?
    } else {
        let contract: LeaseContract = serde_json::from_value(data)?;
        let (Some(from), Some(to)) = (args.from, args.to) else {
            return Err("--from and --to are required when the input is a bare contract".into());
        };
        CalculationRequest {
            contract,
            from_date: from,
            to_date: to,
            gaap_standard: None,
        }
    };

    if let Some(from) = args.from {
        request.from_date = from;
    }
    if let Some(to) = args.to {
        request.to_date = to;
    }
    if args.standard.is_some() {
        request.gaap_standard = args.standard;
    }
    Ok(request)
}

fn read_contract(args: &ContractArgs, what: &str) -> Result<LeaseContract, Box<dyn std::error::Error>> {
    let data = input::read_input(args.input.as_deref(), what)?;
    // Accept a calculation request too, so one file serves every command
    let contract = match data.get("contract") {
        Some(inner) => serde_json::from_value(inner.clone())?,
        None => serde_json::from_value(data)?,
    };
    Ok(contract)
}

pub fn run_calculate(
    args: CalculateArgs,
    config_path: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let config = input::config::load_engine_config(config_path)?;
    let request = calculation_request(&args)?;
    let result = calculate(&request, &config)?;
    Ok(serde_json::to_value(result)?)
}

/// Schedule rows only, as a flat array.
pub fn run_schedule(
    args: CalculateArgs,
    config_path: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let config = input::config::load_engine_config(config_path)?;
    let request = calculation_request(&args)?;
    let result = calculate(&request, &config)?;
    Ok(serde_json::to_value(result.result.schedule)?)
}

pub fn run_rental_periods(args: ContractArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contract = read_contract(&args, "rental periods")?;
    let periods = build_rental_periods(&contract)?;
    Ok(serde_json::to_value(periods)?)
}

pub fn run_classify(args: ContractArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contract = read_contract(&args, "lease classification")?;
    let classification = classify_lease(&contract)?;
    Ok(serde_json::to_value(classification)?)
}

use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use lease_engine_core::{consolidate, ConsolidationRequest, GaapStandard, LeaseBook};

use super::lease_accounting::parse_standard;
use crate::input;

/// Arguments for portfolio consolidation
#[derive(Args)]
pub struct ConsolidateArgs {
    /// Path to a JSON/YAML document with `leases` and the request fields
    #[arg(long)]
    pub input: Option<String>,

    /// Reporting basis: IFRS, IndAS or US-GAAP
    #[arg(long, value_parser = parse_standard)]
    pub standard: Option<GaapStandard>,

    /// Restrict to these lease ids (repeatable)
    #[arg(long = "lease-id")]
    pub lease_ids: Vec<String>,

    /// Only leases booked to this cost center
    #[arg(long)]
    pub cost_center: Option<String>,

    /// Only leases carried by this group entity
    #[arg(long)]
    pub entity: Option<String>,

    /// Only leases of this asset class
    #[arg(long)]
    pub asset_class: Option<String>,

    /// Only leases booked to this profit center
    #[arg(long)]
    pub profit_center: Option<String>,

    /// Emit only the portfolio disclosures
    #[arg(long)]
    pub disclosures: bool,
}

#[derive(Deserialize)]
struct ConsolidationInput {
    #[serde(flatten)]
    request: ConsolidationRequest,
    leases: LeaseBook,
}

pub fn run_consolidate(
    args: ConsolidateArgs,
    config_path: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let config = input::config::load_engine_config(config_path)?;
    let data = input::read_input(args.input.as_deref(), "consolidation")?;
    let ConsolidationInput { mut request, leases } = serde_json::from_value(data)?;

    if args.standard.is_some() {
        request.gaap_standard = args.standard;
    }
    if !args.lease_ids.is_empty() {
        request.lease_ids = args.lease_ids;
    }
    let filters = &mut request.filters;
    for (flag, filter) in [
        (args.cost_center, &mut filters.cost_center),
        (args.entity, &mut filters.entity_name),
        (args.asset_class, &mut filters.asset_class),
        (args.profit_center, &mut filters.profit_center),
    ] {
        if flag.is_some() {
            *filter = flag;
        }
    }

    let output = consolidate(&request, &leases, &config)?;
    if args.disclosures {
        return Ok(serde_json::to_value(output.result.disclosures)?);
    }
    Ok(serde_json::to_value(output)?)
}

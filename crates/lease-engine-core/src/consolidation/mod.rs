//! Portfolio consolidation.
//!
//! Every requested lease runs through the single-lease pipeline on its own
//! worker. Leases that fail the request's filters, fall outside the window
//! or cannot be measured are skipped and reported with the reason and the
//! field; they never contribute zeros to the totals.

mod aggregate;
pub mod disclosures;
mod pool;

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::LeaseEngineError;
use crate::lease_accounting::calculate::run_calculation;
use crate::lease_accounting::contract::LeaseContract;
use crate::lease_accounting::journal::{merge_journal_entries, JournalEntry};
use crate::lease_accounting::maturity::MaturityAnalysis;
use crate::lease_accounting::summary::LeaseResult;
use crate::types::{with_metadata, ComputationOutput, GaapStandard};
use crate::LeaseEngineResult;

pub use aggregate::AggregatedTotals;
pub use disclosures::PortfolioDisclosures;

// ---------------------------------------------------------------------------
// Lease sources
// ---------------------------------------------------------------------------

/// Where consolidation looks leases up.
pub trait LeaseSource {
    fn lease(&self, lease_id: &str) -> Option<&LeaseContract>;

    /// Every lease identifier, in a stable order.
    fn lease_ids(&self) -> Vec<String>;
}

impl<S: BuildHasher> LeaseSource for HashMap<String, LeaseContract, S> {
    fn lease(&self, lease_id: &str) -> Option<&LeaseContract> {
        self.get(lease_id)
    }

    fn lease_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// An ordered collection of lease contracts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseBook {
    leases: Vec<LeaseContract>,
}

impl LeaseBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, contract: LeaseContract) {
        self.leases.push(contract);
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LeaseContract> {
        self.leases.iter()
    }
}

impl FromIterator<LeaseContract> for LeaseBook {
    fn from_iter<I: IntoIterator<Item = LeaseContract>>(iter: I) -> Self {
        Self {
            leases: iter.into_iter().collect(),
        }
    }
}

impl LeaseSource for LeaseBook {
    /// First contract carrying the identifier.
    fn lease(&self, lease_id: &str) -> Option<&LeaseContract> {
        self.leases.iter().find(|c| c.lease_id == lease_id)
    }

    fn lease_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.leases.len());
        for c in &self.leases {
            if !ids.contains(&c.lease_id) {
                ids.push(c.lease_id.clone());
            }
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Request / output types
// ---------------------------------------------------------------------------

/// Attribute filters; a lease must match every filter that is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_center: Option<String>,
}

impl LeaseFilters {
    /// Name of the first filter `contract` fails.
    pub fn mismatch(&self, contract: &LeaseContract) -> Option<&'static str> {
        let checks = [
            ("cost_center", &self.cost_center, &contract.cost_center),
            ("entity_name", &self.entity_name, &contract.entity_name),
            ("asset_class", &self.asset_class, &contract.asset_class),
            ("profit_center", &self.profit_center, &contract.profit_center),
        ];
        checks.into_iter().find_map(|(field, wanted, actual)| match wanted {
            Some(w) if actual.as_ref() != Some(w) => Some(field),
            _ => None,
        })
    }
}

/// Contract date that puts the lease outside `[from, to]`.
fn outside_window(
    contract: &LeaseContract,
    from: NaiveDate,
    to: NaiveDate,
) -> Option<&'static str> {
    if contract.end_date < from {
        Some("end_date")
    } else if contract.start_date > to {
        Some("start_date")
    } else if contract.termination_date.is_some_and(|t| t < from) {
        Some("termination_date")
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationRequest {
    /// Empty means every lease in the source
    #[serde(default)]
    pub lease_ids: Vec<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    /// Falls back to the engine configuration's standard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaap_standard: Option<GaapStandard>,
    #[serde(default)]
    pub filters: LeaseFilters,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationStatistics {
    pub total_count: usize,
    pub processed_count: usize,
    pub skipped_count: usize,
}

/// A lease left out of the consolidation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLease {
    pub lease_id: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationResult {
    pub gaap_standard: GaapStandard,
    pub statistics: ConsolidationStatistics,
    pub aggregated_totals: AggregatedTotals,
    /// Per-lease results in request order
    pub results: Vec<LeaseResult>,
    pub consolidated_journals: Vec<JournalEntry>,
    pub disclosures: PortfolioDisclosures,
    pub skipped: Vec<SkippedLease>,
}

enum Outcome {
    Processed {
        result: Box<LeaseResult>,
        journals: Vec<JournalEntry>,
        maturity: MaturityAnalysis,
        warnings: Vec<String>,
    },
    /// Skipped under the short-term exemption
    Exempt(SkippedLease),
    Skipped(SkippedLease),
}

fn skipped(lease_id: &str, reason: impl Into<String>, field: Option<&str>) -> Outcome {
    Outcome::Skipped(SkippedLease {
        lease_id: lease_id.to_string(),
        reason: reason.into(),
        field: field.map(str::to_string),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Consolidate the requested leases over `[from_date, to_date]`.
pub fn consolidate(
    request: &ConsolidationRequest,
    source: &impl LeaseSource,
    config: &EngineConfig,
) -> LeaseEngineResult<ComputationOutput<ConsolidationResult>> {
    let start = Instant::now();
    config.validate()?;
    if request.to_date < request.from_date {
        return Err(LeaseEngineError::DegenerateInput {
            field: "to_date".into(),
            reason: "Window closes before it opens".into(),
        });
    }
    let standard = request.gaap_standard.unwrap_or(config.gaap_standard);

    let ids = if request.lease_ids.is_empty() {
        source.lease_ids()
    } else {
        request.lease_ids.clone()
    };
    let jobs: Vec<(&str, Option<&LeaseContract>)> = ids
        .iter()
        .map(|id| (id.as_str(), source.lease(id)))
        .collect();
    let workers = pool::worker_count(jobs.len(), config.max_workers);
    info!(
        "Consolidating {} leases under {} on {workers} workers",
        jobs.len(),
        standard.label()
    );

    let outcomes = pool::run_indexed(&jobs, workers, |&(lease_id, contract)| {
        process_lease(lease_id, contract, request, standard, config)
    });

    let mut results = Vec::new();
    let mut journal_sets = Vec::new();
    let mut skipped_leases = Vec::new();
    let mut warnings = Vec::new();
    let mut disclosures = PortfolioDisclosures::new(request.to_date)?;
    for (&(lease_id, contract), outcome) in jobs.iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|panic| {
            skipped(lease_id, format!("Calculation panicked: {panic}"), None)
        });
        let skip = match outcome {
            Outcome::Processed {
                result,
                journals,
                maturity,
                warnings: lease_warnings,
            } => {
                if let Some(contract) = contract {
                    disclosures.absorb_processed(contract, &result, &maturity);
                }
                warnings.extend(lease_warnings.into_iter().map(|w| format!("{lease_id}: {w}")));
                results.push(*result);
                journal_sets.push(journals);
                continue;
            }
            Outcome::Exempt(skip) => {
                if let Some(contract) = contract {
                    disclosures.absorb_short_term(contract);
                }
                skip
            }
            Outcome::Skipped(skip) => skip,
        };
        warn!("Skipping lease {}: {}", skip.lease_id, skip.reason);
        warnings.push(format!("{}: skipped: {}", skip.lease_id, skip.reason));
        skipped_leases.push(skip);
    }

    let statistics = ConsolidationStatistics {
        total_count: jobs.len(),
        processed_count: results.len(),
        skipped_count: skipped_leases.len(),
    };
    info!(
        "Consolidation finished: {} processed, {} skipped",
        statistics.processed_count, statistics.skipped_count
    );

    let aggregated_totals = AggregatedTotals::from_results(&results);
    let consolidated_journals = merge_journal_entries(journal_sets.iter().map(Vec::as_slice));

    let assumptions = serde_json::json!({
        "gaap_standard": standard,
        "from_date": request.from_date,
        "to_date": request.to_date,
        "workers": workers,
        "filters": request.filters,
        "rounding": config.rounding,
        "current_split": config.current_split,
    });
    let elapsed = start.elapsed().as_micros() as u64;
    let methodology = format!("Lease portfolio consolidation ({})", standard.label());
    Ok(with_metadata(
        &methodology,
        &assumptions,
        warnings,
        elapsed,
        ConsolidationResult {
            gaap_standard: standard,
            statistics,
            aggregated_totals,
            results,
            consolidated_journals,
            disclosures,
            skipped: skipped_leases,
        },
    ))
}

fn process_lease(
    lease_id: &str,
    contract: Option<&LeaseContract>,
    request: &ConsolidationRequest,
    standard: GaapStandard,
    config: &EngineConfig,
) -> Outcome {
    let Some(contract) = contract else {
        return skipped(lease_id, "Lease not found", None);
    };

    if let Some(field) = request.filters.mismatch(contract) {
        return skipped(lease_id, format!("Does not match {field} filter"), Some(field));
    }
    if let Some(field) = outside_window(contract, request.from_date, request.to_date) {
        return skipped(lease_id, "Outside evaluation window", Some(field));
    }

    let short_term_flag = if standard.is_ifrs_basis() {
        contract.flags.short_term_ifrs.then_some("flags.short_term_ifrs")
    } else {
        contract.flags.short_term_usgaap.then_some("flags.short_term_usgaap")
    };
    if let Some(field) = short_term_flag {
        return Outcome::Exempt(SkippedLease {
            lease_id: lease_id.to_string(),
            reason: format!("Short-term lease under {}", standard.label()),
            field: Some(field.to_string()),
        });
    }

    match run_calculation(
        contract,
        request.from_date,
        request.to_date,
        standard,
        config,
    ) {
        Ok((calculation, warnings)) => Outcome::Processed {
            result: Box::new(calculation.lease_result),
            journals: calculation.journal_entries,
            maturity: calculation.maturity,
            warnings,
        },
        Err(e) => skipped(lease_id, e.root().to_string(), e.field()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Summing per-lease results into portfolio totals.

use serde::{Deserialize, Serialize};

use crate::lease_accounting::summary::{BalanceSnapshot, LeaseResult, PeriodTotals};
use crate::types::Money;

/// Portfolio totals across every processed lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedTotals {
    pub opening: BalanceSnapshot,
    pub closing: BalanceSnapshot,
    pub totals: PeriodTotals,
    /// Liability recognised by leases commencing inside the window
    pub initial_lease_liability: Money,
    /// ROU asset recognised by leases commencing inside the window
    pub initial_rou_asset: Money,
    pub gain_loss: Money,
}

fn add_snapshot(into: &mut BalanceSnapshot, from: &BalanceSnapshot) {
    into.lease_liability += from.lease_liability;
    into.current_liability += from.current_liability;
    into.non_current_liability += from.non_current_liability;
    into.rou_asset += from.rou_asset;
    into.aro_provision += from.aro_provision;
    into.security_deposit += from.security_deposit;
    into.security_deposit_current += from.security_deposit_current;
    into.security_deposit_non_current += from.security_deposit_non_current;
}

fn add_totals(into: &mut PeriodTotals, from: &PeriodTotals) {
    into.interest += from.interest;
    into.principal += from.principal;
    into.rent_paid += from.rent_paid;
    into.depreciation += from.depreciation;
    into.impairment += from.impairment;
    into.change_in_rou += from.change_in_rou;
    into.aro_interest += from.aro_interest;
    into.aro_revisions += from.aro_revisions;
    into.security_deposit_interest += from.security_deposit_interest;
    into.security_deposit_additions += from.security_deposit_additions;
    into.liability_derecognised += from.liability_derecognised;
    into.rou_derecognised += from.rou_derecognised;
    into.security_deposit_derecognised += from.security_deposit_derecognised;
    into.short_term_expense += from.short_term_expense;
    into.gain_loss += from.gain_loss;
}

impl AggregatedTotals {
    pub fn absorb(&mut self, result: &LeaseResult) {
        add_snapshot(&mut self.opening, &result.opening);
        add_snapshot(&mut self.closing, &result.closing);
        add_totals(&mut self.totals, &result.totals);
        if let Some(initial) = &result.initial_recognition {
            self.initial_lease_liability += initial.lease_liability;
            self.initial_rou_asset += initial.rou_asset;
        }
        self.gain_loss += result.gain_loss;
    }

    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a LeaseResult>) -> Self {
        let mut totals = Self::default();
        for r in results {
            totals.absorb(r);
        }
        totals
    }
}

//! Chart-of-accounts journal lines derived from window summaries.
//!
//! Sign convention: debits positive, credits negative. Balance-sheet lines
//! carry the closing balance of the window; P&L lines carry the window's
//! activity. Retained Earnings balances every column to zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

use super::summary::WindowSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementClass {
    #[serde(rename = "BS")]
    BalanceSheet,
    #[serde(rename = "PL")]
    ProfitAndLoss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub account_code: String,
    pub account_name: String,
    pub classification: StatementClass,
    /// Previous-period closing for balance-sheet lines, zero for P&L lines
    pub opening_balance: Money,
    pub previous_period: Money,
    pub result_period: Money,
    pub incremental_adjustment: Money,
    /// Line amount under IFRS when the bases diverge
    pub ifrs_adjustment: Money,
    /// Line amount under US-GAAP when the bases diverge
    pub usgaap_entry: Money,
}

impl JournalEntry {
    /// Add another lease's line into this one.
    pub fn absorb(&mut self, other: &JournalEntry) {
        self.opening_balance += other.opening_balance;
        self.previous_period += other.previous_period;
        self.result_period += other.result_period;
        self.incremental_adjustment += other.incremental_adjustment;
        self.ifrs_adjustment += other.ifrs_adjustment;
        self.usgaap_entry += other.usgaap_entry;
    }
}

/// Current and preceding window on one reporting basis.
#[derive(Debug, Clone)]
pub struct BasisView {
    pub current: WindowSummary,
    pub previous: WindowSummary,
}

/// IFRS and US-GAAP measurements of the current window.
#[derive(Debug, Clone, Copy)]
pub struct Divergence<'a> {
    pub ifrs: &'a WindowSummary,
    pub usgaap: &'a WindowSummary,
}

// ---------------------------------------------------------------------------
// Chart of accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Line {
    LiabilityNonCurrent,
    LiabilityCurrent,
    Interest,
    RouAsset,
    Depreciation,
    Impairment,
    GainLoss,
    AroInterest,
    AroProvision,
    SecurityInterest,
    SecurityDeposit,
    RentPaid,
    ShortTermExpense,
}

struct Account {
    line: Line,
    code: &'static str,
    name: &'static str,
    class: StatementClass,
    optional: bool,
}

const fn account(
    line: Line,
    code: &'static str,
    name: &'static str,
    class: StatementClass,
    optional: bool,
) -> Account {
    Account {
        line,
        code,
        name,
        class,
        optional,
    }
}

use StatementClass::{BalanceSheet as BS, ProfitAndLoss as PL};

const CHART: [Account; 13] = [
    account(Line::LiabilityNonCurrent, "2101", "Lease Liability Non-current", BS, false),
    account(Line::LiabilityCurrent, "2102", "Lease Liability Current", BS, false),
    account(Line::Interest, "5101", "Interest Cost", PL, false),
    account(Line::RouAsset, "1200", "RoU Asset (net)", BS, false),
    account(Line::Depreciation, "5102", "Depreciation", PL, false),
    account(Line::Impairment, "5106", "Impairment", PL, true),
    account(Line::GainLoss, "5200", "(Gain)/Loss in P&L", PL, true),
    account(Line::AroInterest, "5104", "ARO Interest", PL, true),
    account(Line::AroProvision, "2201", "ARO Provision Closing", BS, true),
    account(Line::SecurityInterest, "5105", "Interest on Security Dep", PL, true),
    account(Line::SecurityDeposit, "1201", "Security Deposit", BS, true),
    account(Line::RentPaid, "5103", "Rent Paid", PL, false),
    account(Line::ShortTermExpense, "5107", "Short-term Lease Expense", PL, true),
];

const RETAINED_EARNINGS: (&str, &str) = ("3100", "Retained Earnings");

fn amount(line: Line, s: &WindowSummary) -> Money {
    let t = &s.totals;
    let c = &s.closing;
    match line {
        Line::LiabilityNonCurrent => -c.non_current_liability,
        Line::LiabilityCurrent => -c.current_liability,
        Line::Interest => t.interest,
        Line::RouAsset => c.rou_asset,
        Line::Depreciation => t.depreciation,
        Line::Impairment => t.impairment,
        Line::GainLoss => -t.gain_loss,
        Line::AroInterest => t.aro_interest,
        Line::AroProvision => -c.aro_provision,
        Line::SecurityInterest => -t.security_deposit_interest,
        Line::SecurityDeposit => c.security_deposit,
        Line::RentPaid => -t.rent_paid,
        Line::ShortTermExpense => t.short_term_expense,
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Journal lines for one lease on the reporting basis in `view`.
///
/// Basis-specific columns are filled only when `divergence` is given.
pub fn build_journal_entries(
    view: &BasisView,
    divergence: Option<Divergence<'_>>,
) -> Vec<JournalEntry> {
    let mut entries = Vec::with_capacity(CHART.len() + 1);

    for acct in &CHART {
        let previous = amount(acct.line, &view.previous);
        let result = amount(acct.line, &view.current);
        let (ifrs, usgaap) = divergence.map_or((Decimal::ZERO, Decimal::ZERO), |d| {
            (amount(acct.line, d.ifrs), amount(acct.line, d.usgaap))
        });
        let mandatory = !acct.optional && !view.current.short_term;
        let nonzero = [previous, result, ifrs, usgaap].iter().any(|v| !v.is_zero());
        if !mandatory && !nonzero {
            continue;
        }
        entries.push(JournalEntry {
            account_code: acct.code.to_string(),
            account_name: acct.name.to_string(),
            classification: acct.class,
            opening_balance: match acct.class {
                BS => previous,
                PL => Decimal::ZERO,
            },
            previous_period: previous,
            result_period: result,
            incremental_adjustment: result - previous,
            ifrs_adjustment: ifrs,
            usgaap_entry: usgaap,
        });
    }

    let mut balancing = JournalEntry {
        account_code: RETAINED_EARNINGS.0.to_string(),
        account_name: RETAINED_EARNINGS.1.to_string(),
        classification: BS,
        opening_balance: Decimal::ZERO,
        previous_period: Decimal::ZERO,
        result_period: Decimal::ZERO,
        incremental_adjustment: Decimal::ZERO,
        ifrs_adjustment: Decimal::ZERO,
        usgaap_entry: Decimal::ZERO,
    };
    for e in &entries {
        balancing.opening_balance -= e.opening_balance;
        balancing.previous_period -= e.previous_period;
        balancing.result_period -= e.result_period;
        balancing.incremental_adjustment -= e.incremental_adjustment;
        balancing.ifrs_adjustment -= e.ifrs_adjustment;
        balancing.usgaap_entry -= e.usgaap_entry;
    }
    entries.push(balancing);
    entries
}

/// Merge journal lines across leases by account code and name, keeping the
/// order in which accounts were first seen.
pub fn merge_journal_entries<'a>(
    sets: impl IntoIterator<Item = &'a [JournalEntry]>,
) -> Vec<JournalEntry> {
    let mut merged: Vec<JournalEntry> = Vec::new();
    for set in sets {
        for entry in set {
            let existing = merged.iter_mut().find(|m| {
                m.account_code == entry.account_code && m.account_name == entry.account_name
            });
            match existing {
                Some(existing) => existing.absorb(entry),
                None => merged.push(entry.clone()),
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease_accounting::summary::{BalanceSnapshot, PeriodTotals};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(closing: BalanceSnapshot, totals: PeriodTotals) -> WindowSummary {
        WindowSummary {
            from_date: d(2025, 1, 1),
            to_date: d(2025, 12, 31),
            opening: BalanceSnapshot::default(),
            closing,
            totals,
            initial_recognition: None,
            termination: None,
            remaining_rou_life_days: 365,
            short_term: false,
        }
    }

    fn sample_view() -> BasisView {
        let previous = window(
            BalanceSnapshot {
                lease_liability: dec!(20000),
                current_liability: dec!(9000),
                non_current_liability: dec!(11000),
                rou_asset: dec!(21000),
                ..BalanceSnapshot::default()
            },
            PeriodTotals {
                interest: dec!(2500),
                depreciation: dec!(10500),
                rent_paid: dec!(12000),
                ..PeriodTotals::default()
            },
        );
        let current = window(
            BalanceSnapshot {
                lease_liability: dec!(10000),
                current_liability: dec!(10000),
                rou_asset: dec!(10500),
                ..BalanceSnapshot::default()
            },
            PeriodTotals {
                interest: dec!(2000),
                depreciation: dec!(10500),
                rent_paid: dec!(12000),
                ..PeriodTotals::default()
            },
        );
        BasisView { current, previous }
    }

    fn column_sums(entries: &[JournalEntry]) -> [Money; 6] {
        let mut sums = [Decimal::ZERO; 6];
        for e in entries {
            sums[0] += e.opening_balance;
            sums[1] += e.previous_period;
            sums[2] += e.result_period;
            sums[3] += e.incremental_adjustment;
            sums[4] += e.ifrs_adjustment;
            sums[5] += e.usgaap_entry;
        }
        sums
    }

    #[test]
    fn test_columns_balance_to_zero() {
        let entries = build_journal_entries(&sample_view(), None);
        assert_eq!(column_sums(&entries), [Decimal::ZERO; 6]);
        assert_eq!(entries.last().unwrap().account_code, "3100");
    }

    #[test]
    fn test_optional_lines_omitted_when_zero() {
        let entries = build_journal_entries(&sample_view(), None);
        let codes: Vec<&str> = entries.iter().map(|e| e.account_code.as_str()).collect();
        assert_eq!(codes, vec!["2101", "2102", "5101", "1200", "5102", "5103", "3100"]);
    }

    #[test]
    fn test_line_signs_and_columns() {
        let entries = build_journal_entries(&sample_view(), None);
        let line = |code: &str| entries.iter().find(|e| e.account_code == code).unwrap();

        let non_current = line("2101");
        assert_eq!(non_current.previous_period, dec!(-11000));
        assert_eq!(non_current.opening_balance, dec!(-11000));
        assert_eq!(non_current.result_period, Decimal::ZERO);
        assert_eq!(non_current.incremental_adjustment, dec!(11000));

        let interest = line("5101");
        assert_eq!(interest.opening_balance, Decimal::ZERO);
        assert_eq!(interest.result_period, dec!(2000));
        assert_eq!(interest.incremental_adjustment, dec!(-500));

        assert_eq!(line("5103").result_period, dec!(-12000));
        assert_eq!(line("5101").usgaap_entry, Decimal::ZERO);
    }

    #[test]
    fn test_divergence_fills_basis_columns() {
        let view = sample_view();
        let mut usgaap = view.current.clone();
        usgaap.totals.depreciation = dec!(10000);
        usgaap.closing.rou_asset = dec!(11000);
        let entries = build_journal_entries(
            &view,
            Some(Divergence {
                ifrs: &view.current,
                usgaap: &usgaap,
            }),
        );
        let dep = entries.iter().find(|e| e.account_code == "5102").unwrap();
        assert_eq!(dep.ifrs_adjustment, dec!(10500));
        assert_eq!(dep.usgaap_entry, dec!(10000));
        assert_eq!(column_sums(&entries), [Decimal::ZERO; 6]);
    }

    #[test]
    fn test_short_term_view_has_only_rent_lines() {
        let short = window(
            BalanceSnapshot::default(),
            PeriodTotals {
                rent_paid: dec!(6000),
                short_term_expense: dec!(6000),
                ..PeriodTotals::default()
            },
        );
        let view = BasisView {
            current: WindowSummary {
                short_term: true,
                ..short.clone()
            },
            previous: WindowSummary {
                short_term: true,
                ..short
            },
        };
        let entries = build_journal_entries(&view, None);
        let codes: Vec<&str> = entries.iter().map(|e| e.account_code.as_str()).collect();
        assert_eq!(codes, vec!["5103", "5107", "3100"]);
        assert_eq!(entries[2].result_period, Decimal::ZERO);
    }

    #[test]
    fn test_merge_sums_matching_accounts() {
        let a = build_journal_entries(&sample_view(), None);
        let b = build_journal_entries(&sample_view(), None);
        let merged = merge_journal_entries([a.as_slice(), b.as_slice()]);
        assert_eq!(merged.len(), a.len());
        let interest = merged.iter().find(|e| e.account_code == "5101").unwrap();
        assert_eq!(interest.result_period, dec!(4000));
        assert_eq!(column_sums(&merged), [Decimal::ZERO; 6]);
    }
}

//! Undiscounted maturity analysis of remaining lease payments (IFRS 16.58 /
//! ASC 842-20-50-6), reconciled to the discounted lease liability.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::add_months;
use crate::types::Money;
use crate::LeaseEngineResult;

use super::amortization::ScheduleRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityBucket {
    pub label: String,
    /// Exclusive lower bound
    pub after: NaiveDate,
    /// Inclusive upper bound; open-ended for the final bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub through: Option<NaiveDate>,
    pub undiscounted_payments: Money,
    pub payment_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityAnalysis {
    pub as_of: NaiveDate,
    pub buckets: Vec<MaturityBucket>,
    pub total_undiscounted: Money,
    /// Liability standing at `as_of`
    pub lease_liability: Money,
    /// Undiscounted total less the liability
    pub unearned_interest: Money,
}

/// Bucket the payments scheduled after `as_of`.
///
/// `rows` is a schedule in date order. Payments after the last row (for
/// instance those cut off by an early termination) are not included.
pub fn maturity_analysis(
    rows: &[ScheduleRow],
    as_of: NaiveDate,
) -> LeaseEngineResult<MaturityAnalysis> {
    let bounds = [
        ("Year 1", Some(add_months(as_of, 12)?)),
        ("Year 2", Some(add_months(as_of, 24)?)),
        ("Years 3-5", Some(add_months(as_of, 60)?)),
        ("Beyond 5 years", None),
    ];

    let mut buckets = Vec::with_capacity(bounds.len());
    let mut after = as_of;
    for (label, through) in bounds {
        buckets.push(MaturityBucket {
            label: label.to_string(),
            after,
            through,
            undiscounted_payments: Decimal::ZERO,
            payment_count: 0,
        });
        if let Some(t) = through {
            after = t;
        }
    }

    for row in rows.iter().filter(|r| r.date > as_of && !r.rent.is_zero()) {
        let bucket = buckets
            .iter_mut()
            .find(|b| b.through.map_or(true, |t| row.date <= t));
        if let Some(bucket) = bucket {
            bucket.undiscounted_payments += row.rent;
            bucket.payment_count += 1;
        }
    }

    let total_undiscounted: Money = buckets.iter().map(|b| b.undiscounted_payments).sum();
    let has_future = rows.iter().any(|r| r.date > as_of);
    let lease_liability = if has_future {
        rows.iter()
            .take_while(|r| r.date <= as_of)
            .last()
            .map_or(Decimal::ZERO, |r| r.lease_liability)
    } else {
        Decimal::ZERO
    };

    Ok(MaturityAnalysis {
        as_of,
        buckets,
        total_undiscounted,
        lease_liability,
        unearned_interest: total_undiscounted - lease_liability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, rent: Money, liability: Money) -> ScheduleRow {
        ScheduleRow {
            date,
            rent,
            principal: Decimal::ZERO,
            interest: Decimal::ZERO,
            lease_liability: liability,
            remaining_balance: Decimal::ZERO,
            pv_factor: Decimal::ONE,
            pv_of_rent: rent,
            rou_asset: Decimal::ZERO,
            depreciation: Decimal::ZERO,
            impairment: Decimal::ZERO,
            change_in_rou: Decimal::ZERO,
            security_deposit_pv: Decimal::ZERO,
            security_deposit_additions: Decimal::ZERO,
            security_deposit_interest: Decimal::ZERO,
            aro_gross: Decimal::ZERO,
            aro_interest: Decimal::ZERO,
            aro_revision: Decimal::ZERO,
            aro_provision: Decimal::ZERO,
        }
    }

    /// Annual payments of 10,000 every 1 January for seven years
    fn annual_rows() -> Vec<ScheduleRow> {
        (0..7)
            .map(|k| {
                let liability = dec!(50000) - Decimal::from(k) * dec!(7000);
                row(d(2024 + k, 1, 1), dec!(10000), liability)
            })
            .collect()
    }

    #[test]
    fn test_buckets_partition_remaining_payments() {
        let analysis = maturity_analysis(&annual_rows(), d(2024, 6, 30)).unwrap();
        let amounts: Vec<Money> = analysis
            .buckets
            .iter()
            .map(|b| b.undiscounted_payments)
            .collect();
        assert_eq!(amounts, vec![dec!(10000), dec!(10000), dec!(30000), dec!(10000)]);
        assert_eq!(analysis.total_undiscounted, dec!(60000));
        assert_eq!(analysis.lease_liability, dec!(50000));
        assert_eq!(analysis.unearned_interest, dec!(10000));
    }

    #[test]
    fn test_bucket_edges_are_inclusive_of_upper_bound() {
        let analysis = maturity_analysis(&annual_rows(), d(2024, 1, 1)).unwrap();
        assert_eq!(analysis.buckets[0].through, Some(d(2025, 1, 1)));
        assert_eq!(analysis.buckets[0].payment_count, 1);
        assert_eq!(analysis.buckets[3].payment_count, 1);
    }

    #[test]
    fn test_nothing_remaining_after_schedule() {
        let analysis = maturity_analysis(&annual_rows(), d(2031, 1, 1)).unwrap();
        assert_eq!(analysis.total_undiscounted, Decimal::ZERO);
        assert_eq!(analysis.lease_liability, Decimal::ZERO);
    }
}

//! Month-end-safe calendar arithmetic.
//!
//! Every place the engine adds months goes through [`add_months`], which
//! clamps to the last valid day of the target month instead of rolling
//! into the following month.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LeaseEngineError;
use crate::LeaseEngineResult;

// ---------------------------------------------------------------------------
// Day-of-month convention
// ---------------------------------------------------------------------------

/// Day on which payments fall within a month.
///
/// Serialises as a plain number (`15`) or the string `"last"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DayOfMonthRepr", into = "DayOfMonthRepr")]
pub enum DayOfMonth {
    Fixed(u32),
    Last,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DayOfMonthRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<DayOfMonthRepr> for DayOfMonth {
    type Error = String;

    fn try_from(repr: DayOfMonthRepr) -> Result<Self, Self::Error> {
        let day = match repr {
            DayOfMonthRepr::Number(n) => n,
            DayOfMonthRepr::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("last") {
                    return Ok(DayOfMonth::Last);
                }
                s.parse::<u32>()
                    .map_err(|_| format!("day_of_month must be 1-31 or \"last\", got \"{s}\""))?
            }
        };
        if (1..=31).contains(&day) {
            Ok(DayOfMonth::Fixed(day))
        } else {
            Err(format!("day_of_month must be 1-31 or \"last\", got {day}"))
        }
    }
}

impl From<DayOfMonth> for DayOfMonthRepr {
    fn from(day: DayOfMonth) -> Self {
        match day {
            DayOfMonth::Fixed(n) => DayOfMonthRepr::Number(n),
            DayOfMonth::Last => DayOfMonthRepr::Text("last".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Month arithmetic
// ---------------------------------------------------------------------------

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
            if leap {
                29
            } else {
                28
            }
        }
    }
}

/// Shift a (year, month) pair by `n` months, `n` may be negative.
fn shift_month(year: i32, month: u32, n: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + n;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn ymd(year: i32, month: u32, day: u32) -> LeaseEngineResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        LeaseEngineError::DateError(format!("{year}-{month:02}-{day:02} is not a valid date"))
    })
}

/// Add `n` months to `date`, clamping the day to the end of the target month.
///
/// `add_months(2024-01-31, 1)` is 2024-02-29, never 2024-03-02.
pub fn add_months(date: NaiveDate, n: i32) -> LeaseEngineResult<NaiveDate> {
    let (year, month) = shift_month(date.year(), date.month(), n);
    let day = date.day().min(days_in_month(year, month));
    ymd(year, month, day)
}

pub fn end_of_month(date: NaiveDate) -> LeaseEngineResult<NaiveDate> {
    ymd(date.year(), date.month(), days_in_month(date.year(), date.month()))
}

/// Resolve the payment day for a month: a fixed day clamped to the month
/// length, or the month's last day.
pub fn resolve_payment_day(
    year: i32,
    month: u32,
    day_of_month: DayOfMonth,
) -> LeaseEngineResult<NaiveDate> {
    let last = days_in_month(year, month);
    let day = match day_of_month {
        DayOfMonth::Fixed(d) => d.clamp(1, last),
        DayOfMonth::Last => last,
    };
    ymd(year, month, day)
}

/// The payment day `months` months after `origin`'s month, resolved with
/// `day_of_month`. Used to step along a grid without clamping drift.
pub fn shifted_payment_day(
    origin: NaiveDate,
    months: i32,
    day_of_month: DayOfMonth,
) -> LeaseEngineResult<NaiveDate> {
    let (year, month) = shift_month(origin.year(), origin.month(), months);
    resolve_payment_day(year, month, day_of_month)
}

/// Number of dates `start, start+f, start+2f, ...` on or before `end`.
pub fn count_payments(
    start: NaiveDate,
    end: NaiveDate,
    frequency_months: u32,
) -> LeaseEngineResult<u32> {
    if frequency_months == 0 {
        return Err(LeaseEngineError::DegenerateInput {
            field: "frequency_months".into(),
            reason: "Payment frequency must be at least one month".into(),
        });
    }
    let mut count = 0u32;
    while add_months(start, (count * frequency_months) as i32)? <= end {
        count += 1;
    }
    Ok(count)
}

/// Scheduled payment dates from `first` through `end`.
///
/// The first payment falls on `first` itself; later payments fall on the
/// resolved day of every `frequency_months`-th month after it. Each date is
/// derived from `first` directly so clamping never drifts.
pub fn payment_dates(
    first: NaiveDate,
    end: NaiveDate,
    frequency_months: u32,
    day_of_month: Option<DayOfMonth>,
) -> LeaseEngineResult<Vec<NaiveDate>> {
    if frequency_months == 0 {
        return Err(LeaseEngineError::DegenerateInput {
            field: "frequency_months".into(),
            reason: "Payment frequency must be at least one month".into(),
        });
    }
    let convention = day_of_month.unwrap_or(DayOfMonth::Fixed(first.day()));
    let mut dates = Vec::new();
    if first > end {
        return Ok(dates);
    }
    dates.push(first);
    let mut k = 1i32;
    loop {
        let date = shifted_payment_day(first, k * frequency_months as i32, convention)?;
        if date > end {
            break;
        }
        if dates.last().map_or(true, |prev| date > *prev) {
            dates.push(date);
        }
        k += 1;
    }
    Ok(dates)
}

/// Month-end dates falling within `[from, to]`.
pub fn month_ends_between(
    from: NaiveDate,
    to: NaiveDate,
) -> LeaseEngineResult<Vec<NaiveDate>> {
    let mut ends = Vec::new();
    if from > to {
        return Ok(ends);
    }
    let mut cursor = end_of_month(from)?;
    while cursor <= to {
        ends.push(cursor);
        let (year, month) = shift_month(cursor.year(), cursor.month(), 1);
        cursor = ymd(year, month, days_in_month(year, month))?;
    }
    Ok(ends)
}

/// Whole calendar months from `start` to the day after `end`.
pub fn whole_months(start: NaiveDate, end: NaiveDate) -> i32 {
    let after = end.succ_opt().unwrap_or(end);
    let mut months =
        (after.year() - start.year()) * 12 + after.month() as i32 - start.month() as i32;
    if after.day() < start.day() {
        months -= 1;
    }
    months
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

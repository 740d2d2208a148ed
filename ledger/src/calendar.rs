//! # Calendar Arithmetic
//!
//! Pure integer date math for stake maturity. A 12-month lock opened on
//! 29 February 2028 matures on 28 February 2029 — month-granularity,
//! leap-year-aware, day clamped to the end of the target month. That rule
//! is easy to get subtly wrong with duration-based arithmetic ("12 months
//! = 365 days" is off by a day every leap year), so everything here is
//! exact civil-calendar computation on `i64` Unix timestamps.
//!
//! The conversions between day counts and `(year, month, day)` triples are
//! the standard proleptic-Gregorian algorithms (era/day-of-era decomposition
//! over the 400-year cycle). No external state, no date library in the
//! arithmetic path — every function is a total input→output mapping, which
//! is exactly what makes this module exhaustively testable on its own.

/// Seconds per civil day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Gregorian leap-year rule: divisible by 4, not by 100, unless by 400.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`.
///
/// # Panics
///
/// Debug-asserts that `month` is in `1..=12`; callers in this crate only
/// produce months in range.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    debug_assert!((1..=12).contains(&month));
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

/// Converts a count of days since the Unix epoch into `(year, month, day)`.
///
/// Valid over the full proleptic Gregorian calendar; negative inputs are
/// dates before 1970.
pub fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32; // [1, 31]
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32; // [1, 12]
    let year = (yoe + era * 400 + i64::from(month <= 2)) as i32;
    (year, month, day)
}

/// Converts `(year, month, day)` into a count of days since the Unix epoch.
///
/// Inverse of [`civil_from_days`] for any valid civil date.
pub fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = i64::from(year) - i64::from(month <= 2);
    let m = i64::from(month);
    let d = i64::from(day);
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146_097 + doe - 719_468
}

/// Adds `months` to a `(year, month)` pair, carrying years as needed.
pub fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    debug_assert!((1..=12).contains(&month));
    let zero_based = i64::from(month) - 1 + i64::from(months);
    let year = year + (zero_based / 12) as i32;
    let month = (zero_based % 12) as u32 + 1;
    (year, month)
}

/// Computes the maturity timestamp for a lock opened at `start` (Unix
/// seconds, UTC) with a term of `term_months`.
///
/// The target date is `start`'s calendar date plus `term_months` months,
/// with the day-of-month clamped down to the last valid day of the target
/// month (31 Mar + 6mo → 30 Sep; 29 Feb 2028 + 12mo → 28 Feb 2029). The
/// time-of-day is preserved unchanged.
pub fn maturity(start: i64, term_months: u32) -> i64 {
    let days = start.div_euclid(SECONDS_PER_DAY);
    let seconds_of_day = start.rem_euclid(SECONDS_PER_DAY);

    let (year, month, day) = civil_from_days(days);
    let (target_year, target_month) = add_months(year, month, term_months);
    let target_day = day.min(days_in_month(target_year, target_month));

    days_from_civil(target_year, target_month, target_day) * SECONDS_PER_DAY + seconds_of_day
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unix timestamp for midnight UTC of the given civil date.
    fn ts(year: i32, month: u32, day: u32) -> i64 {
        days_from_civil(year, month, day) * SECONDS_PER_DAY
    }

    #[test]
    fn leap_year_rule() {
        assert!(is_leap_year(2028));
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2029));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2025, 1), 31);
        assert_eq!(days_in_month(2025, 4), 30);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2025, 9), 30);
        assert_eq!(days_in_month(2025, 12), 31);
    }

    #[test]
    fn epoch_is_1970_01_01() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(days_from_civil(1970, 1, 1), 0);
    }

    #[test]
    fn civil_conversion_known_dates() {
        // 2025-01-01 is 20089 days after the epoch.
        assert_eq!(days_from_civil(2025, 1, 1), 20_089);
        assert_eq!(civil_from_days(20_089), (2025, 1, 1));
        // Leap day.
        let leap = days_from_civil(2028, 2, 29);
        assert_eq!(civil_from_days(leap), (2028, 2, 29));
        // Pre-epoch.
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn civil_roundtrip_across_century_boundaries() {
        // 1900 and 2100 are the nearest non-leap century years; walk every
        // day of the surrounding Februaries and Marches through both
        // conversions.
        for year in [1899, 1900, 1901, 2099, 2100, 2101] {
            for month in [2u32, 3] {
                for day in 1..=days_in_month(year, month) {
                    let days = days_from_civil(year, month, day);
                    assert_eq!(civil_from_days(days), (year, month, day));
                }
            }
        }
    }

    #[test]
    fn add_months_carries_years() {
        assert_eq!(add_months(2025, 1, 6), (2025, 7));
        assert_eq!(add_months(2025, 8, 6), (2026, 2));
        assert_eq!(add_months(2025, 12, 1), (2026, 1));
        assert_eq!(add_months(2025, 3, 24), (2027, 3));
        assert_eq!(add_months(2025, 7, 12), (2026, 7));
    }

    #[test]
    fn maturity_plain_month_addition() {
        // Jan 1 + 6mo -> Jul 1; Apr 1 + 6mo -> Oct 1.
        assert_eq!(maturity(ts(2025, 1, 1), 6), ts(2025, 7, 1));
        assert_eq!(maturity(ts(2025, 4, 1), 6), ts(2025, 10, 1));
    }

    #[test]
    fn maturity_clamps_to_short_target_month() {
        // Jan 31 + 6mo -> Jul 31 (no clamp needed).
        assert_eq!(maturity(ts(2025, 1, 31), 6), ts(2025, 7, 31));
        // Mar 31 + 6mo -> Sep 30 (clamped).
        assert_eq!(maturity(ts(2025, 3, 31), 6), ts(2025, 9, 30));
        // Mar 30 + 6mo -> Sep 30 (exact fit).
        assert_eq!(maturity(ts(2025, 3, 30), 6), ts(2025, 9, 30));
    }

    #[test]
    fn maturity_handles_leap_day_start() {
        // Feb 29 2028 + 12mo -> Feb 28 2029 (non-leap target).
        assert_eq!(maturity(ts(2028, 2, 29), 12), ts(2029, 2, 28));
        // Feb 28 2028 + 12mo -> Feb 28 2029.
        assert_eq!(maturity(ts(2028, 2, 28), 12), ts(2029, 2, 28));
        // Mar 1 2028 + 12mo -> Mar 1 2029.
        assert_eq!(maturity(ts(2028, 3, 1), 12), ts(2029, 3, 1));
        // Feb 29 2028 + 48mo -> Feb 29 2032 (leap target keeps the day).
        assert_eq!(maturity(ts(2028, 2, 29), 48), ts(2032, 2, 29));
    }

    #[test]
    fn maturity_preserves_time_of_day() {
        let start = ts(2025, 3, 31) + 13 * 3_600 + 45 * 60 + 7;
        let matured = maturity(start, 6);
        assert_eq!(matured, ts(2025, 9, 30) + 13 * 3_600 + 45 * 60 + 7);
    }

    #[test]
    fn maturity_24_month_term() {
        assert_eq!(maturity(ts(2025, 5, 15), 24), ts(2027, 5, 15));
        // Jan 31 + 24mo lands on Jan 31 two years later.
        assert_eq!(maturity(ts(2025, 1, 31), 24), ts(2027, 1, 31));
    }

    #[test]
    fn maturity_of_pre_epoch_start() {
        // Nothing special about negative timestamps; the math is uniform.
        let start = ts(1969, 6, 30);
        assert_eq!(maturity(start, 6), ts(1969, 12, 30));
    }
}

//! Month/day -> calendar date resolution for "free until <Month> <Day>" phrases.
//!
//! Feeds rarely print a year, so the year is guessed relative to `today`:
//! a month ahead (or the current month) stays in the current year, a month
//! more than three months behind wraps to next year, anything in between is
//! read as a date that already passed this year. The guess can be wrong
//! around year boundaries; callers treat it as an estimate.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// Months behind the current month beyond which a date is read as next year.
pub const WRAP_AFTER_MONTHS: u32 = 3;

/// Resolve `month`/`day` against `today`. `None` when the pair is not a real date.
pub fn resolve_end_date(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let current_month = today.month();
    let year = if month >= current_month {
        today.year()
    } else if current_month - month > WRAP_AFTER_MONTHS {
        today.year() + 1
    } else {
        today.year()
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Last second of `date` in UTC; promotions run through the named day.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
        .and_utc()
}

/// Month number for an English month name or its three-letter prefix.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_ahead_stays_in_current_year() {
        let today = d(2026, 3, 15);
        assert_eq!(resolve_end_date(4, 2, today), Some(d(2026, 4, 2)));
        assert_eq!(resolve_end_date(12, 31, today), Some(d(2026, 12, 31)));
    }

    #[test]
    fn same_month_stays_in_current_year_before_and_after_today() {
        let today = d(2026, 6, 15);
        assert_eq!(resolve_end_date(6, 20, today), Some(d(2026, 6, 20)));
        assert_eq!(resolve_end_date(6, 15, today), Some(d(2026, 6, 15)));
        // earlier this month: already over, not next year
        assert_eq!(resolve_end_date(6, 1, today), Some(d(2026, 6, 1)));
    }

    #[test]
    fn up_to_three_months_behind_is_this_year_and_expired() {
        let today = d(2026, 10, 18);
        assert_eq!(resolve_end_date(9, 30, today), Some(d(2026, 9, 30)));
        assert_eq!(resolve_end_date(7, 1, today), Some(d(2026, 7, 1)));
    }

    #[test]
    fn more_than_three_months_behind_wraps_to_next_year() {
        let today = d(2026, 10, 18);
        assert_eq!(resolve_end_date(6, 30, today), Some(d(2027, 6, 30)));
        assert_eq!(resolve_end_date(1, 5, today), Some(d(2027, 1, 5)));
    }

    #[test]
    fn december_reading_january_wraps() {
        let today = d(2026, 12, 28);
        assert_eq!(resolve_end_date(1, 4, today), Some(d(2027, 1, 4)));
        assert_eq!(resolve_end_date(12, 31, today), Some(d(2026, 12, 31)));
    }

    #[test]
    fn january_reading_late_autumn_stays_in_current_year() {
        // a November promo seen in early January is most likely last year's,
        // but November is "ahead" in month order so the current year wins
        let today = d(2027, 1, 2);
        assert_eq!(resolve_end_date(11, 30, today), Some(d(2027, 11, 30)));
    }

    #[test]
    fn boundary_of_wrap_window() {
        let today = d(2026, 5, 10);
        // exactly three months behind: current year
        assert_eq!(resolve_end_date(2, 10, today), Some(d(2026, 2, 10)));
        // four months behind: next year
        assert_eq!(resolve_end_date(1, 10, today), Some(d(2027, 1, 10)));
    }

    #[test]
    fn invalid_dates_resolve_to_none() {
        let today = d(2026, 3, 1);
        assert_eq!(resolve_end_date(2, 30, today), None);
        assert_eq!(resolve_end_date(4, 31, today), None);
        assert_eq!(resolve_end_date(13, 1, today), None);
        assert_eq!(resolve_end_date(0, 1, today), None);
        assert_eq!(resolve_end_date(5, 0, today), None);
        // 2026 is not a leap year
        assert_eq!(resolve_end_date(2, 29, d(2026, 1, 10)), None);
        assert_eq!(resolve_end_date(2, 29, d(2028, 1, 10)), Some(d(2028, 2, 29)));
    }

    #[test]
    fn end_of_day_is_last_second() {
        let end = end_of_day(d(2026, 1, 5));
        assert_eq!(end.to_rfc3339(), "2026-01-05T23:59:59+00:00");
    }

    #[test]
    fn month_names_and_abbreviations() {
        assert_eq!(month_from_name("January"), Some(1));
        assert_eq!(month_from_name("sept"), Some(9));
        assert_eq!(month_from_name("Dec."), Some(12));
        assert_eq!(month_from_name("May"), Some(5));
        assert_eq!(month_from_name("Smarch"), None);
        assert_eq!(month_from_name("ja"), None);
    }
}

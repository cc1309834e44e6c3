//! # Calendar Rules
//!
//! Month partition keys, financial years and import-date parsing.
//!
//! ## Month Keys
//! ```text
//! receiptDate 2025-09-14  ──► "Sep2025"  ──► moneyReceipts/Sep2025
//! unparseable date        ──► "UnknownMonth"
//! ```
//!
//! Keys are computed in the business timezone (UTC+05:30), whatever the
//! timezone of the machine running the engine.
//!
//! ## Financial Year
//! ```text
//! ┌──────────── FY 2024-2025 ────────────┐┌──────── FY 2025-2026 ...
//! │ Apr 2024  May ... Dec 2024 ... Mar 2025││ Apr 2025 ...
//! └──────────────────────────────────────┘└────────────────────────
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use ts_rs::TS;

/// Partition for imported rows whose date could not be read.
pub const UNKNOWN_MONTH: &str = "UnknownMonth";

/// Business timezone offset (IST) in seconds east of UTC.
pub const BUSINESS_UTC_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch.
const SPREADSHEET_UNIX_EPOCH_DAYS: f64 = 25569.0;

// =============================================================================
// Month Keys
// =============================================================================

/// Month partition key for a calendar date: `"Sep2025"`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%b%Y").to_string()
}

/// Calendar date of an instant in the business timezone.
pub fn business_date(at: DateTime<Utc>) -> NaiveDate {
    (at + Duration::seconds(BUSINESS_UTC_OFFSET_SECS)).date_naive()
}

/// Month partition key for an instant, evaluated in the business timezone.
pub fn month_key_at(at: DateTime<Utc>) -> String {
    month_key(business_date(at))
}

/// First day of the month a key names, or `None` for malformed keys and
/// the `UnknownMonth` sentinel.
pub fn parse_month_key(key: &str) -> Option<NaiveDate> {
    if key == UNKNOWN_MONTH {
        return None;
    }
    NaiveDate::parse_from_str(&format!("01{}", key.trim()), "%d%b%Y").ok()
}

/// Chronological ordering of month keys; unparseable keys sort last, by name.
pub fn compare_month_keys(a: &str, b: &str) -> Ordering {
    match (parse_month_key(a), parse_month_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

// =============================================================================
// Financial Year
// =============================================================================

/// April-to-March accounting year, identified by the calendar year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FinancialYear {
    pub start_year: i32,
}

impl FinancialYear {
    /// Financial year containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 4 {
            date.year()
        } else {
            date.year() - 1
        };
        FinancialYear { start_year }
    }

    /// April 1 of the start year.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year, 4, 1)
    }

    /// March 31 of the following year.
    pub fn last_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year + 1, 3, 31)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// Position of a calendar month within the year: April = 0, March = 11.
    pub fn month_index(month: u32) -> u32 {
        (month + 8) % 12
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.start_year + 1)
    }
}

// =============================================================================
// Import Dates
// =============================================================================

/// Reads a receipt date from a spreadsheet cell.
///
/// ## Accepted Forms
/// ```text
/// 45914            spreadsheet serial (days since 1899-12-30)
/// 14-09-2025       day first
/// 14/09/25         day first, two-digit year → 2025
/// 2025-09-14       year first (first component > 31)
/// 2025-09-14T...   time part ignored
/// ```
///
/// Returns `None` when nothing sensible can be read; callers route such
/// rows to [`UNKNOWN_MONTH`].
pub fn parse_import_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    if !cell.contains('-') && !cell.contains('/') {
        let serial: f64 = cell.parse().ok()?;
        return from_spreadsheet_serial(serial);
    }

    let date_part = cell
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(cell);
    let separator = if date_part.contains('-') { '-' } else { '/' };
    let parts: Vec<&str> = date_part.split(separator).map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<i32> = parts
        .iter()
        .map(|p| p.parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (year, month, day) = if nums[0] > 31 {
        (nums[0], nums[1], nums[2])
    } else {
        let year = if parts[2].len() <= 2 { 2000 + nums[2] } else { nums[2] };
        (year, nums[1], nums[0])
    };

    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Converts a spreadsheet serial to a business-timezone date.
pub fn from_spreadsheet_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let seconds = ((serial - SPREADSHEET_UNIX_EPOCH_DAYS) * 86_400.0).round() as i64;
    DateTime::from_timestamp(seconds, 0).map(business_date)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_key() {
        assert_eq!(month_key(ymd(2025, 9, 14)), "Sep2025");
        assert_eq!(month_key(ymd(2024, 1, 1)), "Jan2024");
    }

    #[test]
    fn test_month_key_uses_business_timezone() {
        // 2025-08-31 20:00 UTC is already 1 September in IST
        let at = Utc.with_ymd_and_hms(2025, 8, 31, 20, 0, 0).unwrap();
        assert_eq!(month_key_at(at), "Sep2025");

        let at = Utc.with_ymd_and_hms(2025, 8, 31, 18, 0, 0).unwrap();
        assert_eq!(month_key_at(at), "Aug2025");
    }

    #[test]
    fn test_parse_and_order_month_keys() {
        assert_eq!(parse_month_key("Sep2025"), Some(ymd(2025, 9, 1)));
        assert_eq!(parse_month_key(UNKNOWN_MONTH), None);
        assert_eq!(parse_month_key("Sept2025"), None);

        let mut keys = vec!["Jan2025", UNKNOWN_MONTH, "Dec2024", "Mar2025"];
        keys.sort_by(|a, b| compare_month_keys(a, b));
        assert_eq!(keys, vec!["Dec2024", "Jan2025", "Mar2025", UNKNOWN_MONTH]);
    }

    #[test]
    fn test_financial_year_boundary() {
        let march = FinancialYear::of(ymd(2025, 3, 31));
        let april = FinancialYear::of(ymd(2025, 4, 1));
        assert_eq!(march.to_string(), "2024-2025");
        assert_eq!(april.to_string(), "2025-2026");
        assert!(march < april);
        assert_eq!(march.first_day(), Some(ymd(2024, 4, 1)));
        assert_eq!(march.last_day(), Some(ymd(2025, 3, 31)));
    }

    #[test]
    fn test_month_index() {
        assert_eq!(FinancialYear::month_index(4), 0);
        assert_eq!(FinancialYear::month_index(12), 8);
        assert_eq!(FinancialYear::month_index(3), 11);
    }

    #[test]
    fn test_parse_import_date_strings() {
        assert_eq!(parse_import_date("14-09-2025"), Some(ymd(2025, 9, 14)));
        assert_eq!(parse_import_date("14/09/25"), Some(ymd(2025, 9, 14)));
        assert_eq!(parse_import_date("2025-09-14"), Some(ymd(2025, 9, 14)));
        assert_eq!(parse_import_date("2025-09-14T10:00:00Z"), Some(ymd(2025, 9, 14)));
        assert_eq!(parse_import_date("31/02/2025"), None);
        assert_eq!(parse_import_date("yesterday"), None);
        assert_eq!(parse_import_date(""), None);
    }

    #[test]
    fn test_parse_import_date_serial() {
        // 45914 is 2025-09-14 in spreadsheet serial form
        assert_eq!(parse_import_date("45914"), Some(ymd(2025, 9, 14)));
        assert_eq!(parse_import_date("0"), None);
    }
}

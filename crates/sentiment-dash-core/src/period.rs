//! Period resolution: symbolic reporting windows to concrete instants.
//!
//! [`resolve`] turns a [`PeriodSelector`] and a reference instant into a
//! [`ResolvedPeriod`] in the reporting timezone. It is pure and
//! deterministic; "now" is always passed in by the caller.
//!
//! # Boundary Rules
//!
//! | Selector | Start | End |
//! |----------|-------|-----|
//! | `Week` | Monday 00:00:00 | Sunday 23:59:59 |
//! | `Month` | 1st 00:00:00 | first of next month − 1s |
//! | `Quarter` | 1st of quarter 00:00:00 | first of next quarter − 1s (Q4: Dec 31 23:59:59) |
//! | `LastNDays(n)` | reference − n days | reference |
//! | `Custom(a, b)` | `a` 00:00:00 | `b` 23:59:59.999 |
//!
//! Calendar boundaries are computed on the reporting timezone's wall clock.
//! The reference instant is converted into that timezone before any
//! truncation to a day, so a UTC instant just after midnight still belongs
//! to the previous local day.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::DashboardError;

/// Timezone used for all calendar boundaries unless configured otherwise.
pub const DEFAULT_REPORTING_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Look-back windows offered by the period picker.
pub const LOOKBACK_DAYS: [u32; 4] = [7, 30, 90, 1095];

/// Symbolic choice of reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodSelector {
    Week,
    Month,
    Quarter,
    /// Rolling window ending at the reference instant. Only the values in
    /// [`LOOKBACK_DAYS`] are valid.
    LastNDays(u32),
    /// Inclusive calendar-date range, start first.
    Custom(NaiveDate, NaiveDate),
}

impl PeriodSelector {
    pub fn last_n_days(n: u32) -> Result<Self, DashboardError> {
        if LOOKBACK_DAYS.contains(&n) {
            Ok(PeriodSelector::LastNDays(n))
        } else {
            Err(DashboardError::UnsupportedPeriod(format!(
                "last {} days (allowed: 7, 30, 90, 1095)",
                n
            )))
        }
    }

    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, DashboardError> {
        if start > end {
            return Err(DashboardError::InvalidRange { start, end });
        }
        Ok(PeriodSelector::Custom(start, end))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, PeriodSelector::Custom(..))
    }

    /// Human label, as shown in the period picker.
    pub fn label(&self) -> String {
        match self {
            PeriodSelector::Week => "This Week".to_string(),
            PeriodSelector::Month => "This Month".to_string(),
            PeriodSelector::Quarter => "This Quarter".to_string(),
            PeriodSelector::LastNDays(1095) => "Last 3 Years".to_string(),
            PeriodSelector::LastNDays(n) => format!("Last {} Days", n),
            PeriodSelector::Custom(start, end) => format!("Custom ({} to {})", start, end),
        }
    }
}

impl fmt::Display for PeriodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodSelector::Week => f.write_str("week"),
            PeriodSelector::Month => f.write_str("month"),
            PeriodSelector::Quarter => f.write_str("quarter"),
            PeriodSelector::LastNDays(n) => write!(f, "last-{}-days", n),
            PeriodSelector::Custom(start, end) => write!(f, "custom:{}..{}", start, end),
        }
    }
}

impl FromStr for PeriodSelector {
    type Err = DashboardError;

    /// Accepts `week`, `month`, `quarter`, `last-N-days` (or `Nd`),
    /// `last-3-years`, and `custom:YYYY-MM-DD..YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();

        if let Some(range) = raw.strip_prefix("custom:") {
            let (start, end) = range.split_once("..").ok_or_else(|| {
                DashboardError::UnsupportedPeriod(format!(
                    "'{}': expected custom:YYYY-MM-DD..YYYY-MM-DD",
                    s.trim()
                ))
            })?;
            return PeriodSelector::custom(parse_date(start)?, parse_date(end)?);
        }

        match raw.as_str() {
            "week" | "this-week" => return Ok(PeriodSelector::Week),
            "month" | "this-month" => return Ok(PeriodSelector::Month),
            "quarter" | "this-quarter" => return Ok(PeriodSelector::Quarter),
            "last-3-years" => return Ok(PeriodSelector::LastNDays(1095)),
            _ => {}
        }

        let days = raw
            .strip_prefix("last-")
            .and_then(|rest| rest.strip_suffix("-days"))
            .or_else(|| raw.strip_suffix('d'))
            .and_then(|n| n.parse::<u32>().ok());

        match days {
            Some(n) => PeriodSelector::last_n_days(n),
            None => Err(DashboardError::UnsupportedPeriod(format!(
                "'{}'. Use week, month, quarter, last-N-days, or custom:START..END",
                s.trim()
            ))),
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, DashboardError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
        DashboardError::UnsupportedPeriod(format!("invalid date '{}': {}", s.trim(), e))
    })
}

/// Concrete interval derived from a selector, in the reporting timezone.
///
/// Both ends are inclusive. The ISO strings are embedded verbatim into
/// query filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeriod {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    start_iso: String,
    end_iso: String,
}

impl ResolvedPeriod {
    fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        debug_assert!(start <= end);
        Self {
            start_iso: start.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            end_iso: end.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            start,
            end,
        }
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    pub fn start_iso(&self) -> &str {
        &self.start_iso
    }

    pub fn end_iso(&self) -> &str {
        &self.end_iso
    }

    /// Whether `instant` falls inside the interval, ends included.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }
}

/// Resolve `selector` against `reference` in the reporting timezone `tz`.
///
/// # Errors
///
/// - [`DashboardError::InvalidRange`] for a custom range whose start is
///   after its end.
/// - [`DashboardError::UnsupportedPeriod`] for a look-back outside
///   [`LOOKBACK_DAYS`], or a date outside chrono's representable range.
pub fn resolve(
    selector: &PeriodSelector,
    reference: DateTime<Utc>,
    tz: Tz,
) -> Result<ResolvedPeriod, DashboardError> {
    let local = reference.with_timezone(&tz);
    let today = local.date_naive();
    let out_of_range =
        || DashboardError::UnsupportedPeriod(format!("{} near {} is out of range", selector, today));

    let (start, end) = match *selector {
        PeriodSelector::Week => {
            let back = Days::new(u64::from(today.weekday().num_days_from_monday()));
            let monday = today.checked_sub_days(back).ok_or_else(out_of_range)?;
            let sunday = monday.checked_add_days(Days::new(6)).ok_or_else(out_of_range)?;
            (
                monday.and_time(NaiveTime::MIN),
                sunday.and_time(last_second().ok_or_else(out_of_range)?),
            )
        }
        PeriodSelector::Month => {
            let first = first_of_month(today.year(), today.month()).ok_or_else(out_of_range)?;
            let next_first = if today.month() == 12 {
                first_of_month(today.year() + 1, 1)
            } else {
                first_of_month(today.year(), today.month() + 1)
            }
            .ok_or_else(out_of_range)?;
            (
                first.and_time(NaiveTime::MIN),
                one_second_before(next_first).ok_or_else(out_of_range)?,
            )
        }
        PeriodSelector::Quarter => {
            let quarter = (today.month() - 1) / 3 + 1;
            let first_month = 3 * (quarter - 1) + 1;
            let first = first_of_month(today.year(), first_month).ok_or_else(out_of_range)?;
            let end = if quarter == 4 {
                NaiveDate::from_ymd_opt(today.year(), 12, 31)
                    .ok_or_else(out_of_range)?
                    .and_time(last_second().ok_or_else(out_of_range)?)
            } else {
                let next_first =
                    first_of_month(today.year(), first_month + 3).ok_or_else(out_of_range)?;
                one_second_before(next_first).ok_or_else(out_of_range)?
            };
            (first.and_time(NaiveTime::MIN), end)
        }
        PeriodSelector::LastNDays(n) => {
            if !LOOKBACK_DAYS.contains(&n) {
                return Err(DashboardError::UnsupportedPeriod(format!(
                    "last {} days (allowed: 7, 30, 90, 1095)",
                    n
                )));
            }
            // Same wall-clock time n days back, re-pinned across any DST change.
            let start = local
                .naive_local()
                .checked_sub_days(Days::new(u64::from(n)))
                .ok_or_else(out_of_range)?;
            return Ok(ResolvedPeriod::new(localize(tz, start), local));
        }
        PeriodSelector::Custom(start, end) => {
            if start > end {
                return Err(DashboardError::InvalidRange { start, end });
            }
            let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).ok_or_else(out_of_range)?;
            (start.and_time(NaiveTime::MIN), end.and_time(end_of_day))
        }
    };

    Ok(ResolvedPeriod::new(localize(tz, start), localize(tz, end)))
}

/// Resolve against a reference instant that carries no timezone.
///
/// The naive value is taken as UTC and converted into `tz` before any
/// calendar arithmetic.
pub fn resolve_naive(
    selector: &PeriodSelector,
    reference: NaiveDateTime,
    tz: Tz,
) -> Result<ResolvedPeriod, DashboardError> {
    resolve(selector, Utc.from_utc_datetime(&reference), tz)
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn last_second() -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(23, 59, 59)
}

fn one_second_before(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_time(NaiveTime::MIN)
        .checked_sub_signed(Duration::seconds(1))
}

/// Pin a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (clocks falling back) take the earlier instant. Times
/// inside a gap (clocks springing forward) move forward to the first valid
/// minute.
fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let mut probe = naive;
            // Some zones have skipped an entire calendar day.
            for _ in 0..(26 * 60) {
                probe += Duration::minutes(1);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Weekday};

    const NY: Tz = DEFAULT_REPORTING_TIMEZONE;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_spans_monday_to_sunday() {
        let p = resolve(&PeriodSelector::Week, utc("2024-06-13T15:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-06-10T00:00:00-04:00");
        assert_eq!(p.end_iso(), "2024-06-16T23:59:59-04:00");
    }

    #[test]
    fn test_week_always_monday_through_sunday() {
        let mut t = utc("2024-01-01T00:00:00Z");
        // Step 7 hours at a time across a full year, crossing both DST changes.
        for _ in 0..1252 {
            let p = resolve(&PeriodSelector::Week, t, NY).unwrap();
            assert_eq!(p.start().weekday(), Weekday::Mon, "reference {}", t);
            assert_eq!(
                (p.start().hour(), p.start().minute(), p.start().second()),
                (0, 0, 0)
            );
            assert_eq!(p.end().weekday(), Weekday::Sun, "reference {}", t);
            assert_eq!(
                (p.end().hour(), p.end().minute(), p.end().second()),
                (23, 59, 59)
            );
            assert_eq!(
                p.end().date_naive() - p.start().date_naive(),
                Duration::days(6)
            );
            assert!(p.contains(&t));
            t += Duration::hours(7);
        }
    }

    #[test]
    fn test_week_uses_local_day_near_midnight() {
        // Monday 03:00 UTC is still Sunday evening in New York.
        let p = resolve(&PeriodSelector::Week, utc("2024-06-17T03:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-06-10T00:00:00-04:00");
        assert_eq!(p.end_iso(), "2024-06-16T23:59:59-04:00");
    }

    #[test]
    fn test_week_across_dst_start() {
        let p = resolve(&PeriodSelector::Week, utc("2024-03-08T12:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-03-04T00:00:00-05:00");
        assert_eq!(p.end_iso(), "2024-03-10T23:59:59-04:00");
    }

    #[test]
    fn test_month_leap_february() {
        let p = resolve(&PeriodSelector::Month, utc("2024-02-10T12:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-02-01T00:00:00-05:00");
        assert_eq!(p.end_iso(), "2024-02-29T23:59:59-05:00");
    }

    #[test]
    fn test_month_december_rolls_year() {
        let p = resolve(&PeriodSelector::Month, utc("2024-12-05T12:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-12-01T00:00:00-05:00");
        assert_eq!(p.end_iso(), "2024-12-31T23:59:59-05:00");
    }

    #[test]
    fn test_month_uses_local_day_near_midnight() {
        // 02:30 UTC on June 1st is 22:30 on May 31st in New York.
        let p = resolve(&PeriodSelector::Month, utc("2024-06-01T02:30:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-05-01T00:00:00-04:00");
        assert_eq!(p.end_iso(), "2024-05-31T23:59:59-04:00");
    }

    #[test]
    fn test_quarter_first() {
        let p = resolve(&PeriodSelector::Quarter, utc("2025-02-10T12:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2025-01-01T00:00:00-05:00");
        assert_eq!(p.end_iso(), "2025-03-31T23:59:59-04:00");
    }

    #[test]
    fn test_quarter_third() {
        let p = resolve(&PeriodSelector::Quarter, utc("2024-09-30T12:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-07-01T00:00:00-04:00");
        assert_eq!(p.end_iso(), "2024-09-30T23:59:59-04:00");
    }

    #[test]
    fn test_quarter_four_ends_december_31() {
        let mut day = date(2024, 10, 1);
        while day <= date(2024, 12, 31) {
            let t = day.and_hms_opt(12, 0, 0).unwrap().and_utc();
            let p = resolve(&PeriodSelector::Quarter, t, NY).unwrap();
            assert_eq!(p.start_iso(), "2024-10-01T00:00:00-04:00");
            assert_eq!(p.end().date_naive(), date(2024, 12, 31));
            assert_eq!(p.end_iso(), "2024-12-31T23:59:59-05:00");
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_last_n_days_keeps_time_of_day() {
        let p = resolve(
            &PeriodSelector::LastNDays(7),
            utc("2024-06-15T12:00:00Z"),
            NY,
        )
        .unwrap();
        assert_eq!(p.start_iso(), "2024-06-08T08:00:00-04:00");
        assert_eq!(p.end_iso(), "2024-06-15T08:00:00-04:00");
    }

    #[test]
    fn test_last_n_days_across_spring_forward() {
        // 02:30 EDT; 02:30 on Mar 10 never happened in New York.
        let p = resolve(
            &PeriodSelector::LastNDays(7),
            utc("2024-03-17T06:30:00Z"),
            NY,
        )
        .unwrap();
        assert_eq!(p.start_iso(), "2024-03-10T03:00:00-04:00");
        assert_eq!(p.end_iso(), "2024-03-17T02:30:00-04:00");
    }

    #[test]
    fn test_last_n_days_across_fall_back() {
        // 01:30 EST; 01:30 on Nov 3 happened twice, the first in EDT.
        let p = resolve(
            &PeriodSelector::LastNDays(7),
            utc("2024-11-10T06:30:00Z"),
            NY,
        )
        .unwrap();
        assert_eq!(p.start_iso(), "2024-11-03T01:30:00-04:00");
        assert_eq!(p.end_iso(), "2024-11-10T01:30:00-05:00");
    }

    #[test]
    fn test_last_three_years() {
        let p = resolve(
            &PeriodSelector::LastNDays(1095),
            utc("2024-06-15T12:00:00Z"),
            NY,
        )
        .unwrap();
        assert_eq!(p.end_iso(), "2024-06-15T08:00:00-04:00");
        assert_eq!(p.start().date_naive(), date(2021, 6, 16));
    }

    #[test]
    fn test_last_n_days_rejects_unknown_window() {
        let err = resolve(
            &PeriodSelector::LastNDays(5),
            utc("2024-06-15T12:00:00Z"),
            NY,
        )
        .unwrap_err();
        assert!(matches!(err, DashboardError::UnsupportedPeriod(_)));
        assert!(PeriodSelector::last_n_days(14).is_err());
        assert_eq!(
            PeriodSelector::last_n_days(30).unwrap(),
            PeriodSelector::LastNDays(30)
        );
    }

    #[test]
    fn test_custom_single_day() {
        let d = date(2024, 1, 15);
        let p = resolve(&PeriodSelector::Custom(d, d), utc("2024-06-15T12:00:00Z"), NY).unwrap();
        assert_eq!(p.start_iso(), "2024-01-15T00:00:00-05:00");
        assert_eq!(p.end_iso(), "2024-01-15T23:59:59.999-05:00");
        assert_eq!(p.end() - p.start(), Duration::milliseconds(86_399_999));
    }

    #[test]
    fn test_custom_reversed_is_invalid_range() {
        let (a, b) = (date(2024, 3, 2), date(2024, 3, 1));
        let err = resolve(&PeriodSelector::Custom(a, b), utc("2024-06-15T12:00:00Z"), NY)
            .unwrap_err();
        assert_eq!(err, DashboardError::InvalidRange { start: a, end: b });
        assert!(matches!(
            PeriodSelector::custom(a, b),
            Err(DashboardError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_naive_reference_is_treated_as_utc() {
        let naive = date(2024, 6, 17).and_hms_opt(3, 0, 0).unwrap();
        let from_naive = resolve_naive(&PeriodSelector::Week, naive, NY).unwrap();
        let from_utc = resolve(&PeriodSelector::Week, utc("2024-06-17T03:00:00Z"), NY).unwrap();
        assert_eq!(from_naive, from_utc);
    }

    #[test]
    fn test_other_reporting_timezone() {
        let p = resolve(
            &PeriodSelector::Month,
            utc("2024-06-30T23:30:00Z"),
            chrono_tz::Asia::Tokyo,
        )
        .unwrap();
        assert_eq!(p.start_iso(), "2024-07-01T00:00:00+09:00");
        assert_eq!(p.end_iso(), "2024-07-31T23:59:59+09:00");
    }

    #[test]
    fn test_parse_selectors() {
        assert_eq!("week".parse::<PeriodSelector>().unwrap(), PeriodSelector::Week);
        assert_eq!("This-Month".parse::<PeriodSelector>().unwrap(), PeriodSelector::Month);
        assert_eq!("quarter".parse::<PeriodSelector>().unwrap(), PeriodSelector::Quarter);
        assert_eq!(
            "last-30-days".parse::<PeriodSelector>().unwrap(),
            PeriodSelector::LastNDays(30)
        );
        assert_eq!("90d".parse::<PeriodSelector>().unwrap(), PeriodSelector::LastNDays(90));
        assert_eq!(
            "last-3-years".parse::<PeriodSelector>().unwrap(),
            PeriodSelector::LastNDays(1095)
        );
        assert_eq!(
            "custom:2024-01-01..2024-01-31".parse::<PeriodSelector>().unwrap(),
            PeriodSelector::Custom(date(2024, 1, 1), date(2024, 1, 31))
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            "fortnight".parse::<PeriodSelector>(),
            Err(DashboardError::UnsupportedPeriod(_))
        ));
        assert!(matches!(
            "last-12-days".parse::<PeriodSelector>(),
            Err(DashboardError::UnsupportedPeriod(_))
        ));
        assert!(matches!(
            "custom:2024-02-01..2024-01-01".parse::<PeriodSelector>(),
            Err(DashboardError::InvalidRange { .. })
        ));
        assert!(matches!(
            "custom:2024-02-01".parse::<PeriodSelector>(),
            Err(DashboardError::UnsupportedPeriod(_))
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for sel in [
            PeriodSelector::Week,
            PeriodSelector::LastNDays(1095),
            PeriodSelector::Custom(date(2024, 5, 1), date(2024, 5, 9)),
        ] {
            assert_eq!(sel.to_string().parse::<PeriodSelector>().unwrap(), sel);
        }
        assert_eq!(PeriodSelector::LastNDays(1095).label(), "Last 3 Years");
        assert_eq!(PeriodSelector::LastNDays(7).label(), "Last 7 Days");
    }
}

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2200;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 30,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("year must be between {} and {}", MIN_YEAR, MAX_YEAR)]
    YearOutOfRange,
    #[error("month must be between 1 and 12")]
    MonthOutOfRange,
    #[error("day must be between 1 and {max}")]
    DayOutOfRange { max: u32 },
    #[error("not a YYYY-MM-DD date: {0}")]
    NotIso(String),
    #[error("expected YYYY-MM-DD or {{year, month, day}}")]
    Malformed,
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("End date must be on or after the start date")]
    Reversed,
}

fn year_arg(y: i64) -> Result<i32, DateError> {
    i32::try_from(y).map_err(|_| DateError::YearOutOfRange)
}

fn month_arg(m: i64) -> Result<u32, DateError> {
    u32::try_from(m).map_err(|_| DateError::MonthOutOfRange)
}

/// Month/day/year triple behind a three-select date picker. The day always
/// fits the selected month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateSelect {
    year: i32,
    month: u32,
    day: u32,
}

impl DateSelect {
    /// Builds a selection; a day past the end of the month is clamped the
    /// same way a month change would clamp it.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(DateError::YearOutOfRange);
        }
        if !(1..=12).contains(&month) {
            return Err(DateError::MonthOutOfRange);
        }
        let max = days_in_month(year, month);
        if day == 0 {
            return Err(DateError::DayOutOfRange { max });
        }
        Ok(Self {
            year,
            month,
            day: day.min(max),
        })
    }

    /// Same as [`DateSelect::new`] for untrusted JSON integers.
    pub fn from_parts(year: i64, month: i64, day: i64) -> Result<Self, DateError> {
        let year = year_arg(year)?;
        let month = month_arg(month)?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(DateError::YearOutOfRange);
        }
        if !(1..=12).contains(&month) {
            return Err(DateError::MonthOutOfRange);
        }
        let max = days_in_month(year, month);
        // anything past u32 is still "past the end of the month"
        let day = match u32::try_from(day) {
            Ok(d) => d,
            Err(_) if day > 0 => u32::MAX,
            Err(_) => return Err(DateError::DayOutOfRange { max }),
        };
        Self::new(year, month, day)
    }

    pub fn from_date(d: NaiveDate) -> Self {
        Self {
            year: d.year(),
            month: d.month(),
            day: d.day(),
        }
    }

    pub fn parse_iso(s: &str) -> Result<Self, DateError> {
        crate::validate::parse_date(s)
            .map(Self::from_date)
            .ok_or_else(|| DateError::NotIso(s.to_string()))
    }

    /// Accepts either `"YYYY-MM-DD"` or `{year, month, day}`.
    pub fn from_json(v: &serde_json::Value) -> Result<Self, DateError> {
        if let Some(s) = v.as_str() {
            return Self::parse_iso(s);
        }
        let num = |k: &str| v.get(k).and_then(|x| x.as_i64());
        match (num("year"), num("month"), num("day")) {
            (Some(y), Some(m), Some(d)) => Self::from_parts(y, m, d),
            _ => Err(DateError::Malformed),
        }
    }

    /// Applies year, then month, then day changes. Year and month changes
    /// clamp the day; an explicit day must exist in the resulting month.
    pub fn adjust(&mut self, year: Option<i64>, month: Option<i64>, day: Option<i64>) -> Result<(), DateError> {
        if let Some(y) = year {
            self.set_year(year_arg(y)?)?;
        }
        if let Some(m) = month {
            self.set_month(month_arg(m)?)?;
        }
        if let Some(d) = day {
            let max = self.days_in_month();
            self.set_day(u32::try_from(d).map_err(|_| DateError::DayOutOfRange { max })?)?;
        }
        Ok(())
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn set_month(&mut self, month: u32) -> Result<(), DateError> {
        *self = Self::new(self.year, month, self.day)?;
        Ok(())
    }

    pub fn set_year(&mut self, year: i32) -> Result<(), DateError> {
        *self = Self::new(year, self.month, self.day)?;
        Ok(())
    }

    /// Unlike month/year changes, picking a day the month does not have is
    /// an error: the day select never offers it.
    pub fn set_day(&mut self, day: u32) -> Result<(), DateError> {
        if day == 0 || day > self.days_in_month() {
            return Err(DateError::DayOutOfRange {
                max: self.days_in_month(),
            });
        }
        self.day = day;
        Ok(())
    }

    pub fn to_iso(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "year": self.year,
            "month": self.month,
            "day": self.day,
            "daysInMonth": self.days_in_month(),
            "iso": self.to_iso(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRangeSelect {
    pub start: DateSelect,
    pub end: DateSelect,
}

impl DateRangeSelect {
    pub fn new(start: DateSelect, end: DateSelect) -> Result<Self, DateError> {
        if start > end {
            return Err(DateError::Reversed);
        }
        Ok(Self { start, end })
    }

    /// Reads `params.start` / `params.end`.
    pub fn from_params(params: &serde_json::Value) -> Result<Self, DateError> {
        let start = params
            .get("start")
            .ok_or(DateError::Missing("start"))
            .and_then(DateSelect::from_json)?;
        let end = params
            .get("end")
            .ok_or(DateError::Missing("end"))
            .and_then(DateSelect::from_json)?;
        Self::new(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn february_clamps_by_leap_year() {
        let mut d = DateSelect::new(2024, 1, 31).expect("date");
        d.set_month(2).expect("month");
        assert_eq!(d.to_iso(), "2024-02-29");

        let mut d = DateSelect::new(2023, 1, 31).expect("date");
        d.set_month(2).expect("month");
        assert_eq!(d.to_iso(), "2023-02-28");
    }

    #[test]
    fn year_change_clamps_leap_day() {
        let mut d = DateSelect::new(2024, 2, 29).expect("date");
        d.set_year(2025).expect("year");
        assert_eq!(d.day(), 28);
    }

    #[test]
    fn day_inside_new_month_is_kept() {
        let mut d = DateSelect::new(2025, 3, 15).expect("date");
        d.set_month(4).expect("month");
        assert_eq!(d.to_iso(), "2025-04-15");
    }

    #[test]
    fn set_day_rejects_out_of_range() {
        let mut d = DateSelect::new(2025, 4, 1).expect("date");
        assert!(d.set_day(31).is_err());
        assert!(d.set_day(30).is_ok());
    }

    #[test]
    fn century_rule() {
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
    }

    #[test]
    fn range_from_mixed_params() {
        let r = DateRangeSelect::from_params(&json!({
            "start": "2025-01-05",
            "end": { "year": 2025, "month": 2, "day": 31 }
        }))
        .expect("range");
        assert_eq!(r.end.to_iso(), "2025-02-28");

        assert!(DateRangeSelect::from_params(&json!({
            "start": "2025-03-05",
            "end": "2025-03-01"
        }))
        .is_err());
    }

    #[test]
    fn oversized_parts_are_rejected_not_wrapped() {
        // 2^32 + 2000 would wrap to 2000 with a plain cast
        let err = DateSelect::from_json(&json!({ "year": 4_294_969_296i64, "month": 1, "day": 1 }));
        assert_eq!(err, Err(DateError::YearOutOfRange));
        let err = DateSelect::from_json(&json!({ "year": 2025, "month": 4_294_967_297i64, "day": 1 }));
        assert_eq!(err, Err(DateError::MonthOutOfRange));
        let err = DateSelect::from_json(&json!({ "year": 2025, "month": -1, "day": 1 }));
        assert_eq!(err, Err(DateError::MonthOutOfRange));
        let d = DateSelect::from_json(&json!({ "year": 2025, "month": 2, "day": 4_294_967_300i64 }))
            .expect("huge day clamps");
        assert_eq!(d.to_iso(), "2025-02-28");
    }

    #[test]
    fn adjust_checks_each_part() {
        let mut d = DateSelect::new(2024, 3, 31).expect("date");
        d.adjust(Some(2023), Some(2), None).expect("adjust");
        assert_eq!(d.to_iso(), "2023-02-28");
        assert_eq!(d.adjust(Some(4_294_969_296), None, None), Err(DateError::YearOutOfRange));
        assert_eq!(
            d.adjust(None, None, Some(4_294_967_297)),
            Err(DateError::DayOutOfRange { max: 28 })
        );
        assert_eq!(d.to_iso(), "2023-02-28");
    }

    #[test]
    fn errors_read_as_messages() {
        assert_eq!(DateError::Reversed.to_string(), "End date must be on or after the start date");
        assert_eq!(DateError::Malformed.to_string(), "expected YYYY-MM-DD or {year, month, day}");
        assert_eq!(DateError::DayOutOfRange { max: 30 }.to_string(), "day must be between 1 and 30");
    }
}

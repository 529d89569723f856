use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidDate {
    #[error("month {0} is out of range")]
    Month(u32),

    #[error("day {day} does not exist in {year}-{month:02}")]
    Day { year: i32, month: u32, day: u32 },

    #[error("a day requires a month")]
    DayWithoutMonth,

    #[error("year {0} is out of range")]
    Year(i32),
}

/// A calendar date known to year, month or day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialDate {
    Year(i32),
    YearMonth(i32, u32),
    YearMonthDay(i32, u32, u32),
}

impl PartialDate {
    pub fn new(year: i32, month: Option<u32>, day: Option<u32>) -> Result<Self, InvalidDate> {
        let date = match (month, day) {
            (None, None) => PartialDate::Year(year),
            (Some(month), None) => PartialDate::YearMonth(year, month),
            (Some(month), Some(day)) => PartialDate::YearMonthDay(year, month, day),
            (None, Some(_)) => return Err(InvalidDate::DayWithoutMonth),
        };

        if let Some(month) = date.month() {
            if !(1..=12).contains(&month) {
                return Err(InvalidDate::Month(month));
            }
        }

        if NaiveDate::from_ymd_opt(year, 1, 1).is_none() {
            return Err(InvalidDate::Year(year));
        }

        if let PartialDate::YearMonthDay(year, month, day) = date {
            if NaiveDate::from_ymd_opt(year, month, day).is_none() {
                return Err(InvalidDate::Day { year, month, day });
            }
        }

        Ok(date)
    }

    pub fn year(&self) -> i32 {
        match *self {
            PartialDate::Year(year)
            | PartialDate::YearMonth(year, _)
            | PartialDate::YearMonthDay(year, _, _) => year,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match *self {
            PartialDate::Year(_) => None,
            PartialDate::YearMonth(_, month) | PartialDate::YearMonthDay(_, month, _) => {
                Some(month)
            }
        }
    }

    pub fn day(&self) -> Option<u32> {
        match *self {
            PartialDate::YearMonthDay(_, _, day) => Some(day),
            _ => None,
        }
    }

    /// First calendar day this date could refer to.
    pub fn lowest_possible(&self) -> NaiveDate {
        let month = self.month().unwrap_or(1);
        let day = self.day().unwrap_or(1);

        NaiveDate::from_ymd_opt(self.year(), month, day).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day this date could refer to.
    pub fn highest_possible(&self) -> NaiveDate {
        match *self {
            PartialDate::YearMonthDay(..) => self.lowest_possible(),
            PartialDate::YearMonth(year, month) => last_day_of_month(year, month),
            PartialDate::Year(year) => last_day_of_month(year, 12),
        }
    }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    first_of_next
        .and_then(|date| date.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PartialDate::Year(year) => write!(f, "{:04}", year),
            PartialDate::YearMonth(year, month) => write!(f, "{:04}-{:02}", year, month),
            PartialDate::YearMonthDay(year, month, day) => {
                write!(f, "{:04}-{:02}-{:02}", year, month, day)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_follows_components() {
        assert_eq!(PartialDate::new(2016, None, None), Ok(PartialDate::Year(2016)));
        assert_eq!(
            PartialDate::new(2016, Some(2), None),
            Ok(PartialDate::YearMonth(2016, 2))
        );
        assert_eq!(
            PartialDate::new(2016, Some(2), Some(29)),
            Ok(PartialDate::YearMonthDay(2016, 2, 29))
        );
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert_eq!(PartialDate::new(2016, Some(13), None), Err(InvalidDate::Month(13)));
        assert!(matches!(
            PartialDate::new(2015, Some(2), Some(29)),
            Err(InvalidDate::Day { .. })
        ));
        assert_eq!(
            PartialDate::new(2016, None, Some(1)),
            Err(InvalidDate::DayWithoutMonth)
        );
    }

    #[test]
    fn test_bounds() {
        let month = PartialDate::YearMonth(2016, 2);
        assert_eq!(month.lowest_possible(), NaiveDate::from_ymd_opt(2016, 2, 1).unwrap());
        assert_eq!(month.highest_possible(), NaiveDate::from_ymd_opt(2016, 2, 29).unwrap());

        let year = PartialDate::Year(2016);
        assert_eq!(year.highest_possible(), NaiveDate::from_ymd_opt(2016, 12, 31).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(PartialDate::Year(2016).to_string(), "2016");
        assert_eq!(PartialDate::YearMonthDay(2016, 3, 7).to_string(), "2016-03-07");
    }
}

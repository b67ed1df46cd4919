use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::mem::replace;

use crate::error::{HdsError, Result};

/// A half-open range of days, `[start, end)`.
#[derive(Clone, Eq, PartialEq, Copy, Debug, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted ones.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(HdsError::InvalidTimeRange { start, end });
        }
        Ok(TimeRange { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| HdsError::InvalidDate(s.to_string()))
        };
        TimeRange::new(parse(start)?, parse(end)?)
    }

    /// Number of days in the range.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn covers(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest range containing both.
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Position of `date` on this range's daily axis.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if self.contains(date) {
            Some((date - self.start).num_days() as usize)
        } else {
            None
        }
    }

    pub fn days(&self) -> Days {
        Days(self.start, self.end)
    }
}

/// Iterator over the days of a [`TimeRange`].
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct Days(NaiveDate, NaiveDate);

impl Iterator for Days {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 < self.1 {
            let next = self.0 + TimeDelta::days(1);
            Some(replace(&mut self.0, next))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TimeRange;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_days_iteration_excludes_end() {
        let range = TimeRange::new(d(2022, 1, 1), d(2022, 1, 5)).unwrap();
        let dates: Vec<NaiveDate> = range.days().collect();
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[0], d(2022, 1, 1));
        assert_eq!(dates[3], d(2022, 1, 4));
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(TimeRange::new(d(2022, 3, 15), d(2022, 3, 15)).is_err());
        assert!(TimeRange::new(d(2022, 3, 15), d(2022, 3, 14)).is_err());
    }

    #[test]
    fn test_union_and_cover() {
        let a = TimeRange::new(d(2000, 1, 1), d(2000, 2, 1)).unwrap();
        let b = TimeRange::new(d(2000, 1, 15), d(2000, 3, 1)).unwrap();
        let u = a.union(&b);
        assert_eq!(u.start, d(2000, 1, 1));
        assert_eq!(u.end, d(2000, 3, 1));
        assert!(u.covers(&a) && u.covers(&b));
        assert!(!a.covers(&b));
    }

    #[test]
    fn test_index_of() {
        let range = TimeRange::parse("2000-02-27", "2000-03-02").unwrap();
        assert_eq!(range.index_of(d(2000, 2, 29)), Some(2));
        assert_eq!(range.index_of(d(2000, 3, 2)), None);
        assert_eq!(range.len(), 4);
    }
}

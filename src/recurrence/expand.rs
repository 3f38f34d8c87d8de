//! Enumeration of the occurrences of a recurrence rule

use std::convert::TryFrom;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::{Frequency, RecurrenceRule, Termination, WeekdayNum};
use crate::datetime::{duration_from_seconds, DateTimeValue};

/// Upper bound on the number of periods walked by a single expansion
const MAX_PERIODS: i64 = 100_000;

impl RecurrenceRule {
    /// Wall-clock start times of the occurrences of this rule, for an incidence starting at `start`,
    /// up to and including `window_end`.
    ///
    /// `start` itself is always the first occurrence. The times are sorted.
    pub fn occurrences(&self, start: NaiveDateTime, window_end: NaiveDateTime) -> Vec<NaiveDateTime> {
        let rule = self.resolved_against(start.date());
        let until = match &rule.termination {
            // A whole-day UNTIL includes the whole day
            Termination::Until(DateTimeValue::Date(d)) => Some(d.and_time(NaiveTime::from_hms(23, 59, 59))),
            Termination::Until(other) => Some(other.naive_local()),
            _ => None,
        };
        let max_count = match rule.termination {
            Termination::Count(n) => Some(n as usize),
            _ => None,
        };
        let limit = match until {
            Some(u) if u < window_end => u,
            _ => window_end,
        };

        let mut occurrences = Vec::new();
        if start > limit || max_count == Some(0) {
            return occurrences;
        }
        occurrences.push(start);

        let step = rule.interval.max(1) as i64;
        for k in 0..MAX_PERIODS {
            let (period_start, dates) = match rule.dates_in_period(start.date(), k * step) {
                Some(period) => period,
                // Past the last representable date
                None => break,
            };
            if period_start.and_time(NaiveTime::from_hms(0, 0, 0)) > limit {
                break;
            }
            for date in dates {
                let occurrence = date.and_time(start.time());
                if occurrence <= start {
                    continue;
                }
                if occurrence > limit {
                    return occurrences;
                }
                occurrences.push(occurrence);
                if Some(occurrences.len()) == max_count {
                    return occurrences;
                }
            }
        }
        occurrences
    }

    /// The first day of the `offset`-th period after the one containing `start`, and the sorted dates this rule selects in it.
    ///
    /// Returns `None` when that period lies outside the representable dates.
    fn dates_in_period(&self, start: NaiveDate, offset: i64) -> Option<(NaiveDate, Vec<NaiveDate>)> {
        let (first, mut dates) = match self.frequency {
            Frequency::Daily => {
                let day = start.checked_add_signed(days(offset)?)?;
                return Some((day, vec![day]));
            },
            Frequency::Weekly => {
                let monday = start
                    .checked_sub_signed(Duration::days(start.weekday().num_days_from_monday() as i64))?
                    .checked_add_signed(days(offset.checked_mul(7)?)?)?;
                let dates = self.by_day.iter()
                    .filter_map(|d| monday.checked_add_signed(Duration::days(d.weekday.num_days_from_monday() as i64)))
                    .collect::<Vec<_>>();
                (monday, dates)
            },
            Frequency::MonthlyByDay | Frequency::MonthlyByPosition => {
                let months = (start.year() as i64 * 12 + start.month0() as i64).checked_add(offset)?;
                let year = i32::try_from(months.div_euclid(12)).ok()?;
                let month = months.rem_euclid(12) as u32 + 1;
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let dates: Vec<NaiveDate> = if self.frequency == Frequency::MonthlyByDay {
                    self.by_month_day.iter().filter_map(|d| day_of_month(year, month, *d as i32)).collect()
                } else {
                    self.by_day.iter().flat_map(|d| weekdays_in_month(year, month, d)).collect()
                };
                (first, dates)
            },
            Frequency::YearlyByMonth | Frequency::YearlyByDay => {
                let year = i32::try_from(offset).ok().and_then(|offset| start.year().checked_add(offset))?;
                let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
                let dates: Vec<NaiveDate> = if self.frequency == Frequency::YearlyByMonth {
                    self.by_month.iter().filter_map(|m| NaiveDate::from_ymd_opt(year, *m, start.day())).collect()
                } else {
                    self.by_year_day.iter().filter_map(|d| day_of_year(year, *d as i32)).collect()
                };
                (first, dates)
            },
        };
        dates.sort();
        dates.dedup();
        Some((first, dates))
    }
}

/// `Duration::days`, without the panic on out-of-range values
fn days(n: i64) -> Option<Duration> {
    n.checked_mul(86_400).and_then(duration_from_seconds)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 28,
    }
}

fn day_of_month(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    let len = days_in_month(year, month) as i32;
    let day = if day < 0 { len + 1 + day } else { day };
    if day < 1 || day > len {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day as u32)
}

fn day_of_year(year: i32, day: i32) -> Option<NaiveDate> {
    let len = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() { 366 } else { 365 };
    let day = if day < 0 { len + 1 + day } else { day };
    if day < 1 || day > len {
        return None;
    }
    NaiveDate::from_yo_opt(year, day as u32)
}

/// Every date of the month matching `day` (all of them when it has no ordinal)
fn weekdays_in_month(year: i32, month: u32, day: &WeekdayNum) -> Vec<NaiveDate> {
    let all: Vec<NaiveDate> = (1..=days_in_month(year, month))
        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .filter(|d| d.weekday() == day.weekday)
        .collect();
    match day.ordinal {
        None => all,
        Some(n) if n > 0 => all.get(n as usize - 1).cloned().into_iter().collect(),
        Some(n) => {
            let from_end = (-n) as usize;
            if from_end <= all.len() {
                vec![all[all.len() - from_end]]
            } else {
                Vec::new()
            }
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::legacy;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(y, m, d).and_hms(h, 0, 0)
    }

    #[test]
    fn weekly_on_two_days() {
        // 2024-03-04 is a Monday
        let rule = legacy::parse("W1 MO TU #0").unwrap();
        let occ = rule.occurrences(at(2024, 3, 4, 9), at(2024, 3, 13, 0));
        assert_eq!(occ, vec![at(2024, 3, 4, 9), at(2024, 3, 5, 9), at(2024, 3, 11, 9), at(2024, 3, 12, 9)]);
    }

    #[test]
    fn count_includes_the_start() {
        let rule = legacy::parse("D2 #3").unwrap();
        let occ = rule.occurrences(at(2024, 1, 1, 8), at(2025, 1, 1, 0));
        assert_eq!(occ, vec![at(2024, 1, 1, 8), at(2024, 1, 3, 8), at(2024, 1, 5, 8)]);
    }

    #[test]
    fn until_is_inclusive() {
        let rule = legacy::parse("D1 20240103").unwrap();
        let occ = rule.occurrences(at(2024, 1, 1, 8), at(2025, 1, 1, 0));
        assert_eq!(occ.len(), 3);
    }

    #[test]
    fn monthly_by_position_and_by_day() {
        // Last Friday of each month
        let rule = legacy::parse("MP1 1- FR #3").unwrap();
        let occ = rule.occurrences(at(2024, 1, 26, 10), at(2025, 1, 1, 0));
        assert_eq!(occ, vec![at(2024, 1, 26, 10), at(2024, 2, 23, 10), at(2024, 3, 29, 10)]);

        // The 31st is skipped in shorter months
        let rule = legacy::parse("MD1 31 #3").unwrap();
        let occ = rule.occurrences(at(2024, 1, 31, 10), at(2025, 1, 1, 0));
        assert_eq!(occ, vec![at(2024, 1, 31, 10), at(2024, 3, 31, 10), at(2024, 5, 31, 10)]);
    }

    #[test]
    fn yearly() {
        let rule = legacy::parse("YM1 #0").unwrap();
        let occ = rule.occurrences(at(2024, 2, 29, 10), at(2029, 1, 1, 0));
        assert_eq!(occ, vec![at(2024, 2, 29, 10), at(2028, 2, 29, 10)]);

        let rule = legacy::parse("YD1 1- #2").unwrap();
        let occ = rule.occurrences(at(2023, 12, 31, 0), at(2030, 1, 1, 0));
        assert_eq!(occ, vec![at(2023, 12, 31, 0), at(2024, 12, 31, 0)]);
    }

    #[test]
    fn window_bounds_infinite_rules() {
        let rule = legacy::parse("D1 #0").unwrap();
        let occ = rule.occurrences(at(2024, 1, 1, 8), at(2024, 1, 10, 8));
        assert_eq!(occ.len(), 10);
    }

    #[test]
    fn huge_intervals_stop_at_the_calendar_end() {
        let far = NaiveDate::MAX.and_hms(0, 0, 0);
        for text in &[
            "FREQ=DAILY;INTERVAL=4000000000",
            "FREQ=WEEKLY;INTERVAL=4000000000;BYDAY=MO",
            "FREQ=MONTHLY;INTERVAL=4000000000;BYMONTHDAY=1",
            "FREQ=YEARLY;INTERVAL=4000000000",
        ] {
            let rule = crate::recurrence::rfc::parse(text).unwrap();
            assert_eq!(rule.occurrences(at(2024, 1, 1, 8), far), vec![at(2024, 1, 1, 8)], "{}", text);
        }
    }
}

//! Recurrence rules (iCal `RRULE` property)
//!
//! Two textual grammars are supported:
//! * the RFC 5545 grammar (`FREQ=WEEKLY;BYDAY=MO,TU`), which is what this crate emits, see [`rfc`]
//! * the legacy token grammar (`W1 MO TU #0`), still found in older payloads, see [`legacy`]

pub mod legacy;
pub mod rfc;
mod expand;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::datetime::DateTimeValue;

/// The frequency class of a rule. Monthly and yearly rules come in two flavours, depending on what they repeat on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    /// Repeats on the n-th weekday(s) of the month, e.g. "every second Tuesday"
    MonthlyByPosition,
    /// Repeats on given days of the month, e.g. "every 15th"
    MonthlyByDay,
    /// Repeats in given months, on the day of month of the start
    YearlyByMonth,
    /// Repeats on given days of the year
    YearlyByDay,
}

/// A weekday, optionally qualified by its position in the month (`1MO`, `-1FR`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekdayNum {
    /// 1 for the first, -1 for the last... `None` means every such weekday
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    pub fn every(weekday: Weekday) -> Self {
        Self { ordinal: None, weekday }
    }

    pub fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self { ordinal: Some(ordinal), weekday }
    }
}

/// How a rule ends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Forever,
    /// Total number of occurrences, including the first one
    Count(u32),
    /// Last allowed occurrence (inclusive)
    Until(DateTimeValue),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Repeat every `interval` periods. Always at least 1.
    pub interval: u32,
    pub by_day: Vec<WeekdayNum>,
    /// Days of the month, negative values count from the end of the month
    pub by_month_day: Vec<i8>,
    /// Months, 1 to 12
    pub by_month: Vec<u32>,
    /// Days of the year, negative values count from the end of the year
    pub by_year_day: Vec<i16>,
    pub termination: Termination,
}

impl RecurrenceRule {
    /// Create a rule that repeats every period, forever
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            by_year_day: Vec::new(),
            termination: Termination::Forever,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn on_weekdays(mut self, days: &[Weekday]) -> Self {
        self.by_day = days.iter().map(|d| WeekdayNum::every(*d)).collect();
        self
    }

    pub fn terminating(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn is_infinite(&self) -> bool {
        self.termination == Termination::Forever
    }

    /// Fill the by-lists this frequency needs but that are empty, from the start date of the incidence.
    ///
    /// A weekly rule with no day repeats on the weekday of the start, a monthly-by-day rule on its day of month, and so on.
    pub fn fill_defaults_from(&mut self, start: NaiveDate) {
        match self.frequency {
            Frequency::Daily => {},
            Frequency::Weekly => {
                if self.by_day.is_empty() {
                    self.by_day.push(WeekdayNum::every(start.weekday()));
                }
            },
            Frequency::MonthlyByPosition => {
                if self.by_day.is_empty() {
                    self.by_day.push(WeekdayNum::nth(position_in_month(start), start.weekday()));
                }
            },
            Frequency::MonthlyByDay => {
                if self.by_month_day.is_empty() {
                    self.by_month_day.push(start.day() as i8);
                }
            },
            Frequency::YearlyByMonth => {
                if self.by_month.is_empty() {
                    self.by_month.push(start.month());
                }
            },
            Frequency::YearlyByDay => {
                if self.by_year_day.is_empty() {
                    self.by_year_day.push(start.ordinal() as i16);
                }
            },
        }
    }

    /// Returns a copy of this rule where the defaults implied by `start` are explicit
    pub fn resolved_against(&self, start: NaiveDate) -> Self {
        let mut resolved = self.clone();
        resolved.fill_defaults_from(start);
        resolved
    }

    /// Parses an RRULE value written in either grammar, filling missing by-lists from `start`
    pub fn parse(value: &str, start: &DateTimeValue) -> Result<Self, String> {
        let value = value.trim();
        let mut rule = if value.contains('=') {
            rfc::parse(value)?
        } else {
            legacy::parse(value)?
        };
        rule.fill_defaults_from(start.date());
        Ok(rule)
    }

    /// The RFC 5545 RRULE value of this rule
    pub fn to_ical_value(&self) -> String {
        rfc::format(self)
    }

    /// The legacy token grammar form of this rule (e.g. `W1 MO TU #0`)
    pub fn to_legacy_string(&self) -> String {
        legacy::format(self)
    }
}

/// 1 for the first such weekday of the month, 2 for the second...
pub(crate) fn position_in_month(date: NaiveDate) -> i8 {
    ((date.day() - 1) / 7 + 1) as i8
}

pub(crate) fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub(crate) fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

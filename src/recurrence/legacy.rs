//! The legacy (vCalendar 1.0) recurrence grammar
//!
//! A rule is `<code><interval> [list...] [terminator]`:
//! * `code` is one of `D`, `W`, `MP`, `MD`, `YM`, `YD`
//! * the list holds weekdays (`W`), `<n>+`/`<n>-` positions followed by weekdays (`MP`),
//!   days of the month (`MD`, `LD` or `<n>-` counting from the end), months (`YM`) or days of the year (`YD`)
//! * the terminator is `#<count>`, `#0` for a rule that never ends, or an end date-time.
//!   Without a terminator, a rule has 2 occurrences.

use super::{parse_weekday_code, weekday_code, Frequency, RecurrenceRule, Termination, WeekdayNum};
use crate::datetime::DateTimeValue;

const DEFAULT_COUNT: u32 = 2;

/// Parses a legacy rule. By-lists that are absent are left empty.
pub fn parse(value: &str) -> Result<RecurrenceRule, String> {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.is_empty() {
        return Err("empty rule".to_string());
    }

    let head = tokens.remove(0);
    let upper_head = head.to_ascii_uppercase();
    let (frequency, interval) = if let Some(rest) = strip_code(&upper_head, "MP") {
        (Frequency::MonthlyByPosition, rest)
    } else if let Some(rest) = strip_code(&upper_head, "MD") {
        (Frequency::MonthlyByDay, rest)
    } else if let Some(rest) = strip_code(&upper_head, "YM") {
        (Frequency::YearlyByMonth, rest)
    } else if let Some(rest) = strip_code(&upper_head, "YD") {
        (Frequency::YearlyByDay, rest)
    } else if let Some(rest) = strip_code(&upper_head, "D") {
        (Frequency::Daily, rest)
    } else if let Some(rest) = strip_code(&upper_head, "W") {
        (Frequency::Weekly, rest)
    } else {
        return Err(format!("unknown frequency code in {:?}", head));
    };

    let interval = if interval.is_empty() {
        1
    } else {
        interval.parse::<u32>().map_err(|_| format!("invalid interval {:?}", interval))?
    };
    if interval == 0 {
        return Err("interval must be at least 1".to_string());
    }

    let termination = match tokens.last() {
        Some(last) if last.starts_with('#') => {
            let count = last[1..].parse::<u32>().map_err(|_| format!("invalid count {:?}", last))?;
            tokens.pop();
            if count == 0 { Termination::Forever } else { Termination::Count(count) }
        },
        Some(last) if looks_like_date(last) => {
            let until = DateTimeValue::parse(last, false, None)?;
            tokens.pop();
            Termination::Until(until)
        },
        _ => Termination::Count(DEFAULT_COUNT),
    };

    let mut rule = RecurrenceRule::new(frequency).every(interval).terminating(termination);
    match frequency {
        Frequency::Daily => {
            if tokens.is_empty() == false {
                log::debug!("Ignoring list {:?} of a daily rule", tokens);
            }
        },
        Frequency::Weekly => {
            for token in tokens {
                let day = parse_weekday_code(token).ok_or_else(|| format!("invalid weekday {:?}", token))?;
                rule.by_day.push(WeekdayNum::every(day));
            }
        },
        Frequency::MonthlyByPosition => {
            let mut ordinal = None;
            for token in tokens {
                if let Some(day) = parse_weekday_code(token) {
                    rule.by_day.push(WeekdayNum { ordinal, weekday: day });
                } else {
                    // A month holds five occurrences of a weekday at most
                    let position = parse_signed(token)?;
                    if position == 0 || position.abs() > 5 {
                        return Err(format!("invalid position {:?}", token));
                    }
                    ordinal = Some(position as i8);
                }
            }
        },
        Frequency::MonthlyByDay => {
            for token in tokens {
                let day = if token.eq_ignore_ascii_case("LD") { -1 } else { parse_signed(token)? };
                if day == 0 || day.abs() > 31 {
                    return Err(format!("invalid day of month {:?}", token));
                }
                rule.by_month_day.push(day as i8);
            }
        },
        Frequency::YearlyByMonth => {
            for token in tokens {
                let month = token.parse::<u32>().map_err(|_| format!("invalid month {:?}", token))?;
                if month == 0 || month > 12 {
                    return Err(format!("invalid month {:?}", token));
                }
                rule.by_month.push(month);
            }
        },
        Frequency::YearlyByDay => {
            for token in tokens {
                let day = parse_signed(token)?;
                if day == 0 || day.abs() > 366 {
                    return Err(format!("invalid day of year {:?}", token));
                }
                rule.by_year_day.push(day as i16);
            }
        },
    }

    Ok(rule)
}

/// Writes a rule in the legacy grammar
pub fn format(rule: &RecurrenceRule) -> String {
    let code = match rule.frequency {
        Frequency::Daily => "D",
        Frequency::Weekly => "W",
        Frequency::MonthlyByPosition => "MP",
        Frequency::MonthlyByDay => "MD",
        Frequency::YearlyByMonth => "YM",
        Frequency::YearlyByDay => "YD",
    };
    let mut tokens = vec![format!("{}{}", code, rule.interval)];

    match rule.frequency {
        Frequency::Daily => {},
        Frequency::Weekly => {
            tokens.extend(rule.by_day.iter().map(|d| weekday_code(d.weekday).to_string()));
        },
        Frequency::MonthlyByPosition => {
            let mut current = None;
            for day in &rule.by_day {
                if day.ordinal != current {
                    if let Some(n) = day.ordinal {
                        tokens.push(format_signed(n as i32));
                    }
                    current = day.ordinal;
                }
                tokens.push(weekday_code(day.weekday).to_string());
            }
        },
        Frequency::MonthlyByDay => {
            tokens.extend(rule.by_month_day.iter().map(|d| format_signed(*d as i32)));
        },
        Frequency::YearlyByMonth => {
            tokens.extend(rule.by_month.iter().map(|m| m.to_string()));
        },
        Frequency::YearlyByDay => {
            tokens.extend(rule.by_year_day.iter().map(|d| format_signed(*d as i32)));
        },
    }

    tokens.push(match &rule.termination {
        Termination::Forever => "#0".to_string(),
        Termination::Count(n) => format!("#{}", n),
        Termination::Until(until) => until.to_ical_value(),
    });

    tokens.join(" ")
}

fn strip_code<'a>(head: &'a str, code: &str) -> Option<&'a str> {
    let rest = head.strip_prefix(code)?;
    if rest.chars().all(|c| c.is_ascii_digit()) {
        Some(rest)
    } else {
        None
    }
}

fn looks_like_date(token: &str) -> bool {
    token.get(..8).map_or(false, |prefix| prefix.chars().all(|c| c.is_ascii_digit()))
}

/// Parses `3`, `3+` or `3-` (the latter counting from the end)
fn parse_signed(token: &str) -> Result<i32, String> {
    let (digits, negative) = if let Some(d) = token.strip_suffix('-') {
        (d, true)
    } else if let Some(d) = token.strip_suffix('+') {
        (d, false)
    } else {
        (token, false)
    };
    if digits.is_empty() || digits.chars().all(|c| c.is_ascii_digit()) == false {
        return Err(format!("invalid position {:?}", token));
    }
    let n = digits.parse::<i32>().map_err(|_| format!("invalid position {:?}", token))?;
    Ok(if negative { -n } else { n })
}

fn format_signed(n: i32) -> String {
    if n < 0 {
        format!("{}-", -n)
    } else {
        format!("{}+", n)
    }
}

//! The RFC 5545 recurrence grammar (`FREQ=MONTHLY;BYDAY=2TU;COUNT=10`)

use std::collections::HashMap;

use super::{parse_weekday_code, weekday_code, Frequency, RecurrenceRule, Termination, WeekdayNum};
use crate::datetime::DateTimeValue;

/// Parses an RFC 5545 rule. By-lists that are absent are left empty.
///
/// Rule parts this crate does not model (`WKST`, `BYHOUR`...) are ignored.
pub fn parse(value: &str) -> Result<RecurrenceRule, String> {
    let mut parts = HashMap::new();
    for part in value.split(';').filter(|p| p.is_empty() == false) {
        let mut kv = part.splitn(2, '=');
        let key = kv.next().unwrap_or_default().trim().to_ascii_uppercase();
        let val = kv.next().ok_or_else(|| format!("rule part {:?} has no value", part))?.trim();
        parts.insert(key, val);
    }

    let freq = parts.get("FREQ").ok_or("missing FREQ")?.to_ascii_uppercase();

    let mut by_day = Vec::new();
    if let Some(list) = parts.get("BYDAY") {
        for item in split_list(list) {
            by_day.push(parse_weekday_num(item)?);
        }
    }
    let by_month_day = parse_number_list(parts.get("BYMONTHDAY"), "BYMONTHDAY", 31)?
        .into_iter().map(|n| n as i8).collect::<Vec<_>>();
    let by_month = parse_number_list(parts.get("BYMONTH"), "BYMONTH", 12)?;
    if by_month.iter().any(|m| *m < 0) {
        return Err("BYMONTH entries must be positive".to_string());
    }
    let by_month = by_month.into_iter().map(|m| m as u32).collect::<Vec<_>>();
    let by_year_day = parse_number_list(parts.get("BYYEARDAY"), "BYYEARDAY", 366)?
        .into_iter().map(|n| n as i16).collect::<Vec<_>>();
    let set_pos = parse_number_list(parts.get("BYSETPOS"), "BYSETPOS", 53)?;

    let frequency = match freq.as_str() {
        "DAILY" => Frequency::Daily,
        "WEEKLY" => Frequency::Weekly,
        "MONTHLY" if by_day.is_empty() => Frequency::MonthlyByDay,
        "MONTHLY" => Frequency::MonthlyByPosition,
        "YEARLY" if by_year_day.is_empty() => Frequency::YearlyByMonth,
        "YEARLY" => Frequency::YearlyByDay,
        other => return Err(format!("unsupported frequency {:?}", other)),
    };

    let interval = match parts.get("INTERVAL") {
        None => 1,
        Some(i) => i.parse::<u32>().map_err(|_| format!("invalid INTERVAL {:?}", i))?,
    };
    if interval == 0 {
        return Err("INTERVAL must be at least 1".to_string());
    }

    let termination = if let Some(count) = parts.get("COUNT") {
        let count = count.parse::<u32>().map_err(|_| format!("invalid COUNT {:?}", count))?;
        if count == 0 { Termination::Forever } else { Termination::Count(count) }
    } else if let Some(until) = parts.get("UNTIL") {
        Termination::Until(DateTimeValue::parse(until, false, None)?)
    } else {
        Termination::Forever
    };

    let mut rule = RecurrenceRule::new(frequency).every(interval).terminating(termination);
    match frequency {
        Frequency::Weekly => {
            rule.by_day = by_day.into_iter().map(|d| WeekdayNum::every(d.weekday)).collect();
        },
        Frequency::MonthlyByPosition => {
            // `BYDAY=TU;BYSETPOS=2` is another way of writing `BYDAY=2TU`
            if set_pos.len() == 1 && by_day.iter().all(|d| d.ordinal.is_none()) {
                let ordinal = set_pos[0] as i8;
                rule.by_day = by_day.into_iter().map(|d| WeekdayNum::nth(ordinal, d.weekday)).collect();
            } else {
                rule.by_day = by_day;
            }
        },
        Frequency::MonthlyByDay => rule.by_month_day = by_month_day,
        Frequency::YearlyByMonth => rule.by_month = by_month,
        Frequency::YearlyByDay => rule.by_year_day = by_year_day,
        Frequency::Daily => {},
    }
    Ok(rule)
}

/// Writes a rule in the RFC 5545 grammar
pub fn format(rule: &RecurrenceRule) -> String {
    let mut parts = Vec::new();
    let freq = match rule.frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::MonthlyByPosition | Frequency::MonthlyByDay => "MONTHLY",
        Frequency::YearlyByMonth | Frequency::YearlyByDay => "YEARLY",
    };
    parts.push(format!("FREQ={}", freq));
    if rule.interval > 1 {
        parts.push(format!("INTERVAL={}", rule.interval));
    }

    match rule.frequency {
        Frequency::Daily => {},
        Frequency::Weekly | Frequency::MonthlyByPosition => {
            if rule.by_day.is_empty() == false {
                let days: Vec<String> = rule.by_day.iter().map(format_weekday_num).collect();
                parts.push(format!("BYDAY={}", days.join(",")));
            }
        },
        Frequency::MonthlyByDay => push_list(&mut parts, "BYMONTHDAY", &rule.by_month_day),
        Frequency::YearlyByMonth => push_list(&mut parts, "BYMONTH", &rule.by_month),
        Frequency::YearlyByDay => push_list(&mut parts, "BYYEARDAY", &rule.by_year_day),
    }

    match &rule.termination {
        Termination::Forever => {},
        Termination::Count(n) => parts.push(format!("COUNT={}", n)),
        Termination::Until(until) => parts.push(format!("UNTIL={}", until.to_ical_value())),
    }

    parts.join(";")
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(|s| s.trim()).filter(|s| s.is_empty() == false)
}

fn parse_number_list(list: Option<&&str>, name: &str, max_abs: i64) -> Result<Vec<i64>, String> {
    let mut out = Vec::new();
    if let Some(list) = list {
        for item in split_list(list) {
            let n = item.parse::<i64>().map_err(|_| format!("invalid {} entry {:?}", name, item))?;
            if n == 0 || n.checked_abs().map_or(true, |abs| abs > max_abs) {
                return Err(format!("{} entry {} out of range", name, n));
            }
            out.push(n);
        }
    }
    Ok(out)
}

fn parse_weekday_num(item: &str) -> Result<WeekdayNum, String> {
    if item.len() < 2 {
        return Err(format!("invalid BYDAY entry {:?}", item));
    }
    let split = item.len() - 2;
    let code = item.get(split..).ok_or_else(|| format!("invalid BYDAY entry {:?}", item))?;
    let weekday = parse_weekday_code(code).ok_or_else(|| format!("invalid weekday in {:?}", item))?;
    let ordinal = match &item[..split] {
        "" => None,
        n => {
            let n = n.parse::<i8>().map_err(|_| format!("invalid position in {:?}", item))?;
            if n == 0 || n.checked_abs().map_or(true, |abs| abs > 53) {
                return Err(format!("position out of range in {:?}", item));
            }
            Some(n)
        },
    };
    Ok(WeekdayNum { ordinal, weekday })
}

fn format_weekday_num(day: &WeekdayNum) -> String {
    match day.ordinal {
        Some(n) => format!("{}{}", n, weekday_code(day.weekday)),
        None => weekday_code(day.weekday).to_string(),
    }
}

fn push_list<T: ToString>(parts: &mut Vec<String>, name: &str, list: &[T]) {
    if list.is_empty() == false {
        let items: Vec<String> = list.iter().map(|i| i.to_string()).collect();
        parts.push(format!("{}={}", name, items.join(",")));
    }
}

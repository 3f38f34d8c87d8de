//! Date and time values as they appear in iCalendar properties
//!
//! iCalendar distinguishes whole days, floating wall-clock times, UTC instants and wall-clock times
//! attached to a named zone. [`DateTimeValue`] keeps that distinction so that a decoded value can be
//! encoded back unchanged.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A DTSTART/DTEND/DUE-like value
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateTimeValue {
    /// A whole day (`VALUE=DATE`), used by all-day incidences
    Date(NaiveDate),
    /// A wall-clock time with no zone, interpreted in the viewer's zone
    Floating(NaiveDateTime),
    /// An absolute instant
    Utc(DateTime<Utc>),
    /// A wall-clock time in a named zone (`TZID=...`)
    Zoned { local: NaiveDateTime, tzid: String },
}

impl DateTimeValue {
    pub fn is_all_day(&self) -> bool {
        matches!(self, DateTimeValue::Date(_))
    }

    /// The wall-clock reading of this value. Whole days read as midnight, UTC instants as UTC wall-clock time.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            DateTimeValue::Date(d) => d.and_time(NaiveTime::from_hms(0, 0, 0)),
            DateTimeValue::Floating(dt) => *dt,
            DateTimeValue::Utc(dt) => dt.naive_utc(),
            DateTimeValue::Zoned { local, .. } => *local,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.naive_local().date()
    }

    /// Builds a value of the same kind (and zone) as `self`, reading `wall_clock`
    pub fn with_naive(&self, wall_clock: NaiveDateTime) -> Self {
        match self {
            DateTimeValue::Date(_) => DateTimeValue::Date(wall_clock.date()),
            DateTimeValue::Floating(_) => DateTimeValue::Floating(wall_clock),
            DateTimeValue::Utc(_) => DateTimeValue::Utc(Utc.from_utc_datetime(&wall_clock)),
            DateTimeValue::Zoned { tzid, .. } => DateTimeValue::Zoned { local: wall_clock, tzid: tzid.clone() },
        }
    }

    /// Shifts the wall-clock reading of this value. Returns `None` when the result is out of the representable range.
    pub fn shifted_by(&self, delta: Duration) -> Option<Self> {
        let shifted = self.naive_local().checked_add_signed(delta)?;
        Some(self.with_naive(shifted))
    }

    /// Resolves this value to an instant.
    ///
    /// Whole days and floating times are read in `viewer_zone`. An unknown TZID falls back to `viewer_zone`.
    pub fn to_utc(&self, viewer_zone: Tz) -> DateTime<Utc> {
        match self {
            DateTimeValue::Utc(dt) => *dt,
            DateTimeValue::Date(_) | DateTimeValue::Floating(_) => local_to_utc(viewer_zone, &self.naive_local()),
            DateTimeValue::Zoned { local, tzid } => {
                let zone = match tzid.parse::<Tz>() {
                    Ok(zone) => zone,
                    Err(_) => {
                        log::warn!("Unknown time zone {:?}, reading {} in the viewer's zone", tzid, local);
                        viewer_zone
                    },
                };
                local_to_utc(zone, local)
            },
        }
    }

    /// The TZID parameter to emit alongside this value, if any
    pub fn tzid(&self) -> Option<&str> {
        match self {
            DateTimeValue::Zoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }

    /// The textual property value (without parameters)
    pub fn to_ical_value(&self) -> String {
        match self {
            DateTimeValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            DateTimeValue::Floating(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
            DateTimeValue::Utc(dt) => format_utc(dt),
            DateTimeValue::Zoned { local, .. } => local.format(DATE_TIME_FORMAT).to_string(),
        }
    }

    /// Parses a property value, given the `VALUE=DATE` flag and the `TZID` parameter of the property
    pub fn parse(raw: &str, value_is_date: bool, tzid: Option<&str>) -> Result<Self, String> {
        let raw = raw.trim();
        if value_is_date || (raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit())) {
            return NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(DateTimeValue::Date)
                .map_err(|err| format!("not a DATE: {}", err));
        }

        if let Some(utc) = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
            return NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT)
                .map(|dt| DateTimeValue::Utc(Utc.from_utc_datetime(&dt)))
                .map_err(|err| format!("not a UTC DATE-TIME: {}", err));
        }

        let local = NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
            .map_err(|err| format!("not a DATE-TIME: {}", err))?;
        match tzid {
            Some(tzid) if tzid.is_empty() == false => Ok(DateTimeValue::Zoned { local, tzid: tzid.to_string() }),
            _ => Ok(DateTimeValue::Floating(local)),
        }
    }
}

fn local_to_utc(zone: Tz, local: &NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Wall-clock time skipped by a DST transition: read it one hour later
        LocalResult::None => match zone.from_local_datetime(&(*local + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => Utc.from_utc_datetime(local),
        },
    }
}

/// Formats an instant the way CREATED, LAST-MODIFIED, DTSTAMP and FREEBUSY expect it
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parses a UTC date-time. Values without the `Z` suffix are read as UTC as well, since many producers omit it.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')).unwrap_or(raw);
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Formats a duration as an RFC 5545 DURATION value (e.g. `-PT15M`, `P1DT2H`, `P2W`)
pub fn format_duration(duration: &Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let mut secs = total.abs();

    if secs == 0 {
        return "PT0S".to_string();
    }
    if secs % 604_800 == 0 {
        return format!("{}P{}W", sign, secs / 604_800);
    }

    let mut out = format!("{}P", sign);
    let days = secs / 86_400;
    secs %= 86_400;
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if secs > 0 {
        out.push('T');
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        if hours > 0 { out.push_str(&format!("{}H", hours)); }
        if minutes > 0 { out.push_str(&format!("{}M", minutes)); }
        if seconds > 0 { out.push_str(&format!("{}S", seconds)); }
    }
    out
}

/// Parses an RFC 5545 DURATION value
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (negative, rest) = match raw.chars().next()? {
        '-' => (true, &raw[1..]),
        '+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let mut chars = rest.chars();
    if chars.next()?.to_ascii_uppercase() != 'P' {
        return None;
    }

    let mut total: i64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_component = false;
    for c in chars {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let c = c.to_ascii_uppercase();
        if c == 'T' {
            if number.is_empty() == false || in_time {
                return None;
            }
            in_time = true;
            continue;
        }
        let value: i64 = number.parse().ok()?;
        number.clear();
        let unit = match (c, in_time) {
            ('W', false) => 604_800,
            ('D', false) => 86_400,
            ('H', true) => 3600,
            ('M', true) => 60,
            ('S', true) => 1,
            _ => return None,
        };
        total = value.checked_mul(unit).and_then(|secs| total.checked_add(secs))?;
        seen_component = true;
    }
    if number.is_empty() == false || seen_component == false {
        return None;
    }

    let duration = duration_from_seconds(total)?;
    Some(if negative { -duration } else { duration })
}

/// Largest number of seconds a [`Duration`] can hold
const MAX_DURATION_SECONDS: i64 = i64::MAX / 1000;

/// `Duration::seconds`, without the panic on out-of-range values
pub(crate) fn duration_from_seconds(secs: i64) -> Option<Duration> {
    if secs.checked_abs()? > MAX_DURATION_SECONDS {
        return None;
    }
    Some(Duration::seconds(secs))
}

/// Serializes a [`Duration`] as a number of seconds
pub(crate) mod duration_seconds {
    use chrono::Duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        super::duration_from_seconds(secs).ok_or_else(|| D::Error::custom(format!("duration of {} seconds is out of range", secs)))
    }
}

/// Serializes an optional [`Duration`] as a number of seconds
pub(crate) mod optional_duration_seconds {
    use chrono::Duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&d.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            None => Ok(None),
            Some(secs) => super::duration_from_seconds(secs)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("duration of {} seconds is out of range", secs))),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_each_kind() {
        assert_eq!(
            DateTimeValue::parse("20240301", false, None).unwrap(),
            DateTimeValue::Date(NaiveDate::from_ymd(2024, 3, 1))
        );
        assert_eq!(
            DateTimeValue::parse("20240301T090000", false, None).unwrap(),
            DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 0, 0))
        );
        assert_eq!(
            DateTimeValue::parse("20240301T090000Z", false, None).unwrap(),
            DateTimeValue::Utc(Utc.ymd(2024, 3, 1).and_hms(9, 0, 0))
        );
        assert_eq!(
            DateTimeValue::parse("20240301T090000", false, Some("Europe/Berlin")).unwrap(),
            DateTimeValue::Zoned { local: NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 0, 0), tzid: "Europe/Berlin".to_string() }
        );
        assert!(DateTimeValue::parse("2024-03-01", false, None).is_err());
        assert!(DateTimeValue::parse("20240301T0900", false, None).is_err());
    }

    #[test]
    fn zoned_values_resolve_through_their_zone() {
        let berlin = DateTimeValue::Zoned { local: NaiveDate::from_ymd(2024, 1, 15).and_hms(9, 0, 0), tzid: "Europe/Berlin".to_string() };
        assert_eq!(berlin.to_utc(chrono_tz::UTC), Utc.ymd(2024, 1, 15).and_hms(8, 0, 0));

        let floating = DateTimeValue::Floating(NaiveDate::from_ymd(2024, 7, 15).and_hms(9, 0, 0));
        assert_eq!(floating.to_utc(chrono_tz::Europe::Paris), Utc.ymd(2024, 7, 15).and_hms(7, 0, 0));

        let unknown = DateTimeValue::Zoned { local: NaiveDate::from_ymd(2024, 1, 15).and_hms(9, 0, 0), tzid: "Mars/Olympus".to_string() };
        assert_eq!(unknown.to_utc(chrono_tz::UTC), Utc.ymd(2024, 1, 15).and_hms(9, 0, 0));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(&Duration::minutes(-15)), "-PT15M");
        assert_eq!(format_duration(&Duration::hours(26)), "P1DT2H");
        assert_eq!(format_duration(&Duration::weeks(2)), "P2W");
        assert_eq!(format_duration(&Duration::zero()), "PT0S");

        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("P1DT2H30M"), Some(Duration::minutes(26 * 60 + 30)));
        assert_eq!(parse_duration("P1W"), Some(Duration::weeks(1)));
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("P1H"), None);
        assert_eq!(parse_duration("1D"), None);

        // Too large for a Duration, or even for an i64
        assert_eq!(parse_duration("PT9999999999999999S"), None);
        assert_eq!(parse_duration("P99999999999999999W"), None);
        assert!(parse_duration("P99999999D").is_some());
    }

    #[test]
    fn shifting_out_of_range() {
        let start = DateTimeValue::Utc(Utc.ymd(2024, 3, 1).and_hms(10, 0, 0));
        assert_eq!(start.shifted_by(Duration::days(99_999_999)), None);
        assert_eq!(
            start.shifted_by(Duration::hours(2)),
            Some(DateTimeValue::Utc(Utc.ymd(2024, 3, 1).and_hms(12, 0, 0)))
        );
    }
}

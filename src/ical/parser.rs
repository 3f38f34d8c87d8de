//! A module to parse ICal files

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use ical::parser::ical::component::{IcalAlarm, IcalCalendar};
use ical::property::Property;

use crate::alarm::{Alarm, AlarmAction, AlarmTrigger};
use crate::attendee::{email_from_cal_address, Attendee, PartStat, Person, Role};
use crate::datetime::{parse_duration, parse_utc, DateTimeValue};
use crate::error::ParseError;
use crate::freebusy::{FreeBusy, Period};
use crate::incidence::{CompletionStatus, Event, Incidence, IncidenceBase, Journal, Secrecy, Todo, Transparency};
use crate::recurrence::RecurrenceRule;
use crate::utils::{new_uid, now, split_text_list, unescape_text};

/// An incidence, along with what its payload said about it
#[derive(Debug)]
pub struct Parsed {
    pub incidence: Incidence,
    /// The METHOD of the VCALENDAR, as written
    pub method: Option<String>,
    /// Upper-cased names of the properties the incidence component actually carried
    pub present: HashSet<String>,
    /// Values of the `X-LIC-ERROR` properties found in the payload
    pub diagnostics: Vec<String>,
}

/// Parse an iCal payload into an [`Incidence`]
pub fn parse(content: &str) -> Result<Parsed, ParseError> {
    let calendar = read_calendar(content)?;
    let method = find_property(&calendar.properties, "METHOD").and_then(|p| p.value.clone()).map(|m| m.trim().to_string());

    let mut diagnostics = collect_diagnostics(&calendar.properties);
    let n_components = calendar.events.len() + calendar.todos.len() + calendar.journals.len();
    if n_components > 1 {
        log::warn!("Payload holds {} incidences, only the first one is processed", n_components);
    }

    let properties: &Vec<Property> = if let Some(event) = calendar.events.first() {
        &event.properties
    } else if let Some(todo) = calendar.todos.first() {
        &todo.properties
    } else if let Some(journal) = calendar.journals.first() {
        &journal.properties
    } else {
        return Err(ParseError::NoCalendarComponent);
    };
    diagnostics.extend(collect_diagnostics(properties));

    let incidence = if let Some(event) = calendar.events.first() {
        parse_event(&event.properties, &event.alarms)
    } else if let Some(todo) = calendar.todos.first() {
        parse_todo(&todo.properties, &todo.alarms)
    } else {
        parse_journal(properties)
    };
    let incidence = incidence.map_err(|err| err.with_diagnostics(&diagnostics))?;

    let present = properties.iter().map(|p| p.name.to_ascii_uppercase()).collect();
    Ok(Parsed { incidence, method, present, diagnostics })
}

/// Parse the first VFREEBUSY of an iCal payload
pub fn parse_free_busy(content: &str) -> Result<FreeBusy, ParseError> {
    let calendar = read_calendar(content)?;
    let diagnostics = collect_diagnostics(&calendar.properties);
    let component = calendar.free_busys.first().ok_or(ParseError::NoCalendarComponent)?;
    read_free_busy(&component.properties).map_err(|err| err.with_diagnostics(&diagnostics))
}

fn read_free_busy(properties: &[Property]) -> Result<FreeBusy, ParseError> {
    let mut owner = None;
    let mut start = None;
    let mut end = None;
    let mut periods = Vec::new();

    for prop in properties {
        let value = prop_value(prop);
        match prop.name.to_ascii_uppercase().as_str() {
            "ORGANIZER" => owner = Some(email_from_cal_address(value)),
            "ATTENDEE" if owner.is_none() => owner = Some(email_from_cal_address(value)),
            "DTSTART" => start = Some(read_instant(prop)?),
            "DTEND" => end = Some(read_instant(prop)?),
            "FREEBUSY" => {
                let busy = param(prop, "FBTYPE").map_or(true, |t| t.eq_ignore_ascii_case("FREE") == false);
                if busy == false {
                    continue;
                }
                for raw in value.split(',').map(str::trim).filter(|p| p.is_empty() == false) {
                    let mut period = parse_period(raw).ok_or_else(|| ParseError::invalid("FREEBUSY", raw, "not a period"))?;
                    period.summary = param(prop, "X-SUMMARY");
                    period.location = param(prop, "X-LOCATION");
                    periods.push(period);
                }
            },
            _ => {},
        }
    }

    let owner = owner.unwrap_or_default();
    let start = start.or_else(|| periods.iter().map(|p| p.start).min()).unwrap_or_else(now);
    let end = end.or_else(|| periods.iter().map(|p| p.end).max()).unwrap_or(start);
    Ok(FreeBusy::new(owner, start, end, periods))
}

/// Reads `start/end` or `start/duration`
fn parse_period(raw: &str) -> Option<Period> {
    let mut parts = raw.splitn(2, '/');
    let start = parse_utc(parts.next()?)?;
    let second = parts.next()?;
    let end = if second.starts_with('P') || second.starts_with('+') || second.starts_with('-') {
        start.checked_add_signed(parse_duration(second)?)?
    } else {
        parse_utc(second)?
    };
    Some(Period::new(start, end))
}

/// Runs the iCal reader on the first VCALENDAR of `content`
fn read_calendar(content: &str) -> Result<IcalCalendar, ParseError> {
    let content = skip_to_calendar(content).ok_or(ParseError::NoCalendarComponent)?;

    let mut reader = ical::IcalParser::new(content.as_bytes());
    let calendar = match reader.next() {
        None => return Err(ParseError::NoCalendarComponent),
        Some(Err(err)) => return Err(ParseError::Malformed { reason: format!("{}", err) }),
        Some(Ok(calendar)) => calendar,
    };

    if let Some(Ok(_)) = reader.next() {
        log::warn!("Payload holds several VCALENDARs, only the first one is processed");
    }
    Ok(calendar)
}

/// Skips whatever comes before the first `BEGIN:VCALENDAR` line
fn skip_to_calendar(content: &str) -> Option<&str> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR") {
            return Some(&content[offset..]);
        }
        offset += line.len();
    }
    None
}

fn collect_diagnostics(properties: &[Property]) -> Vec<String> {
    properties.iter()
        .filter(|p| p.name.eq_ignore_ascii_case("X-LIC-ERROR"))
        .filter_map(|p| p.value.clone())
        .collect()
}

fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn prop_value(prop: &Property) -> &str {
    prop.value.as_deref().unwrap_or("")
}

/// The value of a parameter, without its quotes
fn param(prop: &Property, name: &str) -> Option<String> {
    let params = prop.params.as_ref()?;
    let (_, values) = params.iter().find(|(key, _)| key.eq_ignore_ascii_case(name))?;
    let joined = values.join(",");
    let trimmed = joined.trim().trim_matches('"');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_date(prop: &Property) -> Result<DateTimeValue, ParseError> {
    let value = prop_value(prop);
    let is_date = param(prop, "VALUE").map_or(false, |v| v.eq_ignore_ascii_case("DATE"));
    let tzid = param(prop, "TZID");
    DateTimeValue::parse(value, is_date, tzid.as_deref())
        .map_err(|reason| ParseError::invalid(&prop.name, value, reason))
}

fn read_instant(prop: &Property) -> Result<DateTime<Utc>, ParseError> {
    let value = prop_value(prop);
    parse_utc(value).ok_or_else(|| ParseError::invalid(&prop.name, value, "not a UTC date-time"))
}

fn read_number<T: std::str::FromStr>(prop: &Property) -> Result<T, ParseError> {
    let value = prop_value(prop);
    value.trim().parse::<T>().map_err(|_| ParseError::invalid(&prop.name, value, "not a valid number"))
}

fn read_person(prop: &Property) -> Person {
    Person::new(param(prop, "CN").unwrap_or_default(), email_from_cal_address(prop_value(prop)))
}

fn read_attendee(prop: &Property) -> Attendee {
    let person = read_person(prop);
    let mut attendee = Attendee::new(person.name, person.email);
    if let Some(role) = param(prop, "ROLE") {
        attendee.role = Role::from_param(&role);
    }
    if let Some(status) = param(prop, "PARTSTAT") {
        attendee.status = PartStat::from_param(&status);
    }
    attendee.rsvp = param(prop, "RSVP").map_or(false, |v| v.eq_ignore_ascii_case("TRUE"));
    attendee.delegate = param(prop, "DELEGATED-TO").map(|v| email_from_cal_address(&v));
    attendee.delegator = param(prop, "DELEGATED-FROM").map(|v| email_from_cal_address(&v));
    attendee
}

fn read_alarm(alarm: &IcalAlarm) -> Result<Alarm, ParseError> {
    let mut action = None;
    let mut trigger = None;
    let mut description = None;
    let mut repeat = 0;
    let mut snooze = None;

    for prop in &alarm.properties {
        let value = prop_value(prop);
        match prop.name.to_ascii_uppercase().as_str() {
            "ACTION" => {
                action = Some(AlarmAction::parse(value).ok_or_else(|| ParseError::invalid("ACTION", value, "unknown alarm action"))?);
            },
            "TRIGGER" => {
                let is_absolute = param(prop, "VALUE").map_or(false, |v| v.eq_ignore_ascii_case("DATE-TIME"));
                trigger = Some(if is_absolute {
                    AlarmTrigger::Absolute(read_instant(prop)?)
                } else {
                    let offset = parse_duration(value).ok_or_else(|| ParseError::invalid("TRIGGER", value, "not a duration"))?;
                    match param(prop, "RELATED") {
                        Some(related) if related.eq_ignore_ascii_case("END") => AlarmTrigger::BeforeOrAfterEnd(offset),
                        _ => AlarmTrigger::BeforeOrAfterStart(offset),
                    }
                });
            },
            "DESCRIPTION" => description = Some(unescape_text(value)),
            "REPEAT" => repeat = read_number(prop)?,
            "DURATION" => snooze = Some(parse_duration(value).ok_or_else(|| ParseError::invalid("DURATION", value, "not a duration"))?),
            _ => {},
        }
    }

    Ok(Alarm {
        action: action.ok_or_else(|| ParseError::Malformed { reason: "VALARM without ACTION".to_string() })?,
        trigger: trigger.ok_or_else(|| ParseError::Malformed { reason: "VALARM without TRIGGER".to_string() })?,
        description,
        repeat,
        snooze,
    })
}

/// Reads the properties shared by every kind of incidence.
///
/// The RRULE is returned as text, since reading it needs the start of the incidence.
fn read_base(properties: &[Property], alarms: &[IcalAlarm]) -> Result<(IncidenceBase, Option<String>), ParseError> {
    let mut base = IncidenceBase::new("");
    let mut uid = None;
    let mut created = None;
    let mut last_modified = None;
    let mut stamp = None;
    let mut rrule = None;

    for prop in properties {
        let value = prop_value(prop);
        match prop.name.to_ascii_uppercase().as_str() {
            "UID" => uid = Some(value.trim().to_string()),
            "CREATED" => created = Some(read_instant(prop)?),
            "LAST-MODIFIED" => last_modified = Some(read_instant(prop)?),
            "DTSTAMP" => stamp = Some(read_instant(prop)?),
            "SEQUENCE" => base.sequence = read_number(prop)?,
            "ORGANIZER" => base.organizer = Some(read_person(prop)),
            "ATTENDEE" => { base.add_attendee(read_attendee(prop)); },
            "SUMMARY" => base.summary = unescape_text(value),
            "DESCRIPTION" => base.description = unescape_text(value),
            "LOCATION" => base.location = unescape_text(value),
            "CATEGORIES" => base.categories.extend(split_text_list(value)),
            "PRIORITY" => {
                let priority: u8 = read_number(prop)?;
                if priority > 9 {
                    return Err(ParseError::invalid("PRIORITY", value, "priority must be between 0 and 9"));
                }
                base.priority = priority;
            },
            "CLASS" => base.secrecy = Secrecy::parse(value),
            "RELATED-TO" if value.trim().is_empty() == false => base.related_to = Some(value.trim().to_string()),
            "RRULE" => {
                if rrule.is_some() {
                    log::warn!("Only the first RRULE is supported, ignoring {:?}", value);
                } else {
                    rrule = Some(value.to_string());
                }
            },
            _ => {},
        }
    }

    match uid {
        Some(uid) if uid.is_empty() == false => base.uid = uid,
        _ => {
            base.uid = new_uid();
            log::debug!("Incidence has no UID, using {}", base.uid);
        },
    }
    base.created = created.or(stamp).unwrap_or(base.created);
    base.last_modified = last_modified.unwrap_or(base.created);

    for alarm in alarms {
        base.alarms.push(read_alarm(alarm)?);
    }

    Ok((base, rrule))
}

fn read_recurrence(rrule: Option<String>, start: Option<&DateTimeValue>, base: &IncidenceBase) -> Result<Option<RecurrenceRule>, ParseError> {
    let rrule = match rrule {
        None => return Ok(None),
        Some(r) => r,
    };
    let fallback = DateTimeValue::Utc(base.created);
    let start = start.unwrap_or(&fallback);
    RecurrenceRule::parse(&rrule, start)
        .map(Some)
        .map_err(|reason| ParseError::invalid("RRULE", rrule, reason))
}

fn parse_event(properties: &[Property], alarms: &[IcalAlarm]) -> Result<Incidence, ParseError> {
    let (mut base, rrule) = read_base(properties, alarms)?;
    let mut dtstart = None;
    let mut dtend = None;
    let mut duration: Option<(&str, Duration)> = None;
    let mut transparency = Transparency::Opaque;

    for prop in properties {
        match prop.name.to_ascii_uppercase().as_str() {
            "DTSTART" => dtstart = Some(read_date(prop)?),
            "DTEND" => dtend = Some(read_date(prop)?),
            "DURATION" => {
                let value = prop_value(prop);
                duration = Some((value, parse_duration(value).ok_or_else(|| ParseError::invalid("DURATION", value, "not a duration"))?));
            },
            "TRANSP" => {
                if prop_value(prop).trim().eq_ignore_ascii_case("TRANSPARENT") {
                    transparency = Transparency::Transparent;
                }
            },
            _ => {},
        }
    }

    if dtend.is_none() {
        if let (Some(start), Some((raw, duration))) = (&dtstart, duration) {
            let end = start.shifted_by(duration).ok_or_else(|| ParseError::invalid("DURATION", raw, "the event would end out of the representable range"))?;
            dtend = Some(end);
        }
    }
    let (dtstart, dtend) = match (dtstart, dtend) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start.clone(), start),
        (None, Some(end)) => (end.clone(), end),
        (None, None) => return Err(ParseError::Malformed { reason: format!("VEVENT {} has neither DTSTART nor DTEND", base.uid) }),
    };

    base.recurrence = read_recurrence(rrule, Some(&dtstart), &base)?;
    Ok(Incidence::Event(Event { base, dtstart, dtend, transparency }))
}

fn parse_todo(properties: &[Property], alarms: &[IcalAlarm]) -> Result<Incidence, ParseError> {
    let (mut base, rrule) = read_base(properties, alarms)?;
    let mut dtstart = None;
    let mut due = None;
    let mut completed = None;
    let mut status_completed = false;
    let mut percent_complete = 0;

    for prop in properties {
        match prop.name.to_ascii_uppercase().as_str() {
            "DTSTART" => dtstart = Some(read_date(prop)?),
            "DUE" => due = Some(read_date(prop)?),
            "COMPLETED" => completed = Some(read_instant(prop)?),
            "STATUS" => status_completed = prop_value(prop).trim().eq_ignore_ascii_case("COMPLETED"),
            "PERCENT-COMPLETE" => percent_complete = read_number::<u8>(prop)?.min(100),
            _ => {},
        }
    }

    let completion = match (completed, status_completed) {
        (Some(date), _) => CompletionStatus::Completed(Some(date)),
        (None, true) => CompletionStatus::Completed(None),
        (None, false) => CompletionStatus::Uncompleted,
    };

    base.recurrence = read_recurrence(rrule, dtstart.as_ref().or_else(|| due.as_ref()), &base)?;
    Ok(Incidence::Todo(Todo { base, dtstart, due, completion, percent_complete }))
}

fn parse_journal(properties: &[Property]) -> Result<Incidence, ParseError> {
    let (mut base, rrule) = read_base(properties, &[])?;
    let dtstart = match find_property(properties, "DTSTART") {
        Some(prop) => Some(read_date(prop)?),
        None => None,
    };
    base.recurrence = read_recurrence(rrule, dtstart.as_ref(), &base)?;
    Ok(Incidence::Journal(Journal { base, dtstart }))
}

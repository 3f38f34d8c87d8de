//! A module to build ICal files

use chrono::{DateTime, Utc};
use ics::properties::{Action, Trigger};
use ics::components::{Parameter, Property};
use ics::{escape_text, ICalendar};

use crate::alarm::{Alarm, AlarmTrigger};
use crate::attendee::{Attendee, Person};
use crate::config::prod_id;
use crate::datetime::{format_duration, format_utc, DateTimeValue};
use crate::freebusy::FreeBusy;
use crate::incidence::{CompletionStatus, Incidence, IncidenceBase, Transparency};
use crate::utils::new_uid;

/// Create an iCal payload from an [`Incidence`]
pub fn build_from(incidence: &Incidence, method: Option<&str>, stamp: DateTime<Utc>) -> String {
    let s_stamp = format_utc(&stamp);
    let uid = incidence.uid().to_string();
    let mut calendar = new_calendar(method);

    match incidence {
        Incidence::Event(event) => {
            let mut vevent = ics::Event::new(uid, s_stamp);
            for prop in base_properties(&event.base) {
                vevent.push(prop);
            }
            vevent.push(date_property("DTSTART", &event.dtstart));
            vevent.push(date_property("DTEND", &event.dtend));
            if event.transparency == Transparency::Transparent {
                vevent.push(Property::new("TRANSP", "TRANSPARENT"));
            }
            for alarm in &event.base.alarms {
                vevent.add_alarm(build_alarm(alarm));
            }
            calendar.add_event(vevent);
        },

        Incidence::Todo(todo) => {
            let mut vtodo = ics::ToDo::new(uid, s_stamp);
            for prop in base_properties(&todo.base) {
                vtodo.push(prop);
            }
            if let Some(start) = &todo.dtstart {
                vtodo.push(date_property("DTSTART", start));
            }
            if let Some(due) = &todo.due {
                vtodo.push(date_property("DUE", due));
            }
            match &todo.completion {
                CompletionStatus::Completed(date) => {
                    if let Some(date) = date {
                        vtodo.push(Property::new("COMPLETED", format_utc(date)));
                    }
                    vtodo.push(Property::new("STATUS", "COMPLETED"));
                },
                CompletionStatus::Uncompleted => vtodo.push(Property::new("STATUS", "NEEDS-ACTION")),
            }
            if todo.percent_complete > 0 {
                vtodo.push(Property::new("PERCENT-COMPLETE", todo.percent_complete.to_string()));
            }
            for alarm in &todo.base.alarms {
                vtodo.add_alarm(build_alarm(alarm));
            }
            calendar.add_todo(vtodo);
        },

        Incidence::Journal(journal) => {
            let mut vjournal = ics::Journal::new(uid, s_stamp);
            for prop in base_properties(&journal.base) {
                vjournal.push(prop);
            }
            if let Some(start) = &journal.dtstart {
                vjournal.push(date_property("DTSTART", start));
            }
            calendar.add_journal(vjournal);
        },
    }

    calendar.to_string()
}

/// Create an iCal payload holding a VFREEBUSY
pub fn build_free_busy(free_busy: &FreeBusy, method: Option<&str>, stamp: DateTime<Utc>) -> String {
    let mut vfreebusy = ics::FreeBusy::new(new_uid(), format_utc(&stamp));
    vfreebusy.push(person_property("ORGANIZER", &Person::new("", &free_busy.owner)));
    vfreebusy.push(Property::new("DTSTART", format_utc(&free_busy.start)));
    vfreebusy.push(Property::new("DTEND", format_utc(&free_busy.end)));

    for period in free_busy.periods() {
        let mut prop = Property::new("FREEBUSY", format!("{}/{}", format_utc(&period.start), format_utc(&period.end)));
        if let Some(summary) = &period.summary {
            prop.add(parameter("X-SUMMARY", summary));
        }
        if let Some(location) = &period.location {
            prop.add(parameter("X-LOCATION", location));
        }
        vfreebusy.push(prop);
    }

    let mut calendar = new_calendar(method);
    calendar.add_freebusy(vfreebusy);
    calendar.to_string()
}

fn new_calendar(method: Option<&str>) -> ICalendar<'static> {
    let mut calendar = ICalendar::new("2.0", prod_id());
    if let Some(method) = method {
        calendar.push(Property::new("METHOD", method.to_ascii_uppercase()));
    }
    calendar
}

/// The properties every kind of incidence carries, apart from UID and DTSTAMP
fn base_properties(base: &IncidenceBase) -> Vec<Property<'static>> {
    let mut props = vec![
        Property::new("CREATED", format_utc(&base.created)),
        Property::new("LAST-MODIFIED", format_utc(&base.last_modified)),
        Property::new("SEQUENCE", base.sequence.to_string()),
    ];

    if let Some(organizer) = &base.organizer {
        if organizer.is_empty() == false {
            props.push(person_property("ORGANIZER", organizer));
        }
    }
    for attendee in base.attendees() {
        props.push(attendee_property(attendee));
    }
    if base.summary.is_empty() == false {
        props.push(text_property("SUMMARY", &base.summary));
    }
    if base.description.is_empty() == false {
        props.push(text_property("DESCRIPTION", &base.description));
    }
    if base.location.is_empty() == false {
        props.push(text_property("LOCATION", &base.location));
    }
    for category in &base.categories {
        props.push(text_property("CATEGORIES", category));
    }
    if base.priority > 0 {
        props.push(Property::new("PRIORITY", base.priority.to_string()));
    }
    props.push(Property::new("CLASS", base.secrecy.as_str()));
    if let Some(related) = &base.related_to {
        props.push(Property::new("RELATED-TO", related.clone()));
    }
    if let Some(rule) = &base.recurrence {
        props.push(Property::new("RRULE", rule.to_ical_value()));
    }
    props
}

fn text_property(name: &'static str, value: &str) -> Property<'static> {
    Property::new(name, escape_text(value.to_string()))
}

fn date_property(name: &'static str, value: &DateTimeValue) -> Property<'static> {
    let mut prop = Property::new(name, value.to_ical_value());
    if value.is_all_day() {
        prop.add(Parameter::new("VALUE", "DATE"));
    }
    if let Some(tzid) = value.tzid() {
        prop.add(parameter("TZID", tzid));
    }
    prop
}

fn cal_address(email: &str) -> String {
    format!("MAILTO:{}", email)
}

fn person_property(name: &'static str, person: &Person) -> Property<'static> {
    let mut prop = Property::new(name, cal_address(&person.email));
    if person.name.is_empty() == false {
        prop.add(parameter("CN", &person.name));
    }
    prop
}

fn attendee_property(attendee: &Attendee) -> Property<'static> {
    let mut prop = person_property("ATTENDEE", &attendee.as_person());
    prop.add(Parameter::new("ROLE", attendee.role.as_str()));
    prop.add(Parameter::new("PARTSTAT", attendee.status.as_param()));
    if attendee.rsvp {
        prop.add(Parameter::new("RSVP", "TRUE"));
    }
    if let Some(delegate) = &attendee.delegate {
        prop.add(parameter("DELEGATED-TO", &cal_address(delegate)));
    }
    if let Some(delegator) = &attendee.delegator {
        prop.add(parameter("DELEGATED-FROM", &cal_address(delegator)));
    }
    prop
}

fn build_alarm(alarm: &Alarm) -> ics::Alarm<'static> {
    let trigger = match &alarm.trigger {
        AlarmTrigger::BeforeOrAfterStart(offset) => Trigger::new(format_duration(offset)),
        AlarmTrigger::BeforeOrAfterEnd(offset) => {
            let mut trigger = Trigger::new(format_duration(offset));
            trigger.add(Parameter::new("RELATED", "END"));
            trigger
        },
        AlarmTrigger::Absolute(date) => {
            let mut trigger = Trigger::new(format_utc(date));
            trigger.add(Parameter::new("VALUE", "DATE-TIME"));
            trigger
        },
    };

    let mut valarm = ics::Alarm::new(Action::new(alarm.action.as_str()), trigger);
    if let Some(description) = &alarm.description {
        valarm.push(text_property("DESCRIPTION", description));
    }
    if alarm.repeat > 0 {
        valarm.push(Property::new("REPEAT", alarm.repeat.to_string()));
    }
    if let Some(snooze) = &alarm.snooze {
        valarm.push(Property::new("DURATION", format_duration(snooze)));
    }
    valarm
}

/// A parameter, quoted when its value holds a delimiter.
///
/// Parameter values cannot hold a double quote at all, so these become single quotes.
fn parameter(key: &'static str, value: &str) -> Parameter<'static> {
    let value = value.replace('"', "'");
    if value.contains(|c: char| c == ':' || c == ';' || c == ',') {
        Parameter::new(key, format!("\"{}\"", value))
    } else {
        Parameter::new(key, value)
    }
}

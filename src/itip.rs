//! iTIP: the METHOD envelope around scheduling messages, and how incoming messages compare to local data

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, RestrictionError, ScheduleError, StoreError};
use crate::ical::{self, Parsed};
use crate::incidence::Incidence;
use crate::traits::PersistentStore;

/// The iTIP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Publish,
    Request,
    Refresh,
    Cancel,
    Add,
    Reply,
    Counter,
    DeclineCounter,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Publish => "PUBLISH",
            Method::Request => "REQUEST",
            Method::Refresh => "REFRESH",
            Method::Cancel => "CANCEL",
            Method::Add => "ADD",
            Method::Reply => "REPLY",
            Method::Counter => "COUNTER",
            Method::DeclineCounter => "DECLINECOUNTER",
        }
    }

    /// Case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PUBLISH" => Some(Method::Publish),
            "REQUEST" => Some(Method::Request),
            "REFRESH" => Some(Method::Refresh),
            "CANCEL" => Some(Method::Cancel),
            "ADD" => Some(Method::Add),
            "REPLY" => Some(Method::Reply),
            "COUNTER" => Some(Method::Counter),
            "DECLINECOUNTER" => Some(Method::DeclineCounter),
            _ => None,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The METHOD of a received message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageMethod {
    Known(Method),
    /// A METHOD this crate does not know, as written in the payload
    Unrecognized(String),
}

/// What should be done with a received message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleStatus {
    /// We have never seen this incidence: it can be added
    New,
    /// This is a newer revision of an incidence we have: it can replace it
    Update,
    /// We already have this revision, or a newer one: ignore it
    Obsolete,
    /// The METHOD is not recognized: do not apply it
    UnknownMethod,
}

/// A received scheduling message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleMessage {
    pub incidence: Incidence,
    pub method: MessageMethod,
    /// Set by [`ScheduleMessage::classify_against`]
    pub status: Option<ScheduleStatus>,
}

impl ScheduleMessage {
    pub fn new(incidence: Incidence, method: MessageMethod) -> Self {
        Self { incidence, method, status: None }
    }

    pub fn known_method(&self) -> Option<Method> {
        match &self.method {
            MessageMethod::Known(method) => Some(*method),
            MessageMethod::Unrecognized(_) => None,
        }
    }

    /// Classifies this message against its local counterpart, and remembers the outcome
    pub fn classify_against(&mut self, local: Option<&Incidence>) -> ScheduleStatus {
        let status = classify(self, local);
        self.status = Some(status);
        status
    }
}

/// Wraps an incidence into a scheduling message
pub fn create_schedule_message(incidence: &Incidence, method: Method) -> String {
    ical::encode(incidence, Some(method))
}

/// Reads a scheduling message, and checks it is well-formed for its METHOD.
///
/// A message without METHOD is a [`ParseError::MissingMethod`]. A message with an unrecognized METHOD is returned as is
/// (its classification will be [`ScheduleStatus::UnknownMethod`]).
pub fn parse_schedule_message(text: &str) -> Result<ScheduleMessage, ScheduleError> {
    let parsed = ical::parse(text)?;
    let raw_method = match &parsed.method {
        Some(m) if m.is_empty() == false => m.clone(),
        _ => return Err(ParseError::MissingMethod.into()),
    };

    let method = match Method::parse(&raw_method) {
        Some(method) => method,
        None => {
            log::warn!("Unrecognized iTIP method {:?} for {}", raw_method, parsed.incidence.uid());
            return Ok(ScheduleMessage::new(parsed.incidence, MessageMethod::Unrecognized(raw_method)));
        },
    };

    check_restrictions(method, &raw_method, &parsed)?;
    Ok(ScheduleMessage::new(parsed.incidence, MessageMethod::Known(method)))
}

/// Compares an incoming message to the local incidence with the same UID.
///
/// The outcome only depends on the method and on both sequence numbers.
pub fn classify(message: &ScheduleMessage, local: Option<&Incidence>) -> ScheduleStatus {
    if let MessageMethod::Unrecognized(_) = message.method {
        return ScheduleStatus::UnknownMethod;
    }
    match local {
        None => ScheduleStatus::New,
        Some(local) if message.incidence.sequence() > local.sequence() => ScheduleStatus::Update,
        Some(_) => ScheduleStatus::Obsolete,
    }
}

/// Same as [`classify`], looking the local incidence up in `store`
pub async fn classify_in<S>(store: &S, message: &ScheduleMessage) -> Result<ScheduleStatus, StoreError>
where
    S: PersistentStore + Sync,
{
    let local = store.find_by_uid(message.incidence.uid()).await?;
    Ok(classify(message, local.as_ref()))
}


#[derive(Clone, Copy, PartialEq, Eq)]
enum AttendeeCount {
    Any,
    AtLeastOne,
    ExactlyOne,
}

/// What a message must carry to be valid for a given method
struct Restrictions {
    organizer: bool,
    uid: bool,
    attendees: AttendeeCount,
    event_start: bool,
    allows_journals: bool,
}

impl Restrictions {
    fn of(method: Method) -> Self {
        let (organizer, uid, attendees, event_start, allows_journals) = match method {
            Method::Publish => (false, false, AttendeeCount::Any, false, true),
            Method::Request => (true, true, AttendeeCount::AtLeastOne, true, false),
            Method::Reply => (true, true, AttendeeCount::ExactlyOne, false, false),
            Method::Add => (true, true, AttendeeCount::Any, false, true),
            Method::Cancel => (false, true, AttendeeCount::Any, false, true),
            Method::Refresh => (false, true, AttendeeCount::ExactlyOne, false, false),
            Method::Counter => (false, true, AttendeeCount::AtLeastOne, false, false),
            Method::DeclineCounter => (true, true, AttendeeCount::Any, false, false),
        };
        Self { organizer, uid, attendees, event_start, allows_journals }
    }
}

fn check_restrictions(method: Method, raw_method: &str, parsed: &Parsed) -> Result<(), RestrictionError> {
    let rules = Restrictions::of(method);
    let incidence = &parsed.incidence;
    let mut violations = Vec::new();

    if incidence.is_journal() && rules.allows_journals == false {
        violations.push(format!("a VJOURNAL cannot be sent with METHOD:{}", method));
    }
    if rules.organizer && incidence.organizer().as_ref().map_or(true, |o| o.is_empty()) {
        violations.push("ORGANIZER is required".to_string());
    }
    if rules.uid && parsed.present.contains("UID") == false {
        violations.push("UID is required".to_string());
    }
    let n_attendees = incidence.attendees().len();
    match rules.attendees {
        AttendeeCount::Any => {},
        AttendeeCount::AtLeastOne if n_attendees == 0 => violations.push("at least one ATTENDEE is required".to_string()),
        AttendeeCount::ExactlyOne if n_attendees != 1 => violations.push(format!("exactly one ATTENDEE is required, found {}", n_attendees)),
        _ => {},
    }
    if rules.event_start && incidence.is_event() && parsed.present.contains("DTSTART") == false {
        violations.push("DTSTART is required".to_string());
    }

    if violations.is_empty() {
        return Ok(());
    }
    log::info!("Rejecting {} message for {}: {:?}", raw_method, incidence.uid(), violations);
    violations.extend(parsed.diagnostics.iter().cloned());
    Err(RestrictionError {
        method: raw_method.to_string(),
        details: violations.join("\n"),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendee::{Attendee, Person};
    use crate::datetime::DateTimeValue;
    use crate::incidence::{Event, Journal};
    use chrono::NaiveDate;

    fn event() -> Incidence {
        let start = DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 0, 0));
        let end = DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, 1).and_hms(10, 0, 0));
        let mut event = Event::new("Planning", start, end);
        event.base.organizer = Some(Person::new("Alice", "alice@example.com"));
        Incidence::Event(event)
    }

    fn with_attendees(mut incidence: Incidence, n: usize) -> Incidence {
        for i in 0..n {
            incidence.base_mut().add_attendee(Attendee::new("", format!("guest{}@example.com", i)));
        }
        incidence
    }

    #[test]
    fn methods_are_case_insensitive() {
        assert_eq!(Method::parse("declineCounter"), Some(Method::DeclineCounter));
        assert_eq!(Method::parse(" reply "), Some(Method::Reply));
        assert_eq!(Method::parse("X-FOO"), None);
        assert_eq!(Method::Request.to_string(), "REQUEST");
    }

    #[test]
    fn restriction_table() {
        let cases = vec![
            (Method::Publish, 0, true),
            (Method::Request, 0, false),
            (Method::Request, 2, true),
            (Method::Reply, 1, true),
            (Method::Reply, 2, false),
            (Method::Add, 0, true),
            (Method::Cancel, 0, true),
            (Method::Refresh, 1, true),
            (Method::Refresh, 0, false),
            (Method::Counter, 0, false),
            (Method::Counter, 1, true),
            (Method::DeclineCounter, 0, true),
        ];
        for (method, n_attendees, valid) in cases {
            let text = create_schedule_message(&with_attendees(event(), n_attendees), method);
            let result = parse_schedule_message(&text);
            assert_eq!(result.is_ok(), valid, "{} with {} attendee(s): {:?}", method, n_attendees, result);
        }
    }

    #[test]
    fn organizer_and_uid_are_checked() {
        let mut anonymous = with_attendees(event(), 1);
        anonymous.base_mut().organizer = None;
        let text = create_schedule_message(&anonymous, Method::Reply);
        match parse_schedule_message(&text).unwrap_err() {
            ScheduleError::Restriction(err) => {
                assert_eq!(err.method, "REPLY");
                assert_eq!(err.details, "ORGANIZER is required");
            },
            other => panic!("unexpected error {:?}", other),
        }

        let no_uid = "BEGIN:VCALENDAR\nMETHOD:Cancel\nX-LIC-ERROR:broken line 4\nBEGIN:VEVENT\nDTSTART:20240301T100000Z\nEND:VEVENT\nEND:VCALENDAR\n";
        match parse_schedule_message(no_uid).unwrap_err() {
            ScheduleError::Restriction(err) => {
                assert_eq!(err.method, "Cancel");
                assert_eq!(err.details, "UID is required\nbroken line 4");
            },
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn journals_are_restricted() {
        let mut journal = Incidence::Journal(Journal::new("Minutes"));
        journal.base_mut().organizer = Some(Person::new("", "alice@example.com"));
        let journal = with_attendees(journal, 1);
        assert!(parse_schedule_message(&create_schedule_message(&journal, Method::Add)).is_ok());
        assert!(parse_schedule_message(&create_schedule_message(&journal, Method::Request)).is_err());
    }

    #[test]
    fn method_is_required() {
        let text = ical::encode(&event(), None);
        assert_eq!(
            parse_schedule_message(&text).unwrap_err(),
            ScheduleError::Parse(ParseError::MissingMethod)
        );
    }

    #[test]
    fn classification() {
        let local = event();
        let mut newer = local.clone();
        newer.base_mut().sequence = 1;

        let mut message = ScheduleMessage::new(newer, MessageMethod::Known(Method::Request));
        assert_eq!(classify(&message, None), ScheduleStatus::New);
        assert_eq!(message.classify_against(Some(&local)), ScheduleStatus::Update);
        assert_eq!(message.status, Some(ScheduleStatus::Update));

        let same = ScheduleMessage::new(local.clone(), MessageMethod::Known(Method::Request));
        assert_eq!(classify(&same, Some(&local)), ScheduleStatus::Obsolete);

        let text = create_schedule_message(&local, Method::Publish).replace("METHOD:PUBLISH", "METHOD:X-FORWARD");
        let unknown = parse_schedule_message(&text).unwrap();
        assert_eq!(unknown.method, MessageMethod::Unrecognized("X-FORWARD".to_string()));
        assert_eq!(classify(&unknown, None), ScheduleStatus::UnknownMethod);
    }
}

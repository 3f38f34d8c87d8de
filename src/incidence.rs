//! Calendar incidences: events, to-dos and journals

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::Alarm;
use crate::attendee::{Attendee, Person};
use crate::datetime::DateTimeValue;
use crate::recurrence::RecurrenceRule;
use crate::utils::{new_uid, now};

/// The `CLASS` of an incidence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Secrecy {
    Public,
    Private,
    Confidential,
}

impl Default for Secrecy {
    fn default() -> Self {
        Secrecy::Public
    }
}

impl Secrecy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Secrecy::Public => "PUBLIC",
            Secrecy::Private => "PRIVATE",
            Secrecy::Confidential => "CONFIDENTIAL",
        }
    }

    /// Unknown classes are treated as private (RFC 5545 §3.8.1.3)
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" => Secrecy::Public,
            "CONFIDENTIAL" => Secrecy::Confidential,
            _ => Secrecy::Private,
        }
    }
}

/// Whether an event blocks time in free/busy lookups (`TRANSP`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transparency {
    Opaque,
    Transparent,
}

impl Default for Transparency {
    fn default() -> Self {
        Transparency::Opaque
    }
}

/// RFC5545 defines the completion as several optional fields, yet some combinations make no sense.
/// This enum provides an API that forbids such impossible combinations.
///
/// * `COMPLETED` is an optional timestamp that tells whether this task is completed
/// * `STATUS` is an optional field, that can be set to `NEEDS-ACTION`, `COMPLETED`, or others.
/// Even though having a `COMPLETED` date but a `STATUS:NEEDS-ACTION` is theorically possible, it obviously makes no sense. This API ensures this cannot happen
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Completed(Option<DateTime<Utc>>),
    Uncompleted,
}

impl CompletionStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionStatus::Completed(_))
    }
}

impl Default for CompletionStatus {
    fn default() -> Self {
        CompletionStatus::Uncompleted
    }
}

/// The fields every kind of incidence has
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceBase {
    /// Persistent, globally unique identifier, stable across revisions
    pub uid: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Revision number, bumped on every substantive edit
    pub sequence: u32,
    pub organizer: Option<Person>,
    pub summary: String,
    pub description: String,
    pub location: String,
    /// Informational only, in display order
    pub categories: Vec<String>,
    /// 0 (undefined) to 9 (lowest)
    pub priority: u8,
    pub secrecy: Secrecy,
    /// Attendees, unique by [`Attendee::identity`]. Use [`IncidenceBase::add_attendee`] to keep it that way.
    attendees: Vec<Attendee>,
    pub alarms: Vec<Alarm>,
    /// UID of the parent incidence. This is resolved by lookup, see [`crate::relations`]
    pub related_to: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
}

impl IncidenceBase {
    /// A brand new base, with a random UID
    pub fn new<S: ToString>(summary: S) -> Self {
        let now = now();
        Self {
            uid: new_uid(),
            created: now,
            last_modified: now,
            sequence: 0,
            organizer: None,
            summary: summary.to_string(),
            description: String::new(),
            location: String::new(),
            categories: Vec::new(),
            priority: 0,
            secrecy: Secrecy::Public,
            attendees: Vec::new(),
            alarms: Vec::new(),
            related_to: None,
            recurrence: None,
        }
    }

    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }

    /// Adds an attendee, replacing any existing one with the same identity.
    ///
    /// Returns `false` (and ignores the attendee) if it has neither a name nor an email.
    pub fn add_attendee(&mut self, attendee: Attendee) -> bool {
        if attendee.identity().is_none() {
            log::warn!("Ignoring an attendee with neither a name nor an email in {}", self.uid);
            return false;
        }
        match self.attendees.iter_mut().find(|a| a.is_same_person(&attendee)) {
            Some(existing) => *existing = attendee,
            None => self.attendees.push(attendee),
        }
        true
    }

    pub fn remove_attendee(&mut self, attendee: &Attendee) -> Option<Attendee> {
        let index = self.attendees.iter().position(|a| a.is_same_person(attendee))?;
        Some(self.attendees.remove(index))
    }

    pub fn clear_attendees(&mut self) {
        self.attendees.clear();
    }

    pub fn attendee_by_email(&self, email: &str) -> Option<&Attendee> {
        let email = email.trim().to_lowercase();
        self.attendees.iter().find(|a| a.email.to_lowercase() == email)
    }
}

/// A calendar event (iCal `VEVENT`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub base: IncidenceBase,
    pub dtstart: DateTimeValue,
    pub dtend: DateTimeValue,
    pub transparency: Transparency,
}

impl Event {
    pub fn new<S: ToString>(summary: S, dtstart: DateTimeValue, dtend: DateTimeValue) -> Self {
        Self {
            base: IncidenceBase::new(summary),
            dtstart,
            dtend,
            transparency: Transparency::Opaque,
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.dtstart.is_all_day()
    }

    /// The wall-clock length of this event
    pub fn duration(&self) -> Duration {
        self.dtend.naive_local() - self.dtstart.naive_local()
    }
}

/// A to-do task (iCal `VTODO`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub base: IncidenceBase,
    pub dtstart: Option<DateTimeValue>,
    pub due: Option<DateTimeValue>,
    pub completion: CompletionStatus,
    /// 0 to 100
    pub percent_complete: u8,
}

impl Todo {
    pub fn new<S: ToString>(summary: S) -> Self {
        Self {
            base: IncidenceBase::new(summary),
            dtstart: None,
            due: None,
            completion: CompletionStatus::Uncompleted,
            percent_complete: 0,
        }
    }

    pub fn completed(&self) -> bool {
        self.completion.is_completed()
    }
}

/// A journal entry (iCal `VJOURNAL`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub base: IncidenceBase,
    pub dtstart: Option<DateTimeValue>,
}

impl Journal {
    pub fn new<S: ToString>(summary: S) -> Self {
        Self { base: IncidenceBase::new(summary), dtstart: None }
    }
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Incidence {
    Event(Event),
    Todo(Todo),
    Journal(Journal),
}

/// Returns a reference to `base.$property_name`, whatever the kind of incidence
macro_rules! synthetise_common_getter {
    ($property_name:ident, $return_type:ty) => {
        pub fn $property_name(&self) -> $return_type {
            &self.base().$property_name
        }
    }
}

impl Incidence {
    synthetise_common_getter!(uid, &str);
    synthetise_common_getter!(summary, &str);
    synthetise_common_getter!(description, &str);
    synthetise_common_getter!(location, &str);
    synthetise_common_getter!(categories, &[String]);
    synthetise_common_getter!(organizer, &Option<Person>);
    synthetise_common_getter!(related_to, &Option<String>);
    synthetise_common_getter!(recurrence, &Option<RecurrenceRule>);
    synthetise_common_getter!(alarms, &[Alarm]);
    synthetise_common_getter!(last_modified, &DateTime<Utc>);

    pub fn base(&self) -> &IncidenceBase {
        match self {
            Incidence::Event(e) => &e.base,
            Incidence::Todo(t) => &t.base,
            Incidence::Journal(j) => &j.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut IncidenceBase {
        match self {
            Incidence::Event(e) => &mut e.base,
            Incidence::Todo(t) => &mut t.base,
            Incidence::Journal(j) => &mut j.base,
        }
    }

    pub fn sequence(&self) -> u32 {
        self.base().sequence
    }

    pub fn attendees(&self) -> &[Attendee] {
        self.base().attendees()
    }

    /// The name of the iCal component this incidence is written as
    pub fn component_name(&self) -> &'static str {
        match self {
            Incidence::Event(_) => "VEVENT",
            Incidence::Todo(_) => "VTODO",
            Incidence::Journal(_) => "VJOURNAL",
        }
    }

    pub fn dtstart(&self) -> Option<&DateTimeValue> {
        match self {
            Incidence::Event(e) => Some(&e.dtstart),
            Incidence::Todo(t) => t.dtstart.as_ref(),
            Incidence::Journal(j) => j.dtstart.as_ref(),
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Incidence::Event(_))
    }

    pub fn is_todo(&self) -> bool {
        matches!(self, Incidence::Todo(_))
    }

    pub fn is_journal(&self) -> bool {
        matches!(self, Incidence::Journal(_))
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Incidence::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_todo(&self) -> Option<&Todo> {
        match self {
            Incidence::Todo(t) => Some(t),
            _ => None,
        }
    }

    /// Lists what differs between `previous` and `self`.
    ///
    /// Incidences are replaced as a whole, never edited in place: callers compare two snapshots with this function.
    pub fn changes_since(&self, previous: &Incidence) -> Vec<IncidenceChange> {
        let (new, old) = (self.base(), previous.base());
        let mut changes = Vec::new();

        if std::mem::discriminant(self) != std::mem::discriminant(previous) {
            changes.push(IncidenceChange::Kind);
        }
        if new.summary != old.summary { changes.push(IncidenceChange::Summary); }
        if new.description != old.description { changes.push(IncidenceChange::Description); }
        if new.location != old.location { changes.push(IncidenceChange::Location); }
        if new.organizer != old.organizer { changes.push(IncidenceChange::Organizer); }
        if new.secrecy != old.secrecy { changes.push(IncidenceChange::Secrecy); }
        if new.priority != old.priority { changes.push(IncidenceChange::Priority); }
        if new.categories != old.categories { changes.push(IncidenceChange::Categories); }
        if new.alarms != old.alarms { changes.push(IncidenceChange::Alarms); }
        if new.related_to != old.related_to { changes.push(IncidenceChange::RelatedTo); }
        if new.recurrence != old.recurrence { changes.push(IncidenceChange::Recurrence); }
        if timing(self) != timing(previous) { changes.push(IncidenceChange::Timing); }
        if completion(self) != completion(previous) { changes.push(IncidenceChange::Completion); }

        let same_people = new.attendees.len() == old.attendees.len()
            && new.attendees.iter().all(|a| old.attendees.iter().any(|o| o.is_same_person(a) && o.role == a.role));
        if same_people == false {
            changes.push(IncidenceChange::Attendees);
        } else {
            let same_answers = new.attendees.iter().all(|a| {
                old.attendees.iter().any(|o| o.is_same_person(a) && o.status == a.status && o.rsvp == a.rsvp)
            });
            if same_answers == false {
                changes.push(IncidenceChange::AttendeeStatus);
            }
        }

        changes
    }

    /// Builds the next revision of `self` out of an edited copy.
    ///
    /// The UID and creation date are kept. The sequence is bumped when the edit is substantive
    /// (see [`IncidenceChange::is_substantive`]), and never goes backwards.
    pub fn revise(&self, edited: Incidence) -> Incidence {
        let changes = edited.changes_since(self);
        let mut next = edited;
        {
            let base = next.base_mut();
            base.uid = self.uid().to_string();
            base.created = self.base().created;
            base.sequence = base.sequence.max(self.sequence());
        }
        if changes.iter().any(IncidenceChange::is_substantive) {
            let base = next.base_mut();
            base.sequence = base.sequence.max(self.sequence() + 1);
        }
        if changes.is_empty() == false {
            next.base_mut().last_modified = now();
        }
        next
    }
}

/// A kind of difference between two snapshots of an incidence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncidenceChange {
    Kind,
    Summary,
    Description,
    Location,
    Organizer,
    Secrecy,
    Priority,
    Categories,
    Alarms,
    RelatedTo,
    Recurrence,
    /// Start, end or due date
    Timing,
    Completion,
    /// Someone was added or removed, or changed role
    Attendees,
    /// Someone answered differently
    AttendeeStatus,
}

impl IncidenceChange {
    /// Whether attendees must be asked again, i.e. whether the SEQUENCE must be bumped
    pub fn is_substantive(&self) -> bool {
        match self {
            IncidenceChange::Kind
            | IncidenceChange::Summary
            | IncidenceChange::Description
            | IncidenceChange::Location
            | IncidenceChange::Organizer
            | IncidenceChange::Secrecy
            | IncidenceChange::Recurrence
            | IncidenceChange::Timing
            | IncidenceChange::Completion
            | IncidenceChange::Attendees => true,
            IncidenceChange::Priority
            | IncidenceChange::Categories
            | IncidenceChange::Alarms
            | IncidenceChange::RelatedTo
            | IncidenceChange::AttendeeStatus => false,
        }
    }
}

fn timing(incidence: &Incidence) -> (Option<&DateTimeValue>, Option<&DateTimeValue>) {
    match incidence {
        Incidence::Event(e) => (Some(&e.dtstart), Some(&e.dtend)),
        Incidence::Todo(t) => (t.dtstart.as_ref(), t.due.as_ref()),
        Incidence::Journal(j) => (j.dtstart.as_ref(), None),
    }
}

fn completion(incidence: &Incidence) -> Option<(&CompletionStatus, u8)> {
    incidence.as_todo().map(|t| (&t.completion, t.percent_complete))
}

//! Organizers and attendees of an incidence

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Someone identified by a display name and an email address (e.g. an organizer)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    pub fn new<N: ToString, E: ToString>(name: N, email: E) -> Self {
        Self { name: name.to_string(), email: email.to_string() }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty()
    }
}

impl Display for Person {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.name.is_empty(), self.email.is_empty()) {
            (false, false) => write!(f, "{} <{}>", self.name, self.email),
            (true, _) => write!(f, "{}", self.email),
            (false, true) => write!(f, "{}", self.name),
        }
    }
}

/// The `ROLE` of an attendee
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Chair,
    ReqParticipant,
    OptParticipant,
    NonParticipant,
}

impl Default for Role {
    fn default() -> Self {
        Role::ReqParticipant
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Chair => "CHAIR",
            Role::ReqParticipant => "REQ-PARTICIPANT",
            Role::OptParticipant => "OPT-PARTICIPANT",
            Role::NonParticipant => "NON-PARTICIPANT",
        }
    }

    /// Parses a ROLE parameter. Unknown roles read as the RFC 5545 default.
    pub fn from_param(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "CHAIR" => Role::Chair,
            "OPT-PARTICIPANT" => Role::OptParticipant,
            "NON-PARTICIPANT" => Role::NonParticipant,
            _ => Role::ReqParticipant,
        }
    }
}

/// The `PARTSTAT` of an attendee
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartStat {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
    Completed,
    InProcess,
    /// An unsupported participation status. Written as `X-NONE` so that it reads back as itself.
    None,
}

impl Default for PartStat {
    fn default() -> Self {
        PartStat::NeedsAction
    }
}

impl PartStat {
    /// The PARTSTAT parameter value
    pub fn as_param(&self) -> &'static str {
        match self {
            PartStat::NeedsAction => "NEEDS-ACTION",
            PartStat::Accepted => "ACCEPTED",
            PartStat::Declined => "DECLINED",
            PartStat::Tentative => "TENTATIVE",
            PartStat::Delegated => "DELEGATED",
            PartStat::Completed => "COMPLETED",
            PartStat::InProcess => "IN-PROCESS",
            PartStat::None => "X-NONE",
        }
    }

    pub fn from_param(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => PartStat::NeedsAction,
            "ACCEPTED" => PartStat::Accepted,
            "DECLINED" => PartStat::Declined,
            "TENTATIVE" => PartStat::Tentative,
            "DELEGATED" => PartStat::Delegated,
            "COMPLETED" => PartStat::Completed,
            "IN-PROCESS" => PartStat::InProcess,
            other => {
                log::debug!("Unsupported PARTSTAT {:?}", other);
                PartStat::None
            },
        }
    }
}

/// A participant of an incidence
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: PartStat,
    pub rsvp: bool,
    /// Whom this attendee delegated to (`DELEGATED-TO`)
    pub delegate: Option<String>,
    /// Who delegated to this attendee (`DELEGATED-FROM`)
    pub delegator: Option<String>,
}

impl Attendee {
    pub fn new<N: ToString, E: ToString>(name: N, email: E) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: PartStat) -> Self {
        self.status = status;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_rsvp(mut self, rsvp: bool) -> Self {
        self.rsvp = rsvp;
        self
    }

    /// The key two attendees are compared by: the lower-cased email, or failing that the name.
    ///
    /// Returns `None` for an attendee with neither an email nor a name.
    pub fn identity(&self) -> Option<String> {
        let email = self.email.trim();
        if email.is_empty() == false {
            return Some(email.to_lowercase());
        }
        let name = self.name.trim();
        if name.is_empty() == false {
            return Some(name.to_string());
        }
        None
    }

    pub fn is_same_person(&self, other: &Attendee) -> bool {
        match (self.identity(), other.identity()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        }
    }

    pub fn as_person(&self) -> Person {
        Person::new(&self.name, &self.email)
    }
}

/// Strips the `mailto:` scheme of a CAL-ADDRESS value
pub fn email_from_cal_address(value: &str) -> String {
    let value = value.trim();
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => value[7..].to_string(),
        _ => value.to_string(),
    }
}

//! Error types returned by this crate
//!
//! Every failure is a value. Nothing in the codec, the scheduler or the slot finder aborts the process.

use thiserror::Error;

/// Malformed or incomplete iCalendar data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload has no VCALENDAR, or the VCALENDAR has no component this crate can decode
    #[error("no VCALENDAR with a decodable component was found")]
    NoCalendarComponent,
    /// The underlying iCalendar reader rejected the payload
    #[error("malformed iCalendar data: {reason}")]
    Malformed { reason: String },
    /// A recognized property carries a value that cannot be understood
    #[error("invalid {property} value {value:?}: {reason}")]
    InvalidValue { property: String, value: String, reason: String },
    /// A schedule message has no METHOD property
    #[error("schedule message has no METHOD")]
    MissingMethod,
}

impl ParseError {
    pub(crate) fn invalid<P: ToString, V: ToString, R: ToString>(property: P, value: V, reason: R) -> Self {
        Self::InvalidValue {
            property: property.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Appends the diagnostic lines embedded in the payload (e.g. `X-LIC-ERROR`) to the reason of this error
    pub(crate) fn with_diagnostics(self, diagnostics: &[String]) -> Self {
        if diagnostics.is_empty() {
            return self;
        }
        let extra = diagnostics.join("\n");
        match self {
            Self::Malformed { reason } => Self::Malformed { reason: format!("{}\n{}", reason, extra) },
            Self::InvalidValue { property, value, reason } => Self::InvalidValue { property, value, reason: format!("{}\n{}", reason, extra) },
            other => other,
        }
    }
}

/// Structurally valid iCalendar that does not fit the iTIP method it claims to use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} message rejected:\n{details}")]
pub struct RestrictionError {
    /// The METHOD of the rejected message, as written in the payload
    pub method: String,
    /// One violated restriction or embedded diagnostic per line
    pub details: String,
}

/// Failures of [`parse_schedule_message`](crate::itip::parse_schedule_message)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Restriction(#[from] RestrictionError),
}

/// Failures when fetching or publishing free/busy information
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("invalid free/busy URL {0:?}")]
    InvalidUrl(String),
    #[error("unable to decode free/busy data: {0}")]
    Parse(#[from] ParseError),
    #[error("no free/busy information available for {0}")]
    Unavailable(String),
}

/// Mail delivery failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("no recipient to send the message to")]
    NoRecipients,
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Failures of a [`PersistentStore`](crate::traits::PersistentStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no incidence with UID {0}")]
    NotFound(String),
    #[error("an incidence with UID {0} already exists")]
    AlreadyExists(String),
    #[error("refusing to replace revision {stored} of {uid} with older revision {incoming}")]
    StaleRevision { uid: String, stored: u32, incoming: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures of the on-disk [`FreeBusyCache`](crate::cache::FreeBusyCache)
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid cached free/busy data: {0}")]
    Parse(#[from] ParseError),
}

/// Failures of the [`Scheduler`](crate::scheduler::Scheduler)
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("unable to send message: {0}")]
    Send(#[from] SendError),
    /// The message uses a METHOD this crate cannot apply
    #[error("unknown iTIP method {0:?}")]
    UnknownMethod(String),
}

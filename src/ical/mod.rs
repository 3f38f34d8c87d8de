//! This module handles conversion between iCal files and internal representations
//!
//! It is a wrapper around different Rust third-party libraries, since I haven't find any complete library that is able to parse _and_ generate iCal files

mod parser;
pub(crate) use parser::{parse, Parsed};
mod builder;

use chrono::{DateTime, Utc};

use crate::error::ParseError;
use crate::freebusy::FreeBusy;
use crate::incidence::Incidence;
use crate::itip::Method;
use crate::utils::now;

/// Writes an incidence as a VCALENDAR, with a METHOD when one is given.
///
/// The output only depends on `incidence`, apart from DTSTAMP which is set to the current time.
pub fn encode(incidence: &Incidence, method: Option<Method>) -> String {
    encode_at(incidence, method, now())
}

/// Same as [`encode`], with a fixed DTSTAMP
pub fn encode_at(incidence: &Incidence, method: Option<Method>, stamp: DateTime<Utc>) -> String {
    builder::build_from(incidence, method.as_ref().map(Method::as_str), stamp)
}

/// Reads the first incidence of the first VCALENDAR of `content`.
///
/// VEVENTs are looked for first, then VTODOs, then VJOURNALs. Unknown properties are ignored.
pub fn decode(content: &str) -> Result<Incidence, ParseError> {
    parse(content).map(|parsed| parsed.incidence)
}

/// Writes free/busy information as a VCALENDAR holding a VFREEBUSY
pub fn encode_free_busy(free_busy: &FreeBusy, method: Option<Method>) -> String {
    builder::build_free_busy(free_busy, method.as_ref().map(Method::as_str), now())
}

/// Reads the first VFREEBUSY of `content`. Its periods are normalized.
pub fn decode_free_busy(content: &str) -> Result<FreeBusy, ParseError> {
    parser::parse_free_busy(content)
}

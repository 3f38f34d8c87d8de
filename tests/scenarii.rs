//! Fixtures shared by the integration tests
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use rendezvous::datetime::DateTimeValue;
use rendezvous::error::{FetchError, SendError};
use rendezvous::traits::{FreeBusySource, MailTransport};
use rendezvous::{Attendee, Event, FreeBusy, Incidence, PartStat, Period, Person};

pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";
pub const CAROL: &str = "carol@example.com";

/// 2024-03-01 at the given hour and minute, UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.ymd(2024, 3, 1).and_hms(hour, minute, 0)
}

/// A one-hour meeting organized by Alice, which Bob is invited to
pub fn meeting(uid: &str) -> Incidence {
    let day = NaiveDate::from_ymd(2024, 3, 1);
    let mut event = Event::new(
        "Quarterly review",
        DateTimeValue::Floating(day.and_hms(9, 0, 0)),
        DateTimeValue::Floating(day.and_hms(10, 0, 0)),
    );
    event.base.uid = uid.to_string();
    event.base.organizer = Some(Person::new("Alice", ALICE));
    event.base.add_attendee(Attendee::new("Alice", ALICE).with_status(PartStat::Accepted));
    event.base.add_attendee(Attendee::new("Bob", BOB).with_rsvp(true));
    Incidence::Event(event)
}

/// Keeps every message it is asked to send
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(Vec<String>, String)>>,
}

impl Outbox {
    pub fn sent(&self) -> Vec<(Vec<String>, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// The last message sent, if any
    pub fn last(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, message)| message.clone())
    }
}

#[async_trait]
impl MailTransport for Outbox {
    async fn send(&self, recipients: &[String], message: &str) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((recipients.to_vec(), message.to_string()));
        Ok(())
    }
}

/// A free/busy server that knows a fixed set of people
pub struct Directory {
    known: Vec<FreeBusy>,
}

impl Directory {
    /// Alice is busy [10:00, 11:00), Bob is busy [10:30, 11:30). Nobody else is known.
    pub fn alice_and_bob() -> Self {
        Self {
            known: vec![
                FreeBusy::new(ALICE, at(0, 0), at(23, 0), vec![Period::new(at(10, 0), at(11, 0))]),
                FreeBusy::new(BOB, at(0, 0), at(23, 0), vec![Period::new(at(10, 30), at(11, 30))]),
            ],
        }
    }
}

#[async_trait]
impl FreeBusySource for Directory {
    async fn fetch_free_busy(&self, email: &str) -> Result<FreeBusy, FetchError> {
        self.known.iter()
            .find(|fb| fb.owner == email)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(email.to_string()))
    }
}

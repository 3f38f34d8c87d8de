//! This crate provides the building blocks of groupware scheduling.
//!
//! It reads and writes iCalendar data in the [`ical`] module, and wraps it into iTIP scheduling messages in the [`itip`] module. \
//! A [`Scheduler`](scheduler::Scheduler) sends these messages, and applies the ones it receives to a [`PersistentStore`](traits::PersistentStore).
//!
//! Free/busy information of other people can be fetched over HTTP by a [`Client`](client::Client), and kept in a local [`FreeBusyCache`](cache::FreeBusyCache). \
//! Once everyone's free/busy information is known, the [`SlotFinder`](slot_finder::SlotFinder) looks for a time slot that suits everybody.

pub mod traits;
pub mod error;

pub mod datetime;
pub mod attendee;
pub use attendee::{Attendee, PartStat, Person, Role};
pub mod alarm;
pub use alarm::Alarm;
pub mod recurrence;
pub use recurrence::RecurrenceRule;
pub mod incidence;
pub use incidence::{Event, Incidence, Journal, Todo};
pub mod relations;

pub mod ical;
pub use ical::{decode, encode};
pub mod itip;
pub use itip::{classify, create_schedule_message, parse_schedule_message, Method, ScheduleMessage, ScheduleStatus};
pub mod freebusy;
pub use freebusy::{normalize, FreeBusy, Period};
pub mod slot_finder;
pub use slot_finder::{find_free_slot, SlotFinder, TimeSlot};

pub mod store;
pub use store::LocalStore;
pub mod cache;
pub mod resource;
pub mod client;
pub mod freebusy_manager;
pub mod publish;
pub mod scheduler;
pub use scheduler::Scheduler;

pub mod config;
pub mod utils;

//! Sending and applying iTIP transactions
//!
//! A [`Scheduler`] ties a [`PersistentStore`] and a [`MailTransport`] together:
//! * [`Scheduler::perform_transaction`] wraps a local incidence into a message and sends it to whoever it concerns,
//! * [`Scheduler::accept_transaction`] applies a received message to the store.

use crate::attendee::Attendee;
use crate::error::{SchedulerError, SendError};
use crate::incidence::Incidence;
use crate::itip::{create_schedule_message, parse_schedule_message, MessageMethod, Method, ScheduleMessage, ScheduleStatus};
use crate::traits::{MailTransport, PersistentStore};

/// What [`Scheduler::accept_transaction`] did with a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The incidence was added to the store
    Created,
    /// The incidence replaced an older revision
    Updated,
    /// The incidence was removed from the store
    Deleted,
    /// The status of the replying attendee was copied into the local incidence
    ReplyMerged,
    /// The latest revision was sent again to the attendee that asked for it
    RefreshAnswered,
    /// Nothing to do (obsolete revision, unknown incidence, or a counter-proposal the user has to decide on)
    Ignored,
}

pub struct Scheduler<S, M>
where
    S: PersistentStore,
    M: MailTransport,
{
    store: S,
    transport: M,
}

impl<S, M> Scheduler<S, M>
where
    S: PersistentStore + Send + Sync,
    M: MailTransport + Sync,
{
    pub fn new(store: S, transport: M) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &S { &self.store }
    pub fn store_mut(&mut self) -> &mut S { &mut self.store }
    pub fn transport(&self) -> &M { &self.transport }

    /// Sends `incidence` with the given `method`.
    ///
    /// Messages from the organizer (PUBLISH, REQUEST, ADD, CANCEL, DECLINECOUNTER) go to the attendees, the organizer excluded.
    /// Messages from an attendee (REPLY, REFRESH, COUNTER) go to the organizer.
    pub async fn perform_transaction(&self, incidence: &Incidence, method: Method) -> Result<(), SendError> {
        let recipients = recipients_of(incidence, method);
        self.send_to(&recipients, incidence, method).await
    }

    async fn send_to(&self, recipients: &[String], incidence: &Incidence, method: Method) -> Result<(), SendError> {
        if recipients.is_empty() {
            log::warn!("Nobody to send the {} message for {} to", method, incidence.uid());
            return Err(SendError::NoRecipients);
        }
        log::info!("Sending {} for {} to {:?}", method, incidence.uid(), recipients);
        let message = create_schedule_message(incidence, method);
        self.transport.send(recipients, &message).await
    }

    /// Parses a received payload, then applies it (see [`Self::accept_transaction`])
    pub async fn accept_text(&mut self, text: &str) -> Result<Applied, SchedulerError> {
        let message = parse_schedule_message(text)?;
        self.accept_transaction(message).await
    }

    /// Applies a received message to the store.
    ///
    /// Revisions are compared with [`classify`](crate::itip::classify): only messages newer than the local incidence are applied,
    /// apart from replies and refresh requests, which refer to the revision the organizer already has.
    pub async fn accept_transaction(&mut self, mut message: ScheduleMessage) -> Result<Applied, SchedulerError> {
        let method = match &message.method {
            MessageMethod::Known(method) => *method,
            MessageMethod::Unrecognized(raw) => return Err(SchedulerError::UnknownMethod(raw.clone())),
        };

        let uid = message.incidence.uid().to_string();
        let local = self.store.find_by_uid(&uid).await?;
        let status = message.classify_against(local.as_ref());
        log::debug!("Received {} for {}, classified as {:?}", method, uid, status);

        match method {
            Method::Publish | Method::Request | Method::Add => {
                match status {
                    ScheduleStatus::New => {
                        self.store.create(message.incidence).await?;
                        Ok(Applied::Created)
                    },
                    ScheduleStatus::Update => {
                        self.store.update(message.incidence).await?;
                        Ok(Applied::Updated)
                    },
                    _ => Ok(Applied::Ignored),
                }
            },
            Method::Cancel => {
                match status {
                    ScheduleStatus::Update => {
                        self.store.delete(&uid).await?;
                        Ok(Applied::Deleted)
                    },
                    _ => {
                        log::info!("Ignoring cancellation of {} ({:?})", uid, status);
                        Ok(Applied::Ignored)
                    },
                }
            },
            Method::Reply => {
                let local = match local {
                    Some(local) if message.incidence.sequence() >= local.sequence() => local,
                    _ => {
                        log::info!("Ignoring a reply for {}, which is unknown or outdated", uid);
                        return Ok(Applied::Ignored);
                    },
                };
                let merged = merge_reply(local, message.incidence.attendees());
                self.store.update(merged).await?;
                Ok(Applied::ReplyMerged)
            },
            Method::Refresh => {
                let local = match local {
                    Some(local) => local,
                    None => {
                        log::info!("Cannot answer a refresh request for unknown incidence {}", uid);
                        return Ok(Applied::Ignored);
                    },
                };
                let requesters: Vec<String> = message.incidence.attendees().iter()
                    .map(|a| a.email.clone())
                    .filter(|email| email.is_empty() == false)
                    .collect();
                self.send_to(&requesters, &local, Method::Request).await?;
                Ok(Applied::RefreshAnswered)
            },
            Method::Counter | Method::DeclineCounter => {
                log::info!("{} for {} is left to the user", method, uid);
                Ok(Applied::Ignored)
            },
        }
    }
}

/// Whom a message with the given method is meant for
pub fn recipients_of(incidence: &Incidence, method: Method) -> Vec<String> {
    let organizer = incidence.organizer().as_ref()
        .map(|o| o.email.trim().to_lowercase())
        .unwrap_or_default();

    match method {
        Method::Reply | Method::Refresh | Method::Counter => {
            if organizer.is_empty() {
                Vec::new()
            } else {
                vec![organizer]
            }
        },
        Method::Publish | Method::Request | Method::Add | Method::Cancel | Method::DeclineCounter => {
            let mut recipients: Vec<String> = Vec::new();
            for attendee in incidence.attendees() {
                let email = attendee.email.trim().to_lowercase();
                if email.is_empty() || email == organizer || recipients.contains(&email) {
                    continue;
                }
                recipients.push(email);
            }
            recipients
        },
    }
}

/// Copies the answers of `replying` into `local`. Attendees unknown to `local` (e.g. delegates) are added.
fn merge_reply(mut local: Incidence, replying: &[Attendee]) -> Incidence {
    for reply in replying {
        let merged = match local.attendees().iter().find(|a| a.is_same_person(reply)) {
            Some(existing) => Attendee {
                status: reply.status,
                delegate: reply.delegate.clone(),
                delegator: reply.delegator.clone(),
                ..existing.clone()
            },
            None => reply.clone(),
        };
        local.base_mut().add_attendee(merged);
    }
    local
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::attendee::{PartStat, Person};
    use crate::datetime::DateTimeValue;
    use crate::incidence::Event;
    use crate::store::LocalStore;

    /// Remembers every message instead of sending it
    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(Vec<String>, String)>>,
    }

    #[async_trait]
    impl MailTransport for Outbox {
        async fn send(&self, recipients: &[String], message: &str) -> Result<(), SendError> {
            self.sent.lock().unwrap().push((recipients.to_vec(), message.to_string()));
            Ok(())
        }
    }

    fn meeting() -> Incidence {
        let start = DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 0, 0));
        let end = DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, 1).and_hms(10, 0, 0));
        let mut event = Event::new("Planning", start, end);
        event.base.organizer = Some(Person::new("Alice", "alice@example.com"));
        event.base.add_attendee(Attendee::new("Alice", "Alice@example.com").with_status(PartStat::Accepted));
        event.base.add_attendee(Attendee::new("Bob", "bob@example.com").with_rsvp(true));
        event.base.add_attendee(Attendee::new("Carol", "carol@example.com").with_rsvp(true));
        Incidence::Event(event)
    }

    #[test]
    fn recipients() {
        let event = meeting();
        assert_eq!(recipients_of(&event, Method::Request), vec!["bob@example.com", "carol@example.com"]);
        assert_eq!(recipients_of(&event, Method::Cancel), vec!["bob@example.com", "carol@example.com"]);
        assert_eq!(recipients_of(&event, Method::Reply), vec!["alice@example.com"]);
        assert_eq!(recipients_of(&event, Method::Counter), vec!["alice@example.com"]);

        let mut lonely = event.clone();
        lonely.base_mut().clear_attendees();
        assert!(recipients_of(&lonely, Method::Request).is_empty());
    }

    #[tokio::test]
    async fn perform() {
        let _ = env_logger::builder().is_test(true).try_init();

        let scheduler = Scheduler::new(LocalStore::in_memory(), Outbox::default());
        let event = meeting();
        scheduler.perform_transaction(&event, Method::Request).await.unwrap();

        let sent = scheduler.transport().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec!["bob@example.com", "carol@example.com"]);
        assert!(sent[0].1.contains("METHOD:REQUEST"));

        let mut lonely = event.clone();
        lonely.base_mut().clear_attendees();
        assert_eq!(scheduler.perform_transaction(&lonely, Method::Request).await, Err(SendError::NoRecipients));
    }

    #[tokio::test]
    async fn accept() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut scheduler = Scheduler::new(LocalStore::in_memory(), Outbox::default());
        let event = meeting();
        let uid = event.uid().to_string();
        let request = |incidence: &Incidence| ScheduleMessage::new(incidence.clone(), MessageMethod::Known(Method::Request));

        assert_eq!(scheduler.accept_transaction(request(&event)).await.unwrap(), Applied::Created);
        assert_eq!(scheduler.accept_transaction(request(&event)).await.unwrap(), Applied::Ignored);

        let mut moved = event.clone();
        moved.base_mut().sequence = 1;
        moved.base_mut().location = "Room 2".to_string();
        assert_eq!(scheduler.accept_transaction(request(&moved)).await.unwrap(), Applied::Updated);
        assert_eq!(scheduler.store().find_by_uid(&uid).await.unwrap().unwrap().location(), "Room 2");

        // Bob accepts
        let mut reply = moved.clone();
        reply.base_mut().clear_attendees();
        reply.base_mut().add_attendee(Attendee::new("Bob", "bob@example.com").with_status(PartStat::Accepted));
        let reply = ScheduleMessage::new(reply, MessageMethod::Known(Method::Reply));
        assert_eq!(scheduler.accept_transaction(reply).await.unwrap(), Applied::ReplyMerged);
        let stored = scheduler.store().find_by_uid(&uid).await.unwrap().unwrap();
        assert_eq!(stored.attendees().len(), 3);
        assert_eq!(stored.base().attendee_by_email("bob@example.com").unwrap().status, PartStat::Accepted);
        assert_eq!(stored.base().attendee_by_email("bob@example.com").unwrap().rsvp, true);

        // Carol lost the invitation
        let mut refresh = moved.clone();
        refresh.base_mut().clear_attendees();
        refresh.base_mut().add_attendee(Attendee::new("Carol", "carol@example.com"));
        let refresh = ScheduleMessage::new(refresh, MessageMethod::Known(Method::Refresh));
        assert_eq!(scheduler.accept_transaction(refresh).await.unwrap(), Applied::RefreshAnswered);
        {
            let sent = scheduler.transport().sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, vec!["carol@example.com"]);
            assert!(sent[0].1.contains("Room 2"));
        }

        let mut cancelled = moved.clone();
        cancelled.base_mut().sequence = 2;
        let cancel = ScheduleMessage::new(cancelled, MessageMethod::Known(Method::Cancel));
        assert_eq!(scheduler.accept_transaction(cancel).await.unwrap(), Applied::Deleted);
        assert!(scheduler.store().is_empty());

        let unknown = ScheduleMessage::new(event, MessageMethod::Unrecognized("X-POKE".to_string()));
        assert!(matches!(scheduler.accept_transaction(unknown).await, Err(SchedulerError::UnknownMethod(_))));
    }
}

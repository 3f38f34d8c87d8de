//! The collaborators this crate talks to, but does not implement itself (apart from simple local versions)

use async_trait::async_trait;

use crate::error::{FetchError, SendError, StoreError};
use crate::freebusy::FreeBusy;
use crate::incidence::Incidence;

/// Where incidences are kept
#[async_trait]
pub trait PersistentStore {
    /// Returns the incidence with the given UID, if any
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Incidence>, StoreError>;
    /// Adds a new incidence. This fails if its UID is already used.
    async fn create(&mut self, incidence: Incidence) -> Result<(), StoreError>;
    /// Replaces the stored incidence that has the same UID.
    /// Implementations must refuse an incidence whose sequence is lower than the stored one.
    async fn update(&mut self, incidence: Incidence) -> Result<(), StoreError>;
    /// Removes an incidence, and returns it
    async fn delete(&mut self, uid: &str) -> Result<Incidence, StoreError>;
}

/// Something that delivers schedule messages (e.g. by email)
#[async_trait]
pub trait MailTransport {
    /// Send `message` (an iCalendar payload) to every address of `recipients`
    async fn send(&self, recipients: &[String], message: &str) -> Result<(), SendError>;
}

/// Something that knows the free/busy information of other people
#[async_trait]
pub trait FreeBusySource {
    async fn fetch_free_busy(&self, email: &str) -> Result<FreeBusy, FetchError>;
}

/// Somewhere our own free/busy information can be published
#[async_trait]
pub trait FreeBusyTarget {
    async fn publish_free_busy(&self, free_busy: &FreeBusy) -> Result<(), FetchError>;
}

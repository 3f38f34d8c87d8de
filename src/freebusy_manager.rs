//! Gathering the free/busy information of several people at once

use futures::future::join_all;

use crate::cache::FreeBusyCache;
use crate::freebusy::FreeBusy;
use crate::traits::FreeBusySource;

/// Fetches free/busy information from a source, and falls back to a local cache when the source fails.
///
/// Failures are not reported: someone whose information cannot be found is simply unknown (`None`),
/// which the [`SlotFinder`](crate::slot_finder::SlotFinder) treats as free.
pub struct FreeBusyManager<S>
where
    S: FreeBusySource,
{
    source: S,
    cache: Option<FreeBusyCache>,
}

impl<S> FreeBusyManager<S>
where
    S: FreeBusySource + Sync,
{
    pub fn new(source: S) -> Self {
        Self { source, cache: None }
    }

    /// Successful fetches will be saved into `cache`, and read back when the source fails
    pub fn with_cache(mut self, cache: FreeBusyCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The free/busy information of `email`, if it can be found anywhere
    pub async fn fetch(&self, email: &str) -> Option<FreeBusy> {
        match self.source.fetch_free_busy(email).await {
            Ok(free_busy) => {
                if let Some(cache) = &self.cache {
                    if let Err(err) = cache.save_as(email, &free_busy) {
                        log::warn!("Unable to cache free/busy of {}: {}", email, err);
                    }
                }
                Some(free_busy)
            },
            Err(err) => {
                log::warn!("Unable to fetch free/busy of {}: {}", email, err);
                self.cached(email)
            },
        }
    }

    fn cached(&self, email: &str) -> Option<FreeBusy> {
        let cache = self.cache.as_ref()?;
        match cache.load(email) {
            Ok(Some(free_busy)) => {
                log::info!("Using cached free/busy of {}", email);
                Some(free_busy)
            },
            Ok(None) => None,
            Err(err) => {
                log::warn!("Invalid cached free/busy for {}: {}", email, err);
                None
            },
        }
    }

    /// Fetches everyone concurrently. The results are in the same order as `emails`.
    pub async fn fetch_all<E: AsRef<str>>(&self, emails: &[E]) -> Vec<Option<FreeBusy>> {
        join_all(emails.iter().map(|email| self.fetch(email.as_ref()))).await
    }
}

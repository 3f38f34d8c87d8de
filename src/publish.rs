//! When to publish our own free/busy information
//!
//! Local edits often come in bursts. [`PublishThrottle`] coalesces them into a single publish once things settle down,
//! and keeps a failing server from being hammered.

use chrono::{DateTime, Duration, Utc};

use crate::config::{DEFAULT_PUBLISH_DELAY_SECS, DEFAULT_PUBLISH_RETRY_SECS};
use crate::error::FetchError;
use crate::freebusy::FreeBusy;
use crate::traits::FreeBusyTarget;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishPolicy {
    /// Publish only once no edit happened for this long
    pub delay: Duration,
    /// Minimum time between a failed publish and the next attempt
    pub retry_interval: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::seconds(DEFAULT_PUBLISH_DELAY_SECS),
            retry_interval: Duration::seconds(DEFAULT_PUBLISH_RETRY_SECS),
        }
    }
}

/// Keeps track of local edits and publish attempts. It holds no timer: callers tell it what time it is.
#[derive(Clone, Debug, Default)]
pub struct PublishThrottle {
    policy: PublishPolicy,
    last_edit: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

impl PublishThrottle {
    pub fn new(policy: PublishPolicy) -> Self {
        Self { policy, last_edit: None, last_failure: None }
    }

    /// Something changed locally, a publish will be needed
    pub fn record_edit(&mut self, now: DateTime<Utc>) {
        self.last_edit = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_edit.is_some()
    }

    /// When the pending publish may happen, if there is one
    pub fn next_attempt(&self) -> Option<DateTime<Utc>> {
        let after_edits = self.last_edit? + self.policy.delay;
        match self.last_failure {
            Some(failure) if failure + self.policy.retry_interval > after_edits => Some(failure + self.policy.retry_interval),
            _ => Some(after_edits),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt().map_or(false, |when| when <= now)
    }

    pub fn record_success(&mut self) {
        self.last_edit = None;
        self.last_failure = None;
    }

    /// The pending publish stays pending, but will not be retried before the retry interval elapsed
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.last_failure = Some(now);
    }

    /// Publishes `free_busy` to `target` if it is time to. Returns whether a publish happened.
    pub async fn publish_if_due<T>(&mut self, target: &T, free_busy: &FreeBusy, now: DateTime<Utc>) -> Result<bool, FetchError>
    where
        T: FreeBusyTarget + Sync,
    {
        if self.is_due(now) == false {
            return Ok(false);
        }
        match target.publish_free_busy(free_busy).await {
            Ok(()) => {
                self.record_success();
                Ok(true)
            },
            Err(err) => {
                log::warn!("Unable to publish free/busy of {}, will retry after {}: {}", free_busy.owner, now + self.policy.retry_interval, err);
                self.record_failure(now);
                Err(err)
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.ymd(2024, 3, 1).and_hms(12, 0, 0) + Duration::seconds(secs)
    }

    #[test]
    fn edits_are_coalesced() {
        let mut throttle = PublishThrottle::default();
        assert!(throttle.is_due(at(0)) == false);

        throttle.record_edit(at(0));
        throttle.record_edit(at(3));
        assert!(throttle.is_due(at(5)) == false);
        assert!(throttle.is_due(at(8)));

        throttle.record_success();
        assert!(throttle.is_pending() == false);
        assert!(throttle.is_due(at(100)) == false);
    }

    #[test]
    fn failures_are_not_retried_too_soon() {
        let mut throttle = PublishThrottle::new(PublishPolicy { delay: Duration::seconds(5), retry_interval: Duration::seconds(60) });
        throttle.record_edit(at(0));
        throttle.record_failure(at(5));
        assert!(throttle.is_due(at(30)) == false);
        throttle.record_edit(at(40));
        assert_eq!(throttle.next_attempt(), Some(at(65)));
        assert!(throttle.is_due(at(65)));
    }

    /// Fails the first time, and succeeds afterwards
    struct FlakyServer {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl FreeBusyTarget for FlakyServer {
        async fn publish_free_busy(&self, free_busy: &FreeBusy) -> Result<(), FetchError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Err(FetchError::Unavailable(free_busy.owner.clone()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn publishing() {
        let server = FlakyServer { calls: Mutex::new(0) };
        let fb = FreeBusy::new("me@example.com", at(0), at(3600), Vec::new());
        let mut throttle = PublishThrottle::default();

        assert_eq!(throttle.publish_if_due(&server, &fb, at(0)).await.unwrap(), false);
        throttle.record_edit(at(0));
        assert!(throttle.publish_if_due(&server, &fb, at(10)).await.is_err());
        assert_eq!(throttle.publish_if_due(&server, &fb, at(20)).await.unwrap(), false);
        assert_eq!(throttle.publish_if_due(&server, &fb, at(310)).await.unwrap(), true);
        assert!(throttle.is_pending() == false);
        assert_eq!(*server.calls.lock().unwrap(), 2);
    }
}

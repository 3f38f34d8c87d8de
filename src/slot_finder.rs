//! Finding a time slot everyone is free for

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SLOT_HORIZON_DAYS;
use crate::freebusy::FreeBusy;

/// A time range `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Negative durations read as zero
    pub fn duration(&self) -> Duration {
        let duration = self.end - self.start;
        if duration < Duration::zero() {
            Duration::zero()
        } else {
            duration
        }
    }
}

/// The outcome of a slot search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSearch {
    Found(TimeSlot),
    /// Nobody is free for long enough before `horizon`
    NoFreeSlot { horizon: DateTime<Utc> },
}

impl SlotSearch {
    pub fn slot(&self) -> Option<TimeSlot> {
        match self {
            SlotSearch::Found(slot) => Some(*slot),
            SlotSearch::NoFreeSlot { .. } => None,
        }
    }
}

/// Searches forward in time for a slot that does not overlap anybody's busy periods
#[derive(Clone, Debug)]
pub struct SlotFinder {
    horizon: Duration,
}

impl Default for SlotFinder {
    fn default() -> Self {
        Self { horizon: Duration::days(DEFAULT_SLOT_HORIZON_DAYS) }
    }
}

impl SlotFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// How far past the requested start a slot may begin
    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    /// Returns the earliest slot as long as `proposed` that starts no earlier than `proposed` nor `now`,
    /// and that overlaps no busy period of any attendee.
    ///
    /// Attendees we know nothing about (`None`) are considered free. A `proposed` slot that is already free is returned unchanged.
    pub fn find(&self, proposed: TimeSlot, attendees: &[Option<&FreeBusy>], now: DateTime<Utc>) -> SlotSearch {
        let duration = proposed.duration();
        let horizon = proposed.start.checked_add_signed(self.horizon).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut from = if proposed.start < now { now } else { proposed.start };

        'scan: loop {
            let to = match from.checked_add_signed(duration) {
                Some(to) if from <= horizon => to,
                _ => {
                    log::debug!("No free slot of {} minutes before {}", duration.num_minutes(), horizon);
                    return SlotSearch::NoFreeSlot { horizon };
                },
            };

            // A single conflict invalidates every attendee checked so far
            for free_busy in attendees.iter().flatten() {
                if let Some(busy) = free_busy.first_conflict(from, to) {
                    log::debug!("{} is busy from {} to {}", free_busy.owner, busy.start, busy.end);
                    from = busy.end;
                    continue 'scan;
                }
            }

            return SlotSearch::Found(TimeSlot::new(from, to));
        }
    }
}

/// Same as [`SlotFinder::find`], with the default horizon
pub fn find_free_slot(proposed: TimeSlot, attendees: &[Option<&FreeBusy>], now: DateTime<Utc>) -> SlotSearch {
    SlotFinder::default().find(proposed, attendees, now)
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::freebusy::Period;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.ymd(2024, 3, 1).and_hms(h, m, 0)
    }

    fn busy(owner: &str, periods: &[(DateTime<Utc>, DateTime<Utc>)]) -> FreeBusy {
        let periods = periods.iter().map(|(s, e)| Period::new(*s, *e)).collect();
        FreeBusy::new(owner, at(0, 0), at(23, 59), periods)
    }

    #[test]
    fn overlapping_attendees() {
        let a = busy("a@example.com", &[(at(10, 0), at(11, 0))]);
        let b = busy("b@example.com", &[(at(10, 30), at(11, 30))]);
        let found = find_free_slot(TimeSlot::new(at(10, 0), at(11, 0)), &[Some(&a), Some(&b)], at(8, 0));
        assert_eq!(found, SlotSearch::Found(TimeSlot::new(at(11, 30), at(12, 30))));
    }

    #[test]
    fn free_proposals_are_kept() {
        let a = busy("a@example.com", &[(at(9, 0), at(10, 0)), (at(11, 0), at(12, 0))]);
        let proposed = TimeSlot::new(at(10, 0), at(11, 0));
        assert_eq!(find_free_slot(proposed, &[Some(&a), None], at(8, 0)), SlotSearch::Found(proposed));
    }

    #[test]
    fn later_conflicts_restart_the_scan() {
        // Moving past b lands inside a's second period, which must be checked again
        let a = busy("a@example.com", &[(at(10, 0), at(10, 30)), (at(11, 0), at(12, 0))]);
        let b = busy("b@example.com", &[(at(10, 30), at(11, 0))]);
        let found = find_free_slot(TimeSlot::new(at(10, 0), at(10, 30)), &[Some(&a), Some(&b)], at(8, 0));
        assert_eq!(found.slot(), Some(TimeSlot::new(at(12, 0), at(12, 30))));
    }

    #[test]
    fn never_before_now() {
        let found = find_free_slot(TimeSlot::new(at(8, 0), at(9, 0)), &[None], at(8, 20));
        assert_eq!(found.slot(), Some(TimeSlot::new(at(8, 20), at(9, 20))));
    }

    #[test]
    fn horizon() {
        let a = busy("a@example.com", &[(at(10, 0), at(20, 0))]);
        let finder = SlotFinder::new().with_horizon(Duration::hours(4));
        let found = finder.find(TimeSlot::new(at(10, 0), at(11, 0)), &[Some(&a)], at(8, 0));
        assert_eq!(found, SlotSearch::NoFreeSlot { horizon: at(14, 0) });

        let everyone_busy = FreeBusy::new("b@example.com", at(0, 0), at(0, 0), vec![
            Period::new(at(0, 0), Utc.ymd(2030, 1, 1).and_hms(0, 0, 0)),
        ]);
        let found = find_free_slot(TimeSlot::new(at(10, 0), at(11, 0)), &[Some(&everyone_busy)], at(8, 0));
        assert!(matches!(found, SlotSearch::NoFreeSlot { .. }));
    }

    #[test]
    fn found_slots_avoid_every_busy_period() {
        let cases: Vec<(&str, Vec<(DateTime<Utc>, DateTime<Utc>)>, Option<DateTime<Utc>>)> = vec![
            ("empty", vec![], Some(at(10, 0))),
            ("single", vec![(at(10, 0), at(11, 0))], Some(at(11, 0))),
            ("contained", vec![(at(9, 0), at(17, 0)), (at(10, 0), at(11, 0))], Some(at(17, 0))),
            ("containing", vec![(at(10, 15), at(10, 30))], Some(at(10, 30))),
            ("touching", vec![(at(10, 0), at(10, 30)), (at(10, 30), at(11, 0))], Some(at(11, 0))),
            ("gap too short", vec![(at(10, 0), at(11, 0)), (at(11, 30), at(12, 0))], Some(at(12, 0))),
            ("unsorted", vec![(at(13, 0), at(14, 0)), (at(10, 0), at(12, 30))], Some(at(14, 0))),
            ("before", vec![(at(8, 0), at(10, 0))], Some(at(10, 0))),
            ("after", vec![(at(11, 0), at(12, 0))], Some(at(10, 0))),
            ("zero length", vec![(at(10, 30), at(10, 30))], Some(at(10, 0))),
        ];

        for (name, periods, expected_start) in cases {
            let fb = busy("a@example.com", &periods);
            let proposed = TimeSlot::new(at(10, 0), at(11, 0));
            let found = find_free_slot(proposed, &[Some(&fb), None], at(8, 0));
            assert_eq!(found.slot().map(|s| s.start), expected_start, "{}", name);

            let slot = found.slot().unwrap();
            assert_eq!(slot.duration(), proposed.duration(), "{}", name);
            assert!(slot.start >= proposed.start, "{}", name);
            for (start, end) in &periods {
                assert!(Period::new(*start, *end).overlaps(slot.start, slot.end) == false, "{} overlaps {}-{}", name, start, end);
            }
        }
    }

    #[test]
    fn slots_near_the_end_of_time() {
        let proposed = TimeSlot::new(DateTime::<Utc>::MAX_UTC - Duration::minutes(30), DateTime::<Utc>::MAX_UTC);
        assert_eq!(find_free_slot(proposed, &[None], at(8, 0)).slot(), Some(proposed));

        let fb = FreeBusy::new("a@example.com", at(0, 0), at(0, 0), vec![
            Period::new(DateTime::<Utc>::MAX_UTC - Duration::minutes(30), DateTime::<Utc>::MAX_UTC - Duration::minutes(10)),
        ]);
        let found = find_free_slot(proposed, &[Some(&fb)], at(8, 0));
        assert_eq!(found, SlotSearch::NoFreeSlot { horizon: DateTime::<Utc>::MAX_UTC });
    }

    #[test]
    fn negative_durations_read_as_zero() {
        let found = find_free_slot(TimeSlot::new(at(10, 0), at(9, 0)), &[], at(8, 0));
        assert_eq!(found.slot(), Some(TimeSlot::new(at(10, 0), at(10, 0))));
    }
}

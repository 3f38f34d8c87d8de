//! Free/busy information: the busy periods of someone, without the details of their calendar

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::incidence::{Incidence, Transparency};

/// A busy time range `[start, end)`, optionally annotated
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: Option<String>,
    pub location: Option<String>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, summary: None, location: None }
    }

    pub fn with_summary<S: ToString>(mut self, summary: S) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_location<S: ToString>(mut self, location: S) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap test: touching ranges do not overlap
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && from < self.end
    }
}

/// Sorts busy periods and merges the ones that overlap or touch.
///
/// Empty and inverted periods are dropped. When periods are merged, the annotations of the earliest one are kept.
/// Running this function on its own output returns it unchanged.
pub fn normalize(mut periods: Vec<Period>) -> Vec<Period> {
    periods.retain(|p| p.start < p.end);
    periods.sort_by_key(|p| p.start);

    let mut merged: Vec<Period> = Vec::with_capacity(periods.len());
    for period in periods {
        match merged.last_mut() {
            Some(last) if period.start <= last.end => {
                if period.end > last.end {
                    last.end = period.end;
                }
            },
            _ => merged.push(period),
        }
    }
    merged
}

/// The busy periods of `owner` within `[start, end)`.
///
/// Periods are always normalized (see [`normalize`]). They are set at construction and cannot be edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBusy {
    pub owner: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    periods: Vec<Period>,
}

impl FreeBusy {
    pub fn new<S: ToString>(owner: S, start: DateTime<Utc>, end: DateTime<Utc>, periods: Vec<Period>) -> Self {
        Self {
            owner: owner.to_string(),
            start,
            end,
            periods: normalize(periods),
        }
    }

    /// Build the free/busy information of `owner` from their incidences.
    ///
    /// Every occurrence of an opaque event that overlaps `[start, end)` is busy time.
    /// To-dos, journals and transparent events are ignored. Floating and all-day times are read in `viewer_zone`.
    pub fn from_incidences<S: ToString>(owner: S, incidences: &[Incidence], start: DateTime<Utc>, end: DateTime<Utc>, viewer_zone: Tz) -> Self {
        let mut periods = Vec::new();

        for incidence in incidences {
            let event = match incidence {
                Incidence::Event(e) if e.transparency == Transparency::Opaque => e,
                _ => continue,
            };
            let length = event.dtend.to_utc(viewer_zone) - event.dtstart.to_utc(viewer_zone);

            let starts = match &event.base.recurrence {
                None => vec![event.dtstart.naive_local()],
                // Wall-clock times can be a day ahead of UTC at most
                Some(rule) => {
                    let window_end = end.naive_utc().checked_add_signed(Duration::days(1)).unwrap_or_else(|| end.naive_utc());
                    rule.occurrences(event.dtstart.naive_local(), window_end)
                },
            };

            for occurrence in starts {
                let busy_from = event.dtstart.with_naive(occurrence).to_utc(viewer_zone);
                let busy_to = match busy_from.checked_add_signed(length) {
                    Some(t) => t,
                    None => continue,
                };
                let mut period = Period::new(busy_from, busy_to);
                if period.overlaps(start, end) == false {
                    continue;
                }
                if event.base.summary.is_empty() == false {
                    period.summary = Some(event.base.summary.clone());
                }
                if event.base.location.is_empty() == false {
                    period.location = Some(event.base.location.clone());
                }
                periods.push(period);
            }
        }

        log::debug!("Computed {} busy period(s) for {}", periods.len(), owner.to_string());
        Self::new(owner, start, end, periods)
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// The first busy period that overlaps `[from, to)`
    pub fn first_conflict(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<&Period> {
        self.periods.iter()
            .take_while(|p| p.start < to)
            .find(|p| p.overlaps(from, to))
    }

    pub fn is_free(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.first_conflict(from, to).is_none()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use crate::datetime::DateTimeValue;
    use crate::incidence::Event;
    use crate::recurrence::{Frequency, RecurrenceRule, Termination};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.ymd(2024, 3, 1).and_hms(h, m, 0)
    }

    #[test]
    fn normalization() {
        let periods = vec![
            Period::new(at(14, 0), at(15, 0)),
            Period::new(at(10, 30), at(11, 30)).with_summary("Second"),
            Period::new(at(10, 0), at(11, 0)).with_summary("First"),
            Period::new(at(11, 30), at(12, 0)),
            Period::new(at(16, 0), at(16, 0)),
            Period::new(at(18, 0), at(17, 0)),
        ];
        let normalized = normalize(periods);
        assert_eq!(normalized, vec![
            Period::new(at(10, 0), at(12, 0)).with_summary("First"),
            Period::new(at(14, 0), at(15, 0)),
        ]);
        assert_eq!(normalize(normalized.clone()), normalized);
    }

    #[test]
    fn contained_periods_do_not_shrink() {
        let normalized = normalize(vec![Period::new(at(9, 0), at(17, 0)), Period::new(at(10, 0), at(11, 0))]);
        assert_eq!(normalized, vec![Period::new(at(9, 0), at(17, 0))]);
    }

    #[test]
    fn normalization_edge_cases() {
        let cases: Vec<(&str, Vec<(DateTime<Utc>, DateTime<Utc>)>, Vec<(DateTime<Utc>, DateTime<Utc>)>)> = vec![
            ("empty", vec![], vec![]),
            ("single", vec![(at(10, 0), at(11, 0))], vec![(at(10, 0), at(11, 0))]),
            ("only degenerate", vec![(at(10, 0), at(10, 0)), (at(12, 0), at(11, 0))], vec![]),
            ("fully contained", vec![(at(10, 0), at(11, 0)), (at(9, 0), at(12, 0))], vec![(at(9, 0), at(12, 0))]),
            ("identical", vec![(at(10, 0), at(11, 0)), (at(10, 0), at(11, 0))], vec![(at(10, 0), at(11, 0))]),
            ("touching", vec![(at(11, 0), at(12, 0)), (at(10, 0), at(11, 0))], vec![(at(10, 0), at(12, 0))]),
            ("chained", vec![(at(10, 0), at(11, 0)), (at(12, 0), at(13, 0)), (at(10, 30), at(12, 30))], vec![(at(10, 0), at(13, 0))]),
            ("disjoint", vec![(at(14, 0), at(15, 0)), (at(9, 0), at(10, 0))], vec![(at(9, 0), at(10, 0)), (at(14, 0), at(15, 0))]),
        ];

        for (name, input, expected) in cases {
            let input: Vec<Period> = input.into_iter().map(|(s, e)| Period::new(s, e)).collect();
            let normalized = normalize(input.clone());
            let bounds: Vec<_> = normalized.iter().map(|p| (p.start, p.end)).collect();
            assert_eq!(bounds, expected, "{}", name);
            assert_eq!(normalize(normalized.clone()), normalized, "{} is not stable", name);

            for pair in normalized.windows(2) {
                assert!(pair[0].end < pair[1].start, "{} left touching periods", name);
            }
            // No busy time is lost
            for period in input.iter().filter(|p| p.start < p.end) {
                assert!(normalized.iter().any(|n| n.start <= period.start && period.end <= n.end), "{} lost {:?}", name, period);
            }
        }
    }

    #[test]
    fn conflicts_are_half_open() {
        let fb = FreeBusy::new("a@example.com", at(0, 0), at(23, 0), vec![Period::new(at(10, 0), at(11, 0))]);
        assert!(fb.is_free(at(11, 0), at(12, 0)));
        assert!(fb.is_free(at(9, 0), at(10, 0)));
        assert_eq!(fb.first_conflict(at(10, 59), at(11, 30)).map(|p| p.end), Some(at(11, 0)));
    }

    #[test]
    fn generated_from_events() {
        let floating = |d: u32, h: u32| DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, d).and_hms(h, 0, 0));

        let mut standup = Event::new("Standup", floating(1, 9), floating(1, 10));
        standup.base.location = "Room 4".to_string();
        standup.base.recurrence = Some(RecurrenceRule::new(Frequency::Daily).terminating(Termination::Count(3)));
        let mut lunch = Event::new("Lunch", floating(2, 12), floating(2, 13));
        lunch.transparency = Transparency::Transparent;
        let outside = Event::new("Later", floating(10, 12), floating(10, 13));

        let incidences = vec![Incidence::Event(standup), Incidence::Event(lunch), Incidence::Event(outside)];
        let fb = FreeBusy::from_incidences(
            "me@example.com", &incidences,
            Utc.ymd(2024, 3, 1).and_hms(0, 0, 0), Utc.ymd(2024, 3, 5).and_hms(0, 0, 0),
            chrono_tz::UTC,
        );

        let starts: Vec<_> = fb.periods().iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![
            Utc.ymd(2024, 3, 1).and_hms(9, 0, 0),
            Utc.ymd(2024, 3, 2).and_hms(9, 0, 0),
            Utc.ymd(2024, 3, 3).and_hms(9, 0, 0),
        ]);
        assert_eq!(fb.periods()[0].location.as_deref(), Some("Room 4"));
        assert_eq!(fb.periods()[0].duration(), Duration::hours(1));
    }

    #[test]
    fn sparse_recurrences() {
        let floating = DateTimeValue::Floating(NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 0, 0));
        let mut rare = Event::new("Rare", floating.clone(), floating.shifted_by(Duration::hours(1)).unwrap());
        rare.base.recurrence = Some(RecurrenceRule::new(Frequency::Daily).every(4_000_000_000));

        let fb = FreeBusy::from_incidences(
            "me@example.com", &[Incidence::Event(rare)],
            Utc.ymd(2024, 1, 1).and_hms(0, 0, 0), Utc.ymd(9999, 1, 1).and_hms(0, 0, 0),
            chrono_tz::UTC,
        );
        assert_eq!(fb.periods().len(), 1);
        assert_eq!(fb.periods()[0].start, at(9, 0));
    }
}

//! Timestamps stamped onto documents.
//!
//! Stored timestamps are RFC 3339 UTC strings with microsecond precision.
//! [`TimestampClock`] never hands out the same stamp twice.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

/// Parse an RFC 3339 timestamp in any offset into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Render a timestamp in the canonical stored form
/// (`2024-05-01T12:00:00.000000Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Monotonic source of document timestamps.
///
/// Wall-clock time at microsecond resolution, bumped by one microsecond
/// whenever it would not be strictly after the previous value handed out.
/// Safe for concurrent use via an internal [`Mutex`].
#[derive(Debug, Default)]
pub struct TimestampClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl TimestampClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp, strictly greater than every earlier one from this clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.next_after(None)
    }

    /// Next timestamp, also strictly greater than `previous` when it parses.
    ///
    /// Used when refreshing `updated_at`, so the new value always sorts after
    /// the one it replaces even if that was written by an earlier process
    /// with a clock running ahead.
    pub fn now_after(&self, previous: Option<&str>) -> DateTime<Utc> {
        self.next_after(previous.and_then(parse_timestamp))
    }

    /// [`now`](Self::now) rendered in stored form.
    pub fn stamp(&self) -> String {
        format_timestamp(&self.now())
    }

    fn next_after(&self, floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let mut last = self.last.lock().expect("clock mutex poisoned");
        let mut next = Utc::now().trunc_subsecs(6);
        for bound in [*last, floor].into_iter().flatten() {
            let bound = bound.trunc_subsecs(6);
            if next <= bound {
                next = bound + Duration::microseconds(1);
            }
        }
        *last = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let clock = TimestampClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn now_after_future_value() {
        let clock = TimestampClock::new();
        let future = "2999-01-01T00:00:00.000000Z";
        let next = clock.now_after(Some(future));
        assert_eq!(format_timestamp(&next), "2999-01-01T00:00:00.000001Z");
    }

    #[test]
    fn now_after_garbage_is_ignored() {
        let clock = TimestampClock::new();
        let next = clock.now_after(Some("yesterday"));
        assert!(next <= Utc::now() + Duration::seconds(1));
    }

    #[test]
    fn stamp_format() {
        let stamp = TimestampClock::new().stamp();
        assert!(stamp.ends_with('Z'));
        // 2024-05-01T12:00:00.000000Z
        assert_eq!(stamp.len(), 27);
        assert!(parse_timestamp(&stamp).is_some());
    }

    #[test]
    fn parse_converts_offsets_to_utc() {
        let ts = parse_timestamp("2024-05-01T14:00:00+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-05-01T12:00:00.000000Z");
    }
}

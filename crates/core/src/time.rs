use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests and doc examples (2025-01-15T10:40:00Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_736_937_600;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

/// Formats a second count as `mm:ss`, or `hh:mm:ss` once it crosses an hour.
///
/// Negative or non-finite input renders as `00:00`.
#[must_use]
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Formats a cumulative duration as `XhYm`, the dashboard's "total time"
/// rendering. Sub-minute remainders round to the nearest minute.
#[must_use]
pub fn format_hours_minutes(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    #[allow(clippy::cast_precision_loss)]
    let total_minutes = (seconds as f64 / 60.0).round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total_minutes = total_minutes as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    format!("{hours}h {minutes}m")
}

/// Parses the `XhYm` rendering back into a duration.
///
/// The stored form is minute-granular, so this is the exact inverse of
/// [`format_hours_minutes`] up to that granularity. Returns `None` for
/// anything that does not look like `XhYm`.
#[must_use]
pub fn parse_hours_minutes(raw: &str) -> Option<Duration> {
    let rest = raw.trim();
    let (hours, rest) = rest.split_once('h')?;
    let minutes = rest.trim().strip_suffix('m')?;
    let hours: i64 = hours.trim().parse().ok()?;
    let minutes: i64 = minutes.trim().parse().ok()?;
    if hours < 0 || !(0..60).contains(&minutes) {
        return None;
    }
    Some(Duration::minutes(hours * 60 + minutes))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let mut clock = fixed_clock();
        let start = clock.now();
        clock.advance(Duration::seconds(20));
        assert_eq!(clock.now() - start, Duration::seconds(20));
    }

    #[test]
    fn format_clock_handles_minutes_and_hours() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(35.4), "00:35");
        assert_eq!(format_clock(605.0), "10:05");
        assert_eq!(format_clock(3_725.0), "01:02:05");
    }

    #[test]
    fn format_clock_rejects_bad_input() {
        assert_eq!(format_clock(-3.0), "00:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
    }

    #[test]
    fn hours_minutes_round_trips() {
        let duration = Duration::minutes(125);
        let rendered = format_hours_minutes(duration);
        assert_eq!(rendered, "2h 5m");
        assert_eq!(parse_hours_minutes(&rendered), Some(duration));

        assert_eq!(format_hours_minutes(Duration::zero()), "0h 0m");
        assert_eq!(parse_hours_minutes("0h 0m"), Some(Duration::zero()));
    }

    #[test]
    fn format_hours_minutes_rounds_seconds() {
        assert_eq!(format_hours_minutes(Duration::seconds(89)), "0h 1m");
        assert_eq!(format_hours_minutes(Duration::seconds(30)), "0h 1m");
        assert_eq!(format_hours_minutes(Duration::seconds(29)), "0h 0m");
    }

    #[test]
    fn parse_hours_minutes_rejects_garbage() {
        assert_eq!(parse_hours_minutes(""), None);
        assert_eq!(parse_hours_minutes("five minutes"), None);
        assert_eq!(parse_hours_minutes("1h 75m"), None);
    }
}

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Share of session wall-clock time accounted for by recorded per-slide time,
/// as a whole percentage clamped to `[0, 100]`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Engagement(u8);

impl Engagement {
    pub const ZERO: Engagement = Engagement(0);
    pub const MAX: Engagement = Engagement(100);

    /// Creates an engagement percentage, clamping to 100.
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Returns the percentage value.
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Computes engagement from recorded slide time against the session's
    /// wall-clock span: `min(100, round(spent / span * 100))`.
    ///
    /// An empty or negative span yields zero, matching the store's behavior
    /// for degenerate sessions.
    #[must_use]
    pub fn from_timings(time_spent: Duration, wall_clock: Duration) -> Self {
        let span_ms = wall_clock.num_milliseconds();
        if span_ms <= 0 {
            return Self::ZERO;
        }
        let spent_ms = time_spent.num_milliseconds().max(0);
        #[allow(clippy::cast_precision_loss)]
        let percent = (spent_ms as f64 / span_ms as f64 * 100.0).round();
        if percent >= 100.0 {
            return Self::MAX;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = percent as u8;
        Self(percent)
    }

    /// Rounded mean over a set of engagement values; zero when empty.
    #[must_use]
    pub fn mean<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Engagement>,
    {
        let mut total = 0_u64;
        let mut count = 0_u64;
        for value in values {
            total += u64::from(value.value());
            count += 1;
        }
        if count == 0 {
            return Self::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = (total as f64 / count as f64).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mean = mean as u8;
        Self::new(mean)
    }
}

impl fmt::Display for Engagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_100() {
        assert_eq!(Engagement::new(250).value(), 100);
        assert_eq!(Engagement::new(42).value(), 42);
    }

    #[test]
    fn from_timings_matches_ratio() {
        let engagement =
            Engagement::from_timings(Duration::milliseconds(35_000), Duration::seconds(35));
        assert_eq!(engagement, Engagement::MAX);

        let half = Engagement::from_timings(Duration::seconds(10), Duration::seconds(20));
        assert_eq!(half.value(), 50);
    }

    #[test]
    fn from_timings_rounds_to_nearest_percent() {
        // 333 / 1000 => 33.3 => 33
        let low = Engagement::from_timings(Duration::milliseconds(333), Duration::seconds(1));
        assert_eq!(low.value(), 33);

        // 335 / 1000 => 33.5 => 34
        let high = Engagement::from_timings(Duration::milliseconds(335), Duration::seconds(1));
        assert_eq!(high.value(), 34);
    }

    #[test]
    fn from_timings_clamps_overcounted_slides() {
        // Repeat visits can record more slide time than the wall clock span.
        let engagement = Engagement::from_timings(Duration::seconds(90), Duration::seconds(60));
        assert_eq!(engagement, Engagement::MAX);
    }

    #[test]
    fn from_timings_is_zero_for_empty_span() {
        assert_eq!(
            Engagement::from_timings(Duration::seconds(5), Duration::zero()),
            Engagement::ZERO
        );
        assert_eq!(
            Engagement::from_timings(Duration::seconds(5), Duration::seconds(-1)),
            Engagement::ZERO
        );
    }

    #[test]
    fn mean_rounds_and_handles_empty() {
        assert_eq!(Engagement::mean([]), Engagement::ZERO);

        let values = [Engagement::new(60), Engagement::new(71)];
        assert_eq!(Engagement::mean(values).value(), 66);
    }
}

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use medrep_core::model::{SessionId, SlideId, SlideTiming};

use crate::error::SessionError;

/// Viewer-side lifecycle of a running presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Presenting,
    Paused,
    Ended,
}

/// Client-side dwell-time accumulator for one session.
///
/// Created presenting on the first slide. Navigation banks the elapsed time
/// of the slide being left into a per-slide accumulator (repeat visits
/// sum); pausing banks the current slide and stops the clock without
/// touching the store. `finish` drains the accumulator into the timings
/// submitted at session end.
///
/// All methods take `now` from the caller's clock, so timing is exact and
/// deterministic under test.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    session_id: SessionId,
    slides: Vec<SlideId>,
    current: usize,
    state: RecorderState,
    slide_started_at: Option<DateTime<Utc>>,
    accumulated: HashMap<SlideId, Duration>,
}

impl SessionRecorder {
    /// Starts recording on the first slide at `started_at`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSlides` for an empty deck.
    pub fn new(
        session_id: SessionId,
        slides: Vec<SlideId>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if slides.is_empty() {
            return Err(SessionError::NoSlides);
        }

        Ok(Self {
            session_id,
            slides,
            current: 0,
            state: RecorderState::Presenting,
            slide_started_at: Some(started_at),
            accumulated: HashMap::new(),
        })
    }

    // Accessors
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn state(&self) -> RecorderState {
        self.state
    }

    #[must_use]
    pub fn is_presenting(&self) -> bool {
        self.state == RecorderState::Presenting
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state == RecorderState::Ended
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_slide(&self) -> &SlideId {
        &self.slides[self.current]
    }

    #[must_use]
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Time banked so far for one slide. In-flight time on the current
    /// slide is not included until it is banked by a navigation, pause or
    /// finish.
    #[must_use]
    pub fn time_on(&self, slide_id: &SlideId) -> Duration {
        self.accumulated
            .get(slide_id)
            .copied()
            .unwrap_or_else(Duration::zero)
    }

    /// Total banked time across all slides.
    #[must_use]
    pub fn total_recorded(&self) -> Duration {
        self.accumulated
            .values()
            .fold(Duration::zero(), |acc, d| acc + *d)
    }

    fn bank_current(&mut self, now: DateTime<Utc>) {
        let Some(since) = self.slide_started_at.take() else {
            return;
        };
        let elapsed = now - since;
        if elapsed <= Duration::zero() {
            return;
        }
        let slide_id = self.slides[self.current].clone();
        let banked = self
            .accumulated
            .entry(slide_id)
            .or_insert_with(Duration::zero);
        *banked = *banked + elapsed;
    }

    /// Stops the slide clock, banking the current slide. Purely local; the
    /// store is not touched. Pausing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` after `finish`.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            RecorderState::Ended => Err(SessionError::AlreadyEnded),
            RecorderState::Paused => Ok(()),
            RecorderState::Presenting => {
                self.bank_current(now);
                self.state = RecorderState::Paused;
                Ok(())
            }
        }
    }

    /// Restarts the slide clock on the current slide. Resuming while
    /// already presenting is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` after `finish`.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            RecorderState::Ended => Err(SessionError::AlreadyEnded),
            RecorderState::Presenting => Ok(()),
            RecorderState::Paused => {
                self.slide_started_at = Some(now);
                self.state = RecorderState::Presenting;
                Ok(())
            }
        }
    }

    /// Jumps to an arbitrary slide, banking the one being left.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` after `finish` and
    /// `SessionError::SlideOutOfRange` for a bad index.
    pub fn goto(&mut self, index: usize, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.state == RecorderState::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        if index >= self.slides.len() {
            return Err(SessionError::SlideOutOfRange {
                index,
                count: self.slides.len(),
            });
        }

        self.bank_current(now);
        self.current = index;
        if self.state == RecorderState::Presenting {
            self.slide_started_at = Some(now);
        }
        Ok(())
    }

    /// Advances one slide. Returns `false`, without banking, when already
    /// on the last slide.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` after `finish`.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        if self.state == RecorderState::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        if self.current + 1 >= self.slides.len() {
            return Ok(false);
        }
        self.goto(self.current + 1, now)?;
        Ok(true)
    }

    /// Steps back one slide. Returns `false`, without banking, when already
    /// on the first slide.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` after `finish`.
    pub fn prev(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        if self.state == RecorderState::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        if self.current == 0 {
            return Ok(false);
        }
        self.goto(self.current - 1, now)?;
        Ok(true)
    }

    /// Banks the current slide and drains the accumulator into the timings
    /// to submit, in deck order. Slides that were never dwelt on are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` on a second finish.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<Vec<SlideTiming>, SessionError> {
        if self.state == RecorderState::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        self.bank_current(now);
        self.state = RecorderState::Ended;

        let timings = self
            .slides
            .iter()
            .filter_map(|slide_id| {
                let spent = self.accumulated.get(slide_id)?;
                let ms = u64::try_from(spent.num_milliseconds()).ok()?;
                if ms == 0 {
                    return None;
                }
                Some(SlideTiming {
                    slide_id: slide_id.clone(),
                    time_spent_ms: ms,
                })
            })
            .collect();

        Ok(timings)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::engagement::Engagement;
use crate::model::ids::{AnalyticId, DoctorId, PresentationId, SessionId, SlideId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session has already ended")]
    AlreadyEnded,

    #[error("session end time is before its start time")]
    EndBeforeStart,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// The finalized half of a session, set exactly once when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCompletion {
    ended_at: DateTime<Utc>,
    total_time: Duration,
    engagement: Engagement,
}

impl SessionCompletion {
    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Wall-clock span from start to end.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// The span in (fractional) seconds, the persisted unit.
    #[must_use]
    pub fn total_time_secs(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let ms = self.total_time.num_milliseconds() as f64;
        ms / 1000.0
    }

    #[must_use]
    pub fn engagement(&self) -> Engagement {
        self.engagement
    }
}

/// One doctor/presentation pairing from start to end.
///
/// A session is created open (no completion) and transitions to completed
/// exactly once; a second completion attempt is rejected rather than
/// silently recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    doctor_id: DoctorId,
    presentation_id: PresentationId,
    started_at: DateTime<Utc>,
    completion: Option<SessionCompletion>,
}

impl Session {
    /// Opens a new session at `started_at`.
    #[must_use]
    pub fn begin(
        id: SessionId,
        doctor_id: DoctorId,
        presentation_id: PresentationId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            doctor_id,
            presentation_id,
            started_at,
            completion: None,
        }
    }

    /// Rehydrates a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::EndBeforeStart` if the persisted end
    /// precedes the start.
    pub fn from_persisted(
        id: SessionId,
        doctor_id: DoctorId,
        presentation_id: PresentationId,
        started_at: DateTime<Utc>,
        completion: Option<(DateTime<Utc>, Duration, Engagement)>,
    ) -> Result<Self, SessionStateError> {
        let completion = match completion {
            Some((ended_at, total_time, engagement)) => {
                if ended_at < started_at {
                    return Err(SessionStateError::EndBeforeStart);
                }
                Some(SessionCompletion {
                    ended_at,
                    total_time,
                    engagement,
                })
            }
            None => None,
        };

        Ok(Self {
            id,
            doctor_id,
            presentation_id,
            started_at,
            completion,
        })
    }

    /// Completes the session: stamps the end, derives the wall-clock span
    /// and computes engagement from the recorded slide time.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::AlreadyEnded` on a second completion and
    /// `SessionStateError::EndBeforeStart` for a backwards end stamp.
    pub fn complete(
        &mut self,
        ended_at: DateTime<Utc>,
        recorded_time: Duration,
    ) -> Result<&SessionCompletion, SessionStateError> {
        if self.completion.is_some() {
            return Err(SessionStateError::AlreadyEnded);
        }
        if ended_at < self.started_at {
            return Err(SessionStateError::EndBeforeStart);
        }

        let total_time = ended_at - self.started_at;
        let engagement = Engagement::from_timings(recorded_time, total_time);
        Ok(&*self.completion.insert(SessionCompletion {
            ended_at,
            total_time,
            engagement,
        }))
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn doctor_id(&self) -> &DoctorId {
        &self.doctor_id
    }

    #[must_use]
    pub fn presentation_id(&self) -> &PresentationId {
        &self.presentation_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completion(&self) -> Option<&SessionCompletion> {
        self.completion.as_ref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }
}

//
// ─── SLIDE TIMINGS & ANALYTICS ─────────────────────────────────────────────────
//

/// Accumulated dwell time for one slide within one session, as submitted
/// when the session ends. Repeat visits are already summed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideTiming {
    pub slide_id: SlideId,
    pub time_spent_ms: u64,
}

/// A persisted per-slide engagement row, written in a batch at session end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideAnalytic {
    id: AnalyticId,
    session_id: SessionId,
    slide_id: SlideId,
    time_spent_ms: u64,
}

impl SlideAnalytic {
    #[must_use]
    pub fn new(id: AnalyticId, session_id: SessionId, slide_id: SlideId, time_spent_ms: u64) -> Self {
        Self {
            id,
            session_id,
            slide_id,
            time_spent_ms,
        }
    }

    /// Materializes a submitted timing into a persisted row with a fresh id.
    #[must_use]
    pub fn from_timing(session_id: SessionId, timing: &SlideTiming) -> Self {
        Self {
            id: AnalyticId::generate(),
            session_id,
            slide_id: timing.slide_id.clone(),
            time_spent_ms: timing.time_spent_ms,
        }
    }

    #[must_use]
    pub fn id(&self) -> &AnalyticId {
        &self.id
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn slide_id(&self) -> &SlideId {
        &self.slide_id
    }

    #[must_use]
    pub fn time_spent_ms(&self) -> u64 {
        self.time_spent_ms
    }

    #[must_use]
    pub fn time_spent(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.time_spent_ms).unwrap_or(i64::MAX))
    }
}

//
// ─── ENGAGEMENT ROLLUP ─────────────────────────────────────────────────────────
//

/// Aggregate over all of an owner's completed sessions, recomputed from the
/// full session history at every session end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementRollup {
    sessions: u32,
    avg_engagement: Engagement,
    last_ended: Option<DateTime<Utc>>,
    total_time: Duration,
}

impl EngagementRollup {
    /// The rollup of an owner with no completed sessions yet.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            sessions: 0,
            avg_engagement: Engagement::ZERO,
            last_ended: None,
            total_time: Duration::zero(),
        }
    }

    /// Rehydrates a rollup from persisted storage.
    #[must_use]
    pub fn from_persisted(
        sessions: u32,
        avg_engagement: Engagement,
        last_ended: Option<DateTime<Utc>>,
        total_time: Duration,
    ) -> Self {
        Self {
            sessions,
            avg_engagement,
            last_ended,
            total_time,
        }
    }

    /// Recomputes the rollup over a session history. Open sessions are
    /// ignored; only completed ones count.
    #[must_use]
    pub fn from_sessions<'a, I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut count = 0_u32;
        let mut engagements = Vec::new();
        let mut last_ended: Option<DateTime<Utc>> = None;
        let mut total_time = Duration::zero();

        for session in sessions {
            let Some(completion) = session.completion() else {
                continue;
            };
            count = count.saturating_add(1);
            engagements.push(completion.engagement());
            total_time = total_time + completion.total_time();
            let ended = completion.ended_at();
            if last_ended.is_none_or(|latest| ended > latest) {
                last_ended = Some(ended);
            }
        }

        Self {
            sessions: count,
            avg_engagement: Engagement::mean(engagements),
            last_ended,
            total_time,
        }
    }

    // Accessors
    #[must_use]
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    #[must_use]
    pub fn avg_engagement(&self) -> Engagement {
        self.avg_engagement
    }

    /// When the owner's most recent session ended.
    #[must_use]
    pub fn last_ended(&self) -> Option<DateTime<Utc>> {
        self.last_ended
    }

    /// Cumulative wall-clock time across completed sessions.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

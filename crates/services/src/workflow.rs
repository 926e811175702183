use std::sync::Arc;

use chrono::{DateTime, Utc};

use medrep_core::Clock;
use medrep_core::model::{
    DoctorId, PresentationId, Session, SessionId, SlideId, SlideTiming,
};
use storage::repository::{
    DoctorRepository, PresentationRepository, SessionRepository, SlideRepository, Storage,
    StorageError,
};

use crate::error::SessionError;
use crate::recorder::SessionRecorder;

/// A freshly started session: the persisted record plus the viewer-side
/// recorder primed with the presentation's slides.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: Session,
    pub recorder: SessionRecorder,
}

/// Orchestrates session start and persisted completion.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    doctors: Arc<dyn DoctorRepository>,
    presentations: Arc<dyn PresentationRepository>,
    slides: Arc<dyn SlideRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        doctors: Arc<dyn DoctorRepository>,
        presentations: Arc<dyn PresentationRepository>,
        slides: Arc<dyn SlideRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            doctors,
            presentations,
            slides,
            sessions,
        }
    }

    /// Convenience constructor over a `Storage` aggregate.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.doctors),
            Arc::clone(&storage.presentations),
            Arc::clone(&storage.slides),
            Arc::clone(&storage.sessions),
        )
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Starts a session for a doctor/presentation pair: validates both ids,
    /// persists an open session stamped at the clock's now, and returns it
    /// with a recorder on the first slide.
    ///
    /// Nothing is persisted when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DoctorNotFound` / `PresentationNotFound` for
    /// unknown ids, `SessionError::NoSlides` for an empty deck, and
    /// `SessionError::Storage` on repository failures.
    pub async fn start_session(
        &self,
        doctor_id: &DoctorId,
        presentation_id: &PresentationId,
    ) -> Result<StartedSession, SessionError> {
        let doctor = self
            .doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| SessionError::DoctorNotFound(doctor_id.clone()))?;
        let presentation = self
            .presentations
            .get_presentation(presentation_id)
            .await?
            .ok_or_else(|| SessionError::PresentationNotFound(presentation_id.clone()))?;

        let slide_ids: Vec<SlideId> = self
            .slides
            .slides_for_presentation(presentation.id())
            .await?
            .iter()
            .map(|slide| slide.id().clone())
            .collect();
        if slide_ids.is_empty() {
            return Err(SessionError::NoSlides);
        }

        let now = self.clock.now();
        let session = Session::begin(
            SessionId::generate(),
            doctor.id().clone(),
            presentation.id().clone(),
            now,
        );
        self.sessions.insert_session(&session).await?;

        let recorder = SessionRecorder::new(session.id().clone(), slide_ids, now)?;
        log::debug!(
            "session {} started: doctor {} x presentation {}",
            session.id(),
            doctor.id(),
            presentation.id()
        );

        Ok(StartedSession { session, recorder })
    }

    /// Finishes the recorder at the clock's now and submits its timings.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyEnded` if the recorder or the stored
    /// session has already ended, `SessionError::SessionNotFound` if the
    /// session vanished, and `SessionError::Storage` on repository failures.
    pub async fn end_session(
        &self,
        recorder: &mut SessionRecorder,
    ) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let timings = recorder.finish(now)?;
        self.complete(recorder.session_id().clone(), now, &timings)
            .await
    }

    /// Submits externally accumulated timings for a session, the write
    /// endpoint shape: `(sessionId, [{slideId, timeSpent}])`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionNotFound` for an unknown id,
    /// `SessionError::AlreadyEnded` when the session was already completed,
    /// and `SessionError::Storage` on repository failures.
    pub async fn end_with_timings(
        &self,
        session_id: &SessionId,
        timings: &[SlideTiming],
    ) -> Result<Session, SessionError> {
        self.complete(session_id.clone(), self.clock.now(), timings)
            .await
    }

    async fn complete(
        &self,
        session_id: SessionId,
        ended_at: DateTime<Utc>,
        timings: &[SlideTiming],
    ) -> Result<Session, SessionError> {
        match self
            .sessions
            .complete_session(&session_id, ended_at, timings)
            .await
        {
            Ok(session) => {
                if let Some(completion) = session.completion() {
                    log::debug!(
                        "session {} ended: {} slides, engagement {}",
                        session.id(),
                        timings.len(),
                        completion.engagement()
                    );
                }
                Ok(session)
            }
            Err(StorageError::NotFound) => Err(SessionError::SessionNotFound(session_id)),
            Err(StorageError::Conflict) => Err(SessionError::AlreadyEnded),
            Err(e) => Err(SessionError::Storage(e)),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use medrep_core::time::{fixed_clock, fixed_now};
    use storage::seed;

    fn seeded_service() -> SessionLoopService {
        let storage = Storage::in_memory_seeded(fixed_now());
        SessionLoopService::from_storage(fixed_clock(), &storage)
    }

    #[tokio::test]
    async fn start_session_persists_and_primes_recorder() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);

        let started = service
            .start_session(
                &DoctorId::new(seed::DOCTOR_1_ID),
                &PresentationId::new(seed::PRESENTATION_1_ID),
            )
            .await
            .unwrap();

        assert_eq!(started.recorder.slide_count(), 6);
        assert_eq!(started.recorder.current_slide().as_str(), "slide-1-0");
        assert!(!started.session.is_complete());

        let stored = storage
            .sessions
            .get_session(started.session.id())
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn start_session_with_unknown_doctor_writes_nothing() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);

        let err = service
            .start_session(
                &DoctorId::new("doctor-404"),
                &PresentationId::new(seed::PRESENTATION_1_ID),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::DoctorNotFound(_)));

        let err = service
            .start_session(
                &DoctorId::new(seed::DOCTOR_1_ID),
                &PresentationId::new("presentation-404"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PresentationNotFound(_)));

        assert!(storage.sessions.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn end_with_timings_maps_storage_outcomes() {
        let service = seeded_service();
        let started = service
            .start_session(
                &DoctorId::new(seed::DOCTOR_1_ID),
                &PresentationId::new(seed::PRESENTATION_1_ID),
            )
            .await
            .unwrap();

        let timings = vec![SlideTiming {
            slide_id: SlideId::new("slide-1-0"),
            time_spent_ms: 1_000,
        }];

        let session = service
            .end_with_timings(started.session.id(), &timings)
            .await
            .unwrap();
        assert!(session.is_complete());

        let err = service
            .end_with_timings(started.session.id(), &timings)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyEnded));

        let err = service
            .end_with_timings(&SessionId::new("s-404"), &timings)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn end_session_submits_recorder_timings() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let mut clock = fixed_clock();
        let service = SessionLoopService::from_storage(clock, &storage);

        let mut started = service
            .start_session(
                &DoctorId::new(seed::DOCTOR_1_ID),
                &PresentationId::new(seed::PRESENTATION_1_ID),
            )
            .await
            .unwrap();

        // The service clock is fixed; drive the recorder with a local copy.
        clock.advance(Duration::seconds(20));
        started.recorder.next(clock.now()).unwrap();

        // With a fixed service clock the wall-clock span is zero, so the
        // engagement degenerates to zero; the analytics still land.
        let session = service.end_session(&mut started.recorder).await.unwrap();
        assert!(session.is_complete());

        let analytics = storage
            .analytics
            .analytics_for_session(session.id())
            .await
            .unwrap();
        assert_eq!(analytics.len(), 1);
        assert_eq!(analytics[0].time_spent_ms(), 20_000);
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        struct FailingSessions;

        #[async_trait::async_trait]
        impl SessionRepository for FailingSessions {
            async fn insert_session(&self, _: &Session) -> Result<(), StorageError> {
                Err(StorageError::Connection("db down".into()))
            }
            async fn get_session(
                &self,
                _: &SessionId,
            ) -> Result<Option<Session>, StorageError> {
                Err(StorageError::Connection("db down".into()))
            }
            async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
                Err(StorageError::Connection("db down".into()))
            }
            async fn sessions_for_doctor(
                &self,
                _: &DoctorId,
            ) -> Result<Vec<Session>, StorageError> {
                Err(StorageError::Connection("db down".into()))
            }
            async fn sessions_for_presentation(
                &self,
                _: &PresentationId,
            ) -> Result<Vec<Session>, StorageError> {
                Err(StorageError::Connection("db down".into()))
            }
            async fn complete_session(
                &self,
                _: &SessionId,
                _: DateTime<Utc>,
                _: &[SlideTiming],
            ) -> Result<Session, StorageError> {
                Err(StorageError::Connection("db down".into()))
            }
        }

        let storage = Storage::in_memory_seeded(fixed_now());
        let service = SessionLoopService::new(
            fixed_clock(),
            Arc::clone(&storage.doctors),
            Arc::clone(&storage.presentations),
            Arc::clone(&storage.slides),
            Arc::new(FailingSessions),
        );

        let err = service
            .end_with_timings(&SessionId::new("s-1"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
    }
}

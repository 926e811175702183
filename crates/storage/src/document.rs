use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use medrep_core::model::{
    Doctor, DoctorId, EngagementRollup, Presentation, PresentationId, Session, SessionId,
    SessionStateError, Slide, SlideAnalytic, SlideId, SlideTiming,
};
use medrep_core::time::format_hours_minutes;

use crate::repository::{
    DoctorRecord, PresentationRecord, SessionRecord, SlideAnalyticRecord, SlideRecord,
    StorageError,
};

/// The whole persisted state: five record arrays in the original document
/// layout (`doctors`, `presentations`, `slides`, `sessions`,
/// `slideAnalytics`).
///
/// All document semantics (inserts, lookups and the atomic session
/// completion) live here, so the in-memory and JSON-file backends cannot
/// drift apart. Callers are expected to hold the backend's single writer
/// lock across any `&mut self` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    pub doctors: Vec<DoctorRecord>,
    pub presentations: Vec<PresentationRecord>,
    pub slides: Vec<SlideRecord>,
    pub sessions: Vec<SessionRecord>,
    pub slide_analytics: Vec<SlideAnalyticRecord>,
}

impl StoreDocument {
    // ── doctors ──

    pub fn upsert_doctor(&mut self, doctor: &Doctor) {
        let record = DoctorRecord::from_domain(doctor);
        match self.doctors.iter_mut().find(|d| &d.id == doctor.id()) {
            Some(existing) => *existing = record,
            None => self.doctors.push(record),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record fails
    /// re-validation.
    pub fn get_doctor(&self, id: &DoctorId) -> Result<Option<Doctor>, StorageError> {
        self.doctors
            .iter()
            .find(|d| &d.id == id)
            .map(|d| d.clone().into_domain())
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored record fails
    /// re-validation.
    pub fn list_doctors(&self) -> Result<Vec<Doctor>, StorageError> {
        self.doctors
            .iter()
            .map(|d| d.clone().into_domain())
            .collect()
    }

    // ── presentations ──

    pub fn upsert_presentation(&mut self, presentation: &Presentation) {
        let record = PresentationRecord::from_domain(presentation);
        match self
            .presentations
            .iter_mut()
            .find(|p| &p.id == presentation.id())
        {
            Some(existing) => *existing = record,
            None => self.presentations.push(record),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record fails
    /// re-validation.
    pub fn get_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Option<Presentation>, StorageError> {
        self.presentations
            .iter()
            .find(|p| &p.id == id)
            .map(|p| p.clone().into_domain())
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored record fails
    /// re-validation.
    pub fn list_presentations(&self) -> Result<Vec<Presentation>, StorageError> {
        self.presentations
            .iter()
            .map(|p| p.clone().into_domain())
            .collect()
    }

    // ── slides ──

    /// Inserts a batch of slides; rows with existing ids are replaced, so
    /// re-seeding cannot duplicate a deck.
    pub fn insert_slides(&mut self, slides: &[Slide]) {
        for slide in slides {
            let record = SlideRecord::from_domain(slide);
            match self.slides.iter_mut().find(|s| s.id == record.id) {
                Some(existing) => *existing = record,
                None => self.slides.push(record),
            }
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record fails
    /// re-validation.
    pub fn get_slide(&self, id: &SlideId) -> Result<Option<Slide>, StorageError> {
        self.slides
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.clone().into_domain())
            .transpose()
    }

    /// A presentation's slides, ordered by their order index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored record fails
    /// re-validation.
    pub fn slides_for_presentation(
        &self,
        presentation_id: &PresentationId,
    ) -> Result<Vec<Slide>, StorageError> {
        let mut slides = self
            .slides
            .iter()
            .filter(|s| &s.presentation_id == presentation_id)
            .map(|s| s.clone().into_domain())
            .collect::<Result<Vec<_>, _>>()?;
        slides.sort_by_key(Slide::order);
        Ok(slides)
    }

    // ── sessions ──

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session ID already exists.
    pub fn insert_session(&mut self, session: &Session) -> Result<(), StorageError> {
        if self.sessions.iter().any(|s| &s.id == session.id()) {
            return Err(StorageError::Conflict);
        }
        self.sessions.push(SessionRecord::from_domain(session));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record fails
    /// re-validation.
    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        self.sessions
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.clone().into_domain())
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored record fails
    /// re-validation.
    pub fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        self.sessions
            .iter()
            .map(|s| s.clone().into_domain())
            .collect()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored record fails
    /// re-validation.
    pub fn sessions_for_doctor(&self, id: &DoctorId) -> Result<Vec<Session>, StorageError> {
        self.sessions
            .iter()
            .filter(|s| &s.doctor_id == id)
            .map(|s| s.clone().into_domain())
            .collect()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored record fails
    /// re-validation.
    pub fn sessions_for_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Vec<Session>, StorageError> {
        self.sessions
            .iter()
            .filter(|s| &s.presentation_id == id)
            .map(|s| s.clone().into_domain())
            .collect()
    }

    /// Finalizes a session in one document mutation: stamps the end,
    /// appends one analytic row per submitted timing, then recomputes the
    /// owning doctor's and presentation's rollups over their full session
    /// history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown session and
    /// `StorageError::Conflict` when the session has already ended.
    pub fn complete_session(
        &mut self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        timings: &[SlideTiming],
    ) -> Result<Session, StorageError> {
        let index = self
            .sessions
            .iter()
            .position(|s| &s.id == id)
            .ok_or(StorageError::NotFound)?;

        let mut session = self.sessions[index].clone().into_domain()?;
        let recorded_ms: u64 = timings.iter().map(|t| t.time_spent_ms).sum();
        let recorded = Duration::milliseconds(i64::try_from(recorded_ms).unwrap_or(i64::MAX));
        session.complete(ended_at, recorded).map_err(|e| match e {
            SessionStateError::AlreadyEnded => StorageError::Conflict,
            SessionStateError::EndBeforeStart => StorageError::Serialization(e.to_string()),
            _ => StorageError::Serialization(e.to_string()),
        })?;
        self.sessions[index] = SessionRecord::from_domain(&session);

        for timing in timings {
            let analytic = SlideAnalytic::from_timing(session.id().clone(), timing);
            self.slide_analytics
                .push(SlideAnalyticRecord::from_domain(&analytic));
        }

        self.recompute_doctor_rollup(session.doctor_id())?;
        self.recompute_presentation_rollup(session.presentation_id())?;

        Ok(session)
    }

    fn recompute_doctor_rollup(&mut self, id: &DoctorId) -> Result<(), StorageError> {
        let history = self.sessions_for_doctor(id)?;
        let rollup = EngagementRollup::from_sessions(&history);
        match self.doctors.iter_mut().find(|d| &d.id == id) {
            Some(record) => {
                record.sessions = rollup.sessions();
                record.avg_engagement = rollup.avg_engagement().value();
                record.last_session = rollup.last_ended();
                record.total_time = format_hours_minutes(rollup.total_time());
            }
            // Should not happen while sessions validate their doctor at
            // start; tolerated so a pruned doctor cannot wedge completion.
            None => log::warn!("doctor {id} missing during rollup recompute"),
        }
        Ok(())
    }

    fn recompute_presentation_rollup(&mut self, id: &PresentationId) -> Result<(), StorageError> {
        let history = self.sessions_for_presentation(id)?;
        let rollup = EngagementRollup::from_sessions(&history);
        match self.presentations.iter_mut().find(|p| &p.id == id) {
            Some(record) => {
                record.sessions = rollup.sessions();
                record.avg_engagement = rollup.avg_engagement().value();
                record.last_used = rollup.last_ended();
            }
            None => log::warn!("presentation {id} missing during rollup recompute"),
        }
        Ok(())
    }

    // ── slide analytics ──

    /// # Errors
    ///
    /// Currently infallible; kept fallible for symmetry with the other
    /// readers.
    pub fn list_analytics(&self) -> Result<Vec<SlideAnalytic>, StorageError> {
        Ok(self
            .slide_analytics
            .iter()
            .map(|a| a.clone().into_domain())
            .collect())
    }

    /// # Errors
    ///
    /// Currently infallible.
    pub fn analytics_for_session(
        &self,
        id: &SessionId,
    ) -> Result<Vec<SlideAnalytic>, StorageError> {
        Ok(self
            .slide_analytics
            .iter()
            .filter(|a| &a.session_id == id)
            .map(|a| a.clone().into_domain())
            .collect())
    }

    /// # Errors
    ///
    /// Currently infallible.
    pub fn analytics_for_slide(&self, id: &SlideId) -> Result<Vec<SlideAnalytic>, StorageError> {
        Ok(self
            .slide_analytics
            .iter()
            .filter(|a| &a.slide_id == id)
            .map(|a| a.clone().into_domain())
            .collect())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use medrep_core::Engagement;
use medrep_core::model::{
    AnalyticId, Doctor, DoctorId, DoctorStatus, EngagementRollup, ImageSource, Presentation,
    PresentationId, PresentationStatus, Session, SessionId, Slide, SlideAnalytic, SlideId,
    SlideTiming,
};
use medrep_core::time::{format_hours_minutes, parse_hours_minutes};

use crate::document::StoreDocument;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("io error: {0}")]
    Io(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── PERSISTED RECORD SHAPES ───────────────────────────────────────────────────
//

/// Persisted shape for a doctor, in the store document's camelCase layout.
///
/// These records mirror the domain types so repositories can
/// serialize/deserialize without leaking storage concerns into the domain
/// layer; converting back re-validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRecord {
    pub id: DoctorId,
    pub name: String,
    pub specialty: String,
    pub email: String,
    pub phone: String,
    pub sessions: u32,
    pub avg_engagement: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session: Option<DateTime<Utc>>,
    /// Cumulative presented time in the dashboard's `XhYm` rendering.
    pub total_time: String,
    pub status: DoctorStatus,
}

impl DoctorRecord {
    #[must_use]
    pub fn from_domain(doctor: &Doctor) -> Self {
        let rollup = doctor.rollup();
        Self {
            id: doctor.id().clone(),
            name: doctor.name().to_owned(),
            specialty: doctor.specialty().to_owned(),
            email: doctor.email().to_owned(),
            phone: doctor.phone().to_owned(),
            sessions: rollup.sessions(),
            avg_engagement: rollup.avg_engagement().value(),
            last_session: rollup.last_ended(),
            total_time: format_hours_minutes(rollup.total_time()),
            status: doctor.status(),
        }
    }

    /// Convert the record back into a domain `Doctor`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a field fails re-validation.
    pub fn into_domain(self) -> Result<Doctor, StorageError> {
        let total_time = parse_hours_minutes(&self.total_time).ok_or_else(|| {
            StorageError::Serialization(format!("invalid totalTime: {}", self.total_time))
        })?;
        let rollup = EngagementRollup::from_persisted(
            self.sessions,
            Engagement::new(self.avg_engagement),
            self.last_session,
            total_time,
        );
        Doctor::from_persisted(
            self.id,
            self.name,
            self.specialty,
            self.email,
            self.phone,
            self.status,
            rollup,
        )
        .map_err(ser)
    }
}

/// Persisted shape for a presentation.
///
/// The document layout only keeps session count, average engagement and
/// last-used for presentations; cumulative time is a doctor-side figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationRecord {
    pub id: PresentationId,
    pub title: String,
    pub description: String,
    /// Advertised slide count (`slides` in the document).
    pub slides: u32,
    pub sessions: u32,
    pub avg_engagement: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    pub status: PresentationStatus,
    pub created_at: DateTime<Utc>,
}

impl PresentationRecord {
    #[must_use]
    pub fn from_domain(presentation: &Presentation) -> Self {
        let rollup = presentation.rollup();
        Self {
            id: presentation.id().clone(),
            title: presentation.title().to_owned(),
            description: presentation.description().unwrap_or_default().to_owned(),
            slides: presentation.slide_count(),
            sessions: rollup.sessions(),
            avg_engagement: rollup.avg_engagement().value(),
            last_used: rollup.last_ended(),
            status: presentation.status(),
            created_at: presentation.created_at(),
        }
    }

    /// Convert the record back into a domain `Presentation`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a field fails re-validation.
    pub fn into_domain(self) -> Result<Presentation, StorageError> {
        let rollup = EngagementRollup::from_persisted(
            self.sessions,
            Engagement::new(self.avg_engagement),
            self.last_used,
            Duration::zero(),
        );
        let description = Some(self.description).filter(|d| !d.trim().is_empty());
        Presentation::from_persisted(
            self.id,
            self.title,
            description,
            self.slides,
            self.status,
            self.created_at,
            rollup,
        )
        .map_err(ser)
    }
}

/// Persisted shape for a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRecord {
    pub id: SlideId,
    pub presentation_id: PresentationId,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub order: u32,
}

impl SlideRecord {
    #[must_use]
    pub fn from_domain(slide: &Slide) -> Self {
        Self {
            id: slide.id().clone(),
            presentation_id: slide.presentation_id().clone(),
            title: slide.title().to_owned(),
            content: slide.content().to_owned(),
            image_url: slide.image().as_str().to_owned(),
            order: slide.order(),
        }
    }

    /// Convert the record back into a domain `Slide`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a field fails re-validation.
    pub fn into_domain(self) -> Result<Slide, StorageError> {
        let image = ImageSource::parse(&self.image_url).map_err(ser)?;
        Slide::new(
            self.id,
            self.presentation_id,
            self.title,
            self.content,
            image,
            self.order,
        )
        .map_err(ser)
    }
}

/// Persisted shape for a session. The completion fields are written
/// together, exactly once, when the session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: SessionId,
    pub doctor_id: DoctorId,
    pub presentation_id: PresentationId,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock span in fractional seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_engagement: Option<u8>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_domain(session: &Session) -> Self {
        Self {
            id: session.id().clone(),
            doctor_id: session.doctor_id().clone(),
            presentation_id: session.presentation_id().clone(),
            start_time: session.started_at(),
            end_time: session.completion().map(|c| c.ended_at()),
            total_time: session.completion().map(|c| c.total_time_secs()),
            avg_engagement: session.completion().map(|c| c.engagement().value()),
        }
    }

    /// Convert the record back into a domain `Session`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the completion fields are
    /// inconsistent (an end stamp without a span, or a backwards range).
    pub fn into_domain(self) -> Result<Session, StorageError> {
        let completion = match self.end_time {
            None => None,
            Some(ended_at) => {
                let secs = self.total_time.ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "session {} has endTime but no totalTime",
                        self.id
                    ))
                })?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(StorageError::Serialization(format!(
                        "invalid totalTime: {secs}"
                    )));
                }
                #[allow(clippy::cast_possible_truncation)]
                let total_time = Duration::milliseconds((secs * 1000.0).round() as i64);
                let engagement = Engagement::new(self.avg_engagement.unwrap_or(0));
                Some((ended_at, total_time, engagement))
            }
        };

        Session::from_persisted(
            self.id,
            self.doctor_id,
            self.presentation_id,
            self.start_time,
            completion,
        )
        .map_err(ser)
    }
}

/// Persisted shape for a per-slide engagement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideAnalyticRecord {
    pub id: AnalyticId,
    pub session_id: SessionId,
    pub slide_id: SlideId,
    /// Accumulated dwell time in milliseconds.
    pub time_spent: u64,
}

impl SlideAnalyticRecord {
    #[must_use]
    pub fn from_domain(analytic: &SlideAnalytic) -> Self {
        Self {
            id: analytic.id().clone(),
            session_id: analytic.session_id().clone(),
            slide_id: analytic.slide_id().clone(),
            time_spent: analytic.time_spent_ms(),
        }
    }

    #[must_use]
    pub fn into_domain(self) -> SlideAnalytic {
        SlideAnalytic::new(self.id, self.session_id, self.slide_id, self.time_spent)
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    /// Persist or update a doctor.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the doctor cannot be stored.
    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), StorageError>;

    /// Fetch a doctor by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing doctor is `None`.
    async fn get_doctor(&self, id: &DoctorId) -> Result<Option<Doctor>, StorageError>;

    /// List all doctors.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StorageError>;
}

#[async_trait]
pub trait PresentationRepository: Send + Sync {
    /// Persist or update a presentation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the presentation cannot be stored.
    async fn upsert_presentation(&self, presentation: &Presentation) -> Result<(), StorageError>;

    /// Fetch a presentation by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing row is `None`.
    async fn get_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Option<Presentation>, StorageError>;

    /// List all presentations.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_presentations(&self) -> Result<Vec<Presentation>, StorageError>;
}

#[async_trait]
pub trait SlideRepository: Send + Sync {
    /// Persist a batch of slides. Rows with existing ids are replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be stored.
    async fn insert_slides(&self, slides: &[Slide]) -> Result<(), StorageError>;

    /// Fetch one slide by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing slide is `None`.
    async fn get_slide(&self, id: &SlideId) -> Result<Option<Slide>, StorageError>;

    /// Fetch a presentation's slides ordered by their order index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn slides_for_presentation(
        &self,
        presentation_id: &PresentationId,
    ) -> Result<Vec<Slide>, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a newly started (open) session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session ID already exists.
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing session is `None`.
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError>;

    /// List every session, open and completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError>;

    /// List a doctor's sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn sessions_for_doctor(&self, id: &DoctorId) -> Result<Vec<Session>, StorageError>;

    /// List a presentation's sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn sessions_for_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Vec<Session>, StorageError>;

    /// Atomically finalize a session: stamp the end, write one analytic row
    /// per submitted timing, and recompute the owning doctor's and
    /// presentation's rollups over their full session history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown session and
    /// `StorageError::Conflict` when the session has already ended.
    async fn complete_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        timings: &[SlideTiming],
    ) -> Result<Session, StorageError>;
}

#[async_trait]
pub trait SlideAnalyticRepository: Send + Sync {
    /// List every recorded analytic row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_analytics(&self) -> Result<Vec<SlideAnalytic>, StorageError>;

    /// List the rows recorded for one session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn analytics_for_session(
        &self,
        id: &SessionId,
    ) -> Result<Vec<SlideAnalytic>, StorageError>;

    /// List the rows recorded for one slide, across sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn analytics_for_slide(&self, id: &SlideId) -> Result<Vec<SlideAnalytic>, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Process-resident store over the shared document, for tests, prototyping
/// and `--memory` runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    doc: Arc<Mutex<StoreDocument>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An in-memory store pre-populated with the initial data set.
    #[must_use]
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            doc: Arc::new(Mutex::new(crate::seed::initial_document(now))),
        }
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&StoreDocument) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let guard = self
            .doc
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        f(&guard)
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut guard = self
            .doc
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        f(&mut guard)
    }
}

#[async_trait]
impl DoctorRepository for InMemoryRepository {
    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.upsert_doctor(doctor);
            Ok(())
        })
    }

    async fn get_doctor(&self, id: &DoctorId) -> Result<Option<Doctor>, StorageError> {
        self.read(|doc| doc.get_doctor(id))
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StorageError> {
        self.read(StoreDocument::list_doctors)
    }
}

#[async_trait]
impl PresentationRepository for InMemoryRepository {
    async fn upsert_presentation(&self, presentation: &Presentation) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.upsert_presentation(presentation);
            Ok(())
        })
    }

    async fn get_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Option<Presentation>, StorageError> {
        self.read(|doc| doc.get_presentation(id))
    }

    async fn list_presentations(&self) -> Result<Vec<Presentation>, StorageError> {
        self.read(StoreDocument::list_presentations)
    }
}

#[async_trait]
impl SlideRepository for InMemoryRepository {
    async fn insert_slides(&self, slides: &[Slide]) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.insert_slides(slides);
            Ok(())
        })
    }

    async fn get_slide(&self, id: &SlideId) -> Result<Option<Slide>, StorageError> {
        self.read(|doc| doc.get_slide(id))
    }

    async fn slides_for_presentation(
        &self,
        presentation_id: &PresentationId,
    ) -> Result<Vec<Slide>, StorageError> {
        self.read(|doc| doc.slides_for_presentation(presentation_id))
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        self.mutate(|doc| doc.insert_session(session))
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        self.read(|doc| doc.get_session(id))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        self.read(StoreDocument::list_sessions)
    }

    async fn sessions_for_doctor(&self, id: &DoctorId) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| doc.sessions_for_doctor(id))
    }

    async fn sessions_for_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| doc.sessions_for_presentation(id))
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        timings: &[SlideTiming],
    ) -> Result<Session, StorageError> {
        self.mutate(|doc| doc.complete_session(id, ended_at, timings))
    }
}

#[async_trait]
impl SlideAnalyticRepository for InMemoryRepository {
    async fn list_analytics(&self) -> Result<Vec<SlideAnalytic>, StorageError> {
        self.read(StoreDocument::list_analytics)
    }

    async fn analytics_for_session(
        &self,
        id: &SessionId,
    ) -> Result<Vec<SlideAnalytic>, StorageError> {
        self.read(|doc| doc.analytics_for_session(id))
    }

    async fn analytics_for_slide(&self, id: &SlideId) -> Result<Vec<SlideAnalytic>, StorageError> {
        self.read(|doc| doc.analytics_for_slide(id))
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the five repositories behind trait objects for easy backend
/// swapping. Constructed once per process; there is no module-level
/// singleton anywhere.
#[derive(Clone)]
pub struct Storage {
    pub doctors: Arc<dyn DoctorRepository>,
    pub presentations: Arc<dyn PresentationRepository>,
    pub slides: Arc<dyn SlideRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub analytics: Arc<dyn SlideAnalyticRepository>,
}

impl Storage {
    fn from_memory(repo: InMemoryRepository) -> Self {
        Self {
            doctors: Arc::new(repo.clone()),
            presentations: Arc::new(repo.clone()),
            slides: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            analytics: Arc::new(repo),
        }
    }

    /// An empty in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryRepository::new())
    }

    /// An in-memory store pre-populated with the initial data set.
    #[must_use]
    pub fn in_memory_seeded(now: DateTime<Utc>) -> Self {
        Self::from_memory(InMemoryRepository::seeded(now))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use medrep_core::time::fixed_now;

    fn build_doctor(id: &str) -> Doctor {
        Doctor::new(
            DoctorId::new(id),
            "Dr. Sarah Smith",
            "Cardiology",
            "sarah.smith@hospital.com",
            "+1 (555) 123-4567",
            DoctorStatus::Active,
        )
        .unwrap()
    }

    fn build_presentation(id: &str) -> Presentation {
        Presentation::new(
            PresentationId::new(id),
            "Cardiomax Treatment Protocol",
            Some("Cardiovascular protocol walkthrough".into()),
            2,
            PresentationStatus::Active,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn round_trips_doctor_and_presentation() {
        let repo = InMemoryRepository::new();
        let doctor = build_doctor("doctor-1");
        let presentation = build_presentation("presentation-1");

        repo.upsert_doctor(&doctor).await.unwrap();
        repo.upsert_presentation(&presentation).await.unwrap();

        let fetched = repo.get_doctor(doctor.id()).await.unwrap().unwrap();
        assert_eq!(fetched, doctor);
        assert!(
            repo.get_doctor(&DoctorId::new("doctor-404"))
                .await
                .unwrap()
                .is_none()
        );

        let listed = repo.list_presentations().await.unwrap();
        assert_eq!(listed, vec![presentation]);
    }

    #[tokio::test]
    async fn insert_session_rejects_duplicate_ids() {
        let repo = InMemoryRepository::new();
        let session = Session::begin(
            SessionId::new("s-1"),
            DoctorId::new("doctor-1"),
            PresentationId::new("presentation-1"),
            fixed_now(),
        );
        repo.insert_session(&session).await.unwrap();
        let err = repo.insert_session(&session).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[test]
    fn doctor_record_round_trips_rollup() {
        let mut doctor = build_doctor("doctor-1");
        let start = fixed_now();
        let mut session = Session::begin(
            SessionId::new("s-1"),
            doctor.id().clone(),
            PresentationId::new("presentation-1"),
            start,
        );
        session
            .complete(start + Duration::seconds(120), Duration::seconds(90))
            .unwrap();
        doctor.apply_rollup(EngagementRollup::from_sessions([&session]));

        let record = DoctorRecord::from_domain(&doctor);
        assert_eq!(record.sessions, 1);
        assert_eq!(record.avg_engagement, 75);
        assert_eq!(record.total_time, "0h 2m");

        let restored = record.into_domain().unwrap();
        assert_eq!(restored.rollup().sessions(), 1);
        assert_eq!(restored.rollup().total_time(), Duration::minutes(2));
    }

    #[test]
    fn session_record_requires_consistent_completion() {
        let record = SessionRecord {
            id: SessionId::new("s-1"),
            doctor_id: DoctorId::new("doctor-1"),
            presentation_id: PresentationId::new("presentation-1"),
            start_time: fixed_now(),
            end_time: Some(fixed_now()),
            total_time: None,
            avg_engagement: None,
        };
        let err = record.into_domain().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn storage_aggregate_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Storage>();
        assert_send_sync::<InMemoryRepository>();
    }
}

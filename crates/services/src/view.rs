use serde::Serialize;
use std::sync::Arc;

use medrep_core::model::{DoctorId, PresentationId};
use storage::repository::{
    DoctorRecord, DoctorRepository, PresentationRecord, PresentationRepository,
    SessionRecord, SessionRepository, SlideAnalyticRecord, SlideAnalyticRepository,
    SlideRecord, SlideRepository, Storage,
};

use crate::error::{AnalyticsError, CatalogError};
use crate::queries::AnalyticsQueries;

/// Row limits used by the original surfaces.
pub const ANALYTICS_RECENT_LIMIT: usize = 50;
pub const ANALYTICS_TOP_SLIDES_LIMIT: usize = 20;
pub const DASHBOARD_RECENT_LIMIT: usize = 4;

//
// ─── SURFACE ROW TYPES ─────────────────────────────────────────────────────────
//

/// One completed session joined with its doctor and presentation, plus the
/// distinct-slide count and duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListItem {
    pub session: SessionRecord,
    pub doctor: DoctorRecord,
    pub presentation: PresentationRecord,
    pub slides: usize,
    pub duration: f64,
}

/// Aggregated dwell statistics for one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideStats {
    pub slide: SlideRecord,
    pub total_time_spent: u64,
    pub avg_time_spent: f64,
    pub views: u32,
}

impl SlideStats {
    #[must_use]
    pub fn new(slide: SlideRecord, total_time_spent: u64, views: u32) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let avg_time_spent = if views == 0 {
            0.0
        } else {
            total_time_spent as f64 / f64::from(views)
        };
        Self {
            slide,
            total_time_spent,
            avg_time_spent,
            views,
        }
    }
}

/// The analytics surface payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub doctors: Vec<DoctorRecord>,
    pub presentations: Vec<PresentationRecord>,
    pub recent_sessions: Vec<SessionListItem>,
    pub top_slides: Vec<SlideStats>,
    pub all_slide_analytics: Vec<SlideAnalyticRecord>,
}

/// The dashboard surface payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub doctors: Vec<DoctorRecord>,
    pub presentations: Vec<PresentationRecord>,
    pub total_sessions: usize,
}

/// The session start page payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPageData {
    pub doctors: Vec<DoctorRecord>,
    pub presentations: Vec<PresentationRecord>,
}

/// A presentation plus its ordered slides, the viewer fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationData {
    pub presentation: PresentationRecord,
    pub slides: Vec<SlideRecord>,
}

//
// ─── ANALYTICS SERVICE ─────────────────────────────────────────────────────────
//

/// Read-side facade over the repositories, producing the JSON payloads the
/// external surfaces return. Owns no state beyond the repository handles.
#[derive(Clone)]
pub struct AnalyticsService {
    doctors: Arc<dyn DoctorRepository>,
    presentations: Arc<dyn PresentationRepository>,
    slides: Arc<dyn SlideRepository>,
    sessions: Arc<dyn SessionRepository>,
    analytics: Arc<dyn SlideAnalyticRepository>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(
        doctors: Arc<dyn DoctorRepository>,
        presentations: Arc<dyn PresentationRepository>,
        slides: Arc<dyn SlideRepository>,
        sessions: Arc<dyn SessionRepository>,
        analytics: Arc<dyn SlideAnalyticRepository>,
    ) -> Self {
        Self {
            doctors,
            presentations,
            slides,
            sessions,
            analytics,
        }
    }

    /// Convenience constructor over a `Storage` aggregate.
    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(
            Arc::clone(&storage.doctors),
            Arc::clone(&storage.presentations),
            Arc::clone(&storage.slides),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.analytics),
        )
    }

    /// Completed sessions, newest first, joined and truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn recent_sessions(
        &self,
        limit: usize,
    ) -> Result<Vec<SessionListItem>, AnalyticsError> {
        AnalyticsQueries::recent_sessions(
            self.sessions.as_ref(),
            self.analytics.as_ref(),
            self.doctors.as_ref(),
            self.presentations.as_ref(),
            limit,
        )
        .await
    }

    /// Slides ranked by average dwell time, truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn top_slides(&self, limit: usize) -> Result<Vec<SlideStats>, AnalyticsError> {
        AnalyticsQueries::top_slides(self.analytics.as_ref(), self.slides.as_ref(), limit).await
    }

    /// Per-slide usage for one presentation, zero-initialized, deck order.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn slide_analytics_for_presentation(
        &self,
        presentation_id: &PresentationId,
    ) -> Result<Vec<SlideStats>, AnalyticsError> {
        AnalyticsQueries::slide_usage_for_presentation(
            self.slides.as_ref(),
            self.analytics.as_ref(),
            presentation_id,
        )
        .await
    }

    /// A doctor's sessions.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn sessions_for_doctor(
        &self,
        id: &DoctorId,
    ) -> Result<Vec<SessionRecord>, AnalyticsError> {
        AnalyticsQueries::sessions_for_doctor(self.sessions.as_ref(), id).await
    }

    /// A presentation's sessions.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn sessions_for_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Vec<SessionRecord>, AnalyticsError> {
        AnalyticsQueries::sessions_for_presentation(self.sessions.as_ref(), id).await
    }

    /// The full analytics surface.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn analytics(&self) -> Result<AnalyticsData, AnalyticsError> {
        let doctors = self.doctor_records().await?;
        let presentations = self.presentation_records().await?;
        let recent_sessions = self.recent_sessions(ANALYTICS_RECENT_LIMIT).await?;
        let top_slides = self.top_slides(ANALYTICS_TOP_SLIDES_LIMIT).await?;
        let all_slide_analytics = self
            .analytics
            .list_analytics()
            .await?
            .iter()
            .map(SlideAnalyticRecord::from_domain)
            .collect();

        Ok(AnalyticsData {
            doctors,
            presentations,
            recent_sessions,
            top_slides,
            all_slide_analytics,
        })
    }

    /// The dashboard surface.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn dashboard(&self) -> Result<DashboardData, AnalyticsError> {
        let doctors = self.doctor_records().await?;
        let presentations = self.presentation_records().await?;
        let total_sessions = self.recent_sessions(DASHBOARD_RECENT_LIMIT).await?.len();

        Ok(DashboardData {
            doctors,
            presentations,
            total_sessions,
        })
    }

    /// The start-page surface.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn start_page(&self) -> Result<StartPageData, AnalyticsError> {
        Ok(StartPageData {
            doctors: self.doctor_records().await?,
            presentations: self.presentation_records().await?,
        })
    }

    async fn doctor_records(&self) -> Result<Vec<DoctorRecord>, AnalyticsError> {
        Ok(self
            .doctors
            .list_doctors()
            .await?
            .iter()
            .map(DoctorRecord::from_domain)
            .collect())
    }

    async fn presentation_records(&self) -> Result<Vec<PresentationRecord>, AnalyticsError> {
        Ok(self
            .presentations
            .list_presentations()
            .await?
            .iter()
            .map(PresentationRecord::from_domain)
            .collect())
    }
}

/// Fetches a presentation and its ordered slides.
///
/// # Errors
///
/// Returns `CatalogError::PresentationNotFound` for an unknown id and
/// `CatalogError::Storage` on repository failures.
pub(crate) async fn presentation_data(
    presentations: &dyn PresentationRepository,
    slides: &dyn SlideRepository,
    id: &PresentationId,
) -> Result<PresentationData, CatalogError> {
    let presentation = presentations
        .get_presentation(id)
        .await?
        .ok_or_else(|| CatalogError::PresentationNotFound(id.clone()))?;
    let slides = slides
        .slides_for_presentation(presentation.id())
        .await?
        .iter()
        .map(SlideRecord::from_domain)
        .collect();

    Ok(PresentationData {
        presentation: PresentationRecord::from_domain(&presentation),
        slides,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use medrep_core::model::{Session, SessionId, SlideId, SlideTiming};
    use medrep_core::time::fixed_now;
    use storage::seed;

    async fn storage_with_one_completed_session() -> Storage {
        let storage = Storage::in_memory_seeded(fixed_now());
        let session = Session::begin(
            SessionId::new("s-1"),
            DoctorId::new(seed::DOCTOR_1_ID),
            PresentationId::new(seed::PRESENTATION_1_ID),
            fixed_now(),
        );
        storage.sessions.insert_session(&session).await.unwrap();
        storage
            .sessions
            .complete_session(
                session.id(),
                fixed_now() + Duration::seconds(35),
                &[
                    SlideTiming {
                        slide_id: SlideId::new("slide-1-0"),
                        time_spent_ms: 20_000,
                    },
                    SlideTiming {
                        slide_id: SlideId::new("slide-1-1"),
                        time_spent_ms: 15_000,
                    },
                ],
            )
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn analytics_surface_has_all_five_sections() {
        let storage = storage_with_one_completed_session().await;
        let service = AnalyticsService::from_storage(&storage);

        let data = service.analytics().await.unwrap();
        assert_eq!(data.doctors.len(), 2);
        assert_eq!(data.presentations.len(), 2);
        assert_eq!(data.recent_sessions.len(), 1);
        assert_eq!(data.top_slides.len(), 2);
        assert_eq!(data.all_slide_analytics.len(), 2);

        let item = &data.recent_sessions[0];
        assert_eq!(item.doctor.id.as_str(), seed::DOCTOR_1_ID);
        assert_eq!(item.slides, 2);
    }

    #[tokio::test]
    async fn analytics_surface_serializes_with_expected_keys() {
        let storage = storage_with_one_completed_session().await;
        let service = AnalyticsService::from_storage(&storage);

        let data = service.analytics().await.unwrap();
        let json = serde_json::to_value(&data).unwrap();

        assert!(json.get("recentSessions").is_some());
        assert!(json.get("topSlides").is_some());
        assert!(json.get("allSlideAnalytics").is_some());
        assert!(json["topSlides"][0].get("avgTimeSpent").is_some());
        assert!(json["recentSessions"][0]["session"].get("totalTime").is_some());
    }

    #[tokio::test]
    async fn dashboard_counts_recent_sessions() {
        let storage = storage_with_one_completed_session().await;
        let service = AnalyticsService::from_storage(&storage);

        let data = service.dashboard().await.unwrap();
        assert_eq!(data.total_sessions, 1);
        assert_eq!(data.doctors.len(), 2);
    }

    #[tokio::test]
    async fn start_page_lists_both_collections() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let service = AnalyticsService::from_storage(&storage);

        let data = service.start_page().await.unwrap();
        assert_eq!(data.doctors.len(), 2);
        assert_eq!(data.presentations.len(), 2);
    }

    #[tokio::test]
    async fn presentation_data_fetches_deck_in_order() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let data = presentation_data(
            storage.presentations.as_ref(),
            storage.slides.as_ref(),
            &PresentationId::new(seed::PRESENTATION_1_ID),
        )
        .await
        .unwrap();

        assert_eq!(data.slides.len(), 6);
        assert!(data.slides.windows(2).all(|w| w[0].order < w[1].order));

        let err = presentation_data(
            storage.presentations.as_ref(),
            storage.slides.as_ref(),
            &PresentationId::new("presentation-404"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CatalogError::PresentationNotFound(_)));
    }
}

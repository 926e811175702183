use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use medrep_core::model::{DoctorId, PresentationId, Session, SlideId};
use storage::repository::{
    DoctorRecord, DoctorRepository, PresentationRecord, PresentationRepository, SessionRecord,
    SessionRepository, SlideAnalyticRepository, SlideRecord, SlideRepository,
};

use crate::error::AnalyticsError;
use crate::view::{SessionListItem, SlideStats};

/// Storage-backed read-side joins for the analytics and dashboard surfaces.
pub(crate) struct AnalyticsQueries;

impl AnalyticsQueries {
    /// Completed sessions, newest first, joined with their doctor and
    /// presentation and the number of distinct slides visited. Sessions
    /// whose doctor or presentation cannot be joined are dropped; that
    /// should not happen while starts validate both ids.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn recent_sessions(
        sessions: &dyn SessionRepository,
        analytics: &dyn SlideAnalyticRepository,
        doctors: &dyn DoctorRepository,
        presentations: &dyn PresentationRepository,
        limit: usize,
    ) -> Result<Vec<SessionListItem>, AnalyticsError> {
        let mut completed: Vec<Session> = sessions
            .list_sessions()
            .await?
            .into_iter()
            .filter(Session::is_complete)
            .collect();
        completed.sort_by(|a, b| {
            let a_ended = a.completion().map(|c| c.ended_at());
            let b_ended = b.completion().map(|c| c.ended_at());
            b_ended.cmp(&a_ended)
        });
        completed.truncate(limit);

        let mut items = Vec::with_capacity(completed.len());
        for session in completed {
            let Some(doctor) = doctors.get_doctor(session.doctor_id()).await? else {
                log::warn!("dropping session {}: doctor missing", session.id());
                continue;
            };
            let Some(presentation) = presentations
                .get_presentation(session.presentation_id())
                .await?
            else {
                log::warn!("dropping session {}: presentation missing", session.id());
                continue;
            };

            let visited: HashSet<SlideId> = analytics
                .analytics_for_session(session.id())
                .await?
                .into_iter()
                .map(|a| a.slide_id().clone())
                .collect();
            let duration = session
                .completion()
                .map(|c| c.total_time_secs())
                .unwrap_or_default();

            items.push(SessionListItem {
                session: SessionRecord::from_domain(&session),
                doctor: DoctorRecord::from_domain(&doctor),
                presentation: PresentationRecord::from_domain(&presentation),
                slides: visited.len(),
                duration,
            });
        }

        Ok(items)
    }

    /// Every recorded analytic row grouped by slide, ranked by average
    /// dwell time per view, descending. Purely a function of the analytics
    /// at call time; ranking does not normalize for view counts.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn top_slides(
        analytics: &dyn SlideAnalyticRepository,
        slides: &dyn SlideRepository,
        limit: usize,
    ) -> Result<Vec<SlideStats>, AnalyticsError> {
        let rows = analytics.list_analytics().await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Group in first-seen order so the later stable sort keeps ties
        // deterministic.
        let mut order: Vec<SlideId> = Vec::new();
        let mut totals: HashMap<SlideId, (u64, u32)> = HashMap::new();
        for row in rows {
            let entry = totals.entry(row.slide_id().clone()).or_insert_with(|| {
                order.push(row.slide_id().clone());
                (0, 0)
            });
            entry.0 += row.time_spent_ms();
            entry.1 += 1;
        }

        let mut stats = Vec::with_capacity(order.len());
        for slide_id in order {
            let Some(slide) = slides.get_slide(&slide_id).await? else {
                log::warn!("dropping analytics for missing slide {slide_id}");
                continue;
            };
            let (total, views) = totals[&slide_id];
            stats.push(SlideStats::new(
                SlideRecord::from_domain(&slide),
                total,
                views,
            ));
        }

        stats.sort_by(|a, b| {
            b.avg_time_spent
                .partial_cmp(&a.avg_time_spent)
                .unwrap_or(Ordering::Equal)
        });
        stats.truncate(limit);
        Ok(stats)
    }

    /// Per-slide usage for one presentation, in deck order, including
    /// slides with no recorded time (zero-initialized).
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn slide_usage_for_presentation(
        slides: &dyn SlideRepository,
        analytics: &dyn SlideAnalyticRepository,
        presentation_id: &PresentationId,
    ) -> Result<Vec<SlideStats>, AnalyticsError> {
        let deck = slides.slides_for_presentation(presentation_id).await?;
        let mut stats = Vec::with_capacity(deck.len());
        for slide in deck {
            let rows = analytics.analytics_for_slide(slide.id()).await?;
            let total: u64 = rows.iter().map(|r| r.time_spent_ms()).sum();
            #[allow(clippy::cast_possible_truncation)]
            let views = rows.len() as u32;
            stats.push(SlideStats::new(
                SlideRecord::from_domain(&slide),
                total,
                views,
            ));
        }
        Ok(stats)
    }

    /// A doctor's sessions in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn sessions_for_doctor(
        sessions: &dyn SessionRepository,
        id: &DoctorId,
    ) -> Result<Vec<SessionRecord>, AnalyticsError> {
        Ok(sessions
            .sessions_for_doctor(id)
            .await?
            .iter()
            .map(SessionRecord::from_domain)
            .collect())
    }

    /// A presentation's sessions in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn sessions_for_presentation(
        sessions: &dyn SessionRepository,
        id: &PresentationId,
    ) -> Result<Vec<SessionRecord>, AnalyticsError> {
        Ok(sessions
            .sessions_for_presentation(id)
            .await?
            .iter()
            .map(SessionRecord::from_domain)
            .collect())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

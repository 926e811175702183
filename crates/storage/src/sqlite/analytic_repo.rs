use medrep_core::model::{SessionId, SlideAnalytic, SlideId};

use super::SqliteRepository;
use super::mapping::{conn, map_analytic_row};
use crate::repository::{SlideAnalyticRepository, StorageError};

#[async_trait::async_trait]
impl SlideAnalyticRepository for SqliteRepository {
    async fn list_analytics(&self) -> Result<Vec<SlideAnalytic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, session_id, slide_id, time_spent_ms
            FROM slide_analytics
            ORDER BY rowid ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut analytics = Vec::with_capacity(rows.len());
        for row in rows {
            analytics.push(map_analytic_row(&row)?);
        }
        Ok(analytics)
    }

    async fn analytics_for_session(
        &self,
        id: &SessionId,
    ) -> Result<Vec<SlideAnalytic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, session_id, slide_id, time_spent_ms
            FROM slide_analytics
            WHERE session_id = ?1
            ORDER BY rowid ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut analytics = Vec::with_capacity(rows.len());
        for row in rows {
            analytics.push(map_analytic_row(&row)?);
        }
        Ok(analytics)
    }

    async fn analytics_for_slide(&self, id: &SlideId) -> Result<Vec<SlideAnalytic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, session_id, slide_id, time_spent_ms
            FROM slide_analytics
            WHERE slide_id = ?1
            ORDER BY rowid ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut analytics = Vec::with_capacity(rows.len());
        for row in rows {
            analytics.push(map_analytic_row(&row)?);
        }
        Ok(analytics)
    }
}

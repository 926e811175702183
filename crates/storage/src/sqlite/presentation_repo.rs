use medrep_core::model::{Presentation, PresentationId};

use super::SqliteRepository;
use super::mapping::{conn, map_presentation_row};
use crate::repository::{PresentationRepository, StorageError};

#[async_trait::async_trait]
impl PresentationRepository for SqliteRepository {
    async fn upsert_presentation(&self, presentation: &Presentation) -> Result<(), StorageError> {
        let rollup = presentation.rollup();
        sqlx::query(
            r"
            INSERT INTO presentations (
                id, title, description, slide_count, status, created_at,
                sessions, avg_engagement, last_used
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                slide_count = excluded.slide_count,
                status = excluded.status,
                sessions = excluded.sessions,
                avg_engagement = excluded.avg_engagement,
                last_used = excluded.last_used
            ",
        )
        .bind(presentation.id().as_str())
        .bind(presentation.title())
        .bind(presentation.description())
        .bind(i64::from(presentation.slide_count()))
        .bind(presentation.status().as_str())
        .bind(presentation.created_at())
        .bind(i64::from(rollup.sessions()))
        .bind(i64::from(rollup.avg_engagement().value()))
        .bind(rollup.last_ended())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Option<Presentation>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, slide_count, status, created_at,
                   sessions, avg_engagement, last_used
            FROM presentations WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_presentation_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_presentations(&self) -> Result<Vec<Presentation>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, slide_count, status, created_at,
                   sessions, avg_engagement, last_used
            FROM presentations
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut presentations = Vec::with_capacity(rows.len());
        for row in rows {
            presentations.push(map_presentation_row(&row)?);
        }
        Ok(presentations)
    }
}

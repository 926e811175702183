use medrep_core::model::{PresentationId, Slide, SlideId};

use super::SqliteRepository;
use super::mapping::{conn, map_slide_row};
use crate::repository::{SlideRepository, StorageError};

#[async_trait::async_trait]
impl SlideRepository for SqliteRepository {
    async fn insert_slides(&self, slides: &[Slide]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        for slide in slides {
            sqlx::query(
                r"
                INSERT INTO slides (id, presentation_id, title, content, image_url, ord)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    presentation_id = excluded.presentation_id,
                    title = excluded.title,
                    content = excluded.content,
                    image_url = excluded.image_url,
                    ord = excluded.ord
                ",
            )
            .bind(slide.id().as_str())
            .bind(slide.presentation_id().as_str())
            .bind(slide.title())
            .bind(slide.content())
            .bind(slide.image().as_str())
            .bind(i64::from(slide.order()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_slide(&self, id: &SlideId) -> Result<Option<Slide>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, presentation_id, title, content, image_url, ord
            FROM slides WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_slide_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn slides_for_presentation(
        &self,
        presentation_id: &PresentationId,
    ) -> Result<Vec<Slide>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, presentation_id, title, content, image_url, ord
            FROM slides
            WHERE presentation_id = ?1
            ORDER BY ord ASC
            ",
        )
        .bind(presentation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut slides = Vec::with_capacity(rows.len());
        for row in rows {
            slides.push(map_slide_row(&row)?);
        }
        Ok(slides)
    }
}

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, Transaction};

use medrep_core::model::{
    DoctorId, EngagementRollup, PresentationId, Session, SessionId, SessionStateError,
    SlideAnalytic, SlideTiming,
};

use super::SqliteRepository;
use super::mapping::{conn, duration_to_secs, insert_err, map_session_row};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str =
    "id, doctor_id, presentation_id, started_at, ended_at, total_time_secs, engagement";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sessions (
                id, doctor_id, presentation_id, started_at,
                ended_at, total_time_secs, engagement
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(session.id().as_str())
        .bind(session.doctor_id().as_str())
        .bind(session.presentation_id().as_str())
        .bind(session.started_at())
        .bind(session.completion().map(|c| c.ended_at()))
        .bind(session.completion().map(|c| c.total_time_secs()))
        .bind(
            session
                .completion()
                .map(|c| i64::from(c.engagement().value())),
        )
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_session_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_session_row(&row)?);
        }
        Ok(sessions)
    }

    async fn sessions_for_doctor(&self, id: &DoctorId) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE doctor_id = ?1
             ORDER BY started_at ASC, id ASC"
        ))
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_session_row(&row)?);
        }
        Ok(sessions)
    }

    async fn sessions_for_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE presentation_id = ?1
             ORDER BY started_at ASC, id ASC"
        ))
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_session_row(&row)?);
        }
        Ok(sessions)
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        timings: &[SlideTiming],
    ) -> Result<Session, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let mut session = map_session_row(&row)?;
        let recorded_ms: u64 = timings.iter().map(|t| t.time_spent_ms).sum();
        let recorded = Duration::milliseconds(i64::try_from(recorded_ms).unwrap_or(i64::MAX));
        session.complete(ended_at, recorded).map_err(|e| match e {
            SessionStateError::AlreadyEnded => StorageError::Conflict,
            SessionStateError::EndBeforeStart => StorageError::Serialization(e.to_string()),
            _ => StorageError::Serialization(e.to_string()),
        })?;
        let completion = *session
            .completion()
            .ok_or_else(|| StorageError::Serialization("completion missing after end".into()))?;

        sqlx::query(
            r"
            UPDATE sessions
            SET ended_at = ?2, total_time_secs = ?3, engagement = ?4
            WHERE id = ?1
            ",
        )
        .bind(session.id().as_str())
        .bind(completion.ended_at())
        .bind(completion.total_time_secs())
        .bind(i64::from(completion.engagement().value()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for timing in timings {
            let analytic = SlideAnalytic::from_timing(session.id().clone(), timing);
            sqlx::query(
                r"
                INSERT INTO slide_analytics (id, session_id, slide_id, time_spent_ms)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(analytic.id().as_str())
            .bind(analytic.session_id().as_str())
            .bind(analytic.slide_id().as_str())
            .bind(
                i64::try_from(analytic.time_spent_ms())
                    .map_err(|_| StorageError::Serialization("time_spent_ms overflow".into()))?,
            )
            .execute(&mut *tx)
            .await
            .map_err(insert_err)?;
        }

        recompute_doctor_rollup(&mut tx, session.doctor_id()).await?;
        recompute_presentation_rollup(&mut tx, session.presentation_id()).await?;

        tx.commit().await.map_err(conn)?;
        Ok(session)
    }
}

async fn recompute_doctor_rollup(
    tx: &mut Transaction<'_, Sqlite>,
    id: &DoctorId,
) -> Result<(), StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE doctor_id = ?1"
    ))
    .bind(id.as_str())
    .fetch_all(&mut **tx)
    .await
    .map_err(conn)?;

    let mut history = Vec::with_capacity(rows.len());
    for row in rows {
        history.push(map_session_row(&row)?);
    }
    let rollup = EngagementRollup::from_sessions(&history);

    let updated = sqlx::query(
        r"
        UPDATE doctors
        SET sessions = ?2, avg_engagement = ?3, last_session = ?4, total_time_secs = ?5
        WHERE id = ?1
        ",
    )
    .bind(id.as_str())
    .bind(i64::from(rollup.sessions()))
    .bind(i64::from(rollup.avg_engagement().value()))
    .bind(rollup.last_ended())
    .bind(duration_to_secs(rollup.total_time()))
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    if updated.rows_affected() == 0 {
        log::warn!("doctor {id} missing during rollup recompute");
    }
    Ok(())
}

async fn recompute_presentation_rollup(
    tx: &mut Transaction<'_, Sqlite>,
    id: &PresentationId,
) -> Result<(), StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE presentation_id = ?1"
    ))
    .bind(id.as_str())
    .fetch_all(&mut **tx)
    .await
    .map_err(conn)?;

    let mut history = Vec::with_capacity(rows.len());
    for row in rows {
        history.push(map_session_row(&row)?);
    }
    let rollup = EngagementRollup::from_sessions(&history);

    let updated = sqlx::query(
        r"
        UPDATE presentations
        SET sessions = ?2, avg_engagement = ?3, last_used = ?4
        WHERE id = ?1
        ",
    )
    .bind(id.as_str())
    .bind(i64::from(rollup.sessions()))
    .bind(i64::from(rollup.avg_engagement().value()))
    .bind(rollup.last_ended())
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    if updated.rows_affected() == 0 {
        log::warn!("presentation {id} missing during rollup recompute");
    }
    Ok(())
}

use medrep_core::model::{Doctor, DoctorId};

use super::SqliteRepository;
use super::mapping::{conn, duration_to_secs, map_doctor_row};
use crate::repository::{DoctorRepository, StorageError};

#[async_trait::async_trait]
impl DoctorRepository for SqliteRepository {
    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), StorageError> {
        let rollup = doctor.rollup();
        sqlx::query(
            r"
            INSERT INTO doctors (
                id, name, specialty, email, phone, status,
                sessions, avg_engagement, last_session, total_time_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                specialty = excluded.specialty,
                email = excluded.email,
                phone = excluded.phone,
                status = excluded.status,
                sessions = excluded.sessions,
                avg_engagement = excluded.avg_engagement,
                last_session = excluded.last_session,
                total_time_secs = excluded.total_time_secs
            ",
        )
        .bind(doctor.id().as_str())
        .bind(doctor.name())
        .bind(doctor.specialty())
        .bind(doctor.email())
        .bind(doctor.phone())
        .bind(doctor.status().as_str())
        .bind(i64::from(rollup.sessions()))
        .bind(i64::from(rollup.avg_engagement().value()))
        .bind(rollup.last_ended())
        .bind(duration_to_secs(rollup.total_time()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_doctor(&self, id: &DoctorId) -> Result<Option<Doctor>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, specialty, email, phone, status,
                   sessions, avg_engagement, last_session, total_time_secs
            FROM doctors WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_doctor_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, specialty, email, phone, status,
                   sessions, avg_engagement, last_session, total_time_secs
            FROM doctors
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut doctors = Vec::with_capacity(rows.len());
        for row in rows {
            doctors.push(map_doctor_row(&row)?);
        }
        Ok(doctors)
    }
}

use chrono::Duration;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use medrep_core::Engagement;
use medrep_core::model::{
    AnalyticId, Doctor, DoctorId, DoctorStatus, EngagementRollup, ImageSource, Presentation,
    PresentationId, PresentationStatus, Session, SessionId, Slide, SlideAnalytic, SlideId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps an insert failure, surfacing unique-key violations as conflicts.
pub(crate) fn insert_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn engagement_from_i64(v: i64) -> Result<Engagement, StorageError> {
    let value =
        u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid engagement: {v}")))?;
    Ok(Engagement::new(value))
}

pub(crate) fn duration_from_secs(field: &'static str, secs: f64) -> Result<Duration, StorageError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(StorageError::Serialization(format!(
            "invalid {field}: {secs}"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    let ms = (secs * 1000.0).round() as i64;
    Ok(Duration::milliseconds(ms))
}

pub(crate) fn duration_to_secs(duration: Duration) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let ms = duration.num_milliseconds() as f64;
    ms / 1000.0
}

pub(crate) fn parse_doctor_status(s: &str) -> Result<DoctorStatus, StorageError> {
    match s {
        "active" => Ok(DoctorStatus::Active),
        "inactive" => Ok(DoctorStatus::Inactive),
        _ => Err(StorageError::Serialization(format!(
            "invalid doctor status: {s}"
        ))),
    }
}

pub(crate) fn parse_presentation_status(s: &str) -> Result<PresentationStatus, StorageError> {
    match s {
        "active" => Ok(PresentationStatus::Active),
        "draft" => Ok(PresentationStatus::Draft),
        _ => Err(StorageError::Serialization(format!(
            "invalid presentation status: {s}"
        ))),
    }
}

pub(crate) fn map_doctor_row(row: &SqliteRow) -> Result<Doctor, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;
    let rollup = EngagementRollup::from_persisted(
        u32_from_i64("sessions", row.try_get::<i64, _>("sessions").map_err(ser)?)?,
        engagement_from_i64(row.try_get::<i64, _>("avg_engagement").map_err(ser)?)?,
        row.try_get("last_session").map_err(ser)?,
        duration_from_secs(
            "total_time_secs",
            row.try_get::<f64, _>("total_time_secs").map_err(ser)?,
        )?,
    );

    Doctor::from_persisted(
        DoctorId::new(row.try_get::<String, _>("id").map_err(ser)?),
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("specialty").map_err(ser)?,
        row.try_get::<String, _>("email").map_err(ser)?,
        row.try_get::<String, _>("phone").map_err(ser)?,
        parse_doctor_status(status_str.as_str())?,
        rollup,
    )
    .map_err(ser)
}

pub(crate) fn map_presentation_row(row: &SqliteRow) -> Result<Presentation, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;
    let rollup = EngagementRollup::from_persisted(
        u32_from_i64("sessions", row.try_get::<i64, _>("sessions").map_err(ser)?)?,
        engagement_from_i64(row.try_get::<i64, _>("avg_engagement").map_err(ser)?)?,
        row.try_get("last_used").map_err(ser)?,
        Duration::zero(),
    );

    Presentation::from_persisted(
        PresentationId::new(row.try_get::<String, _>("id").map_err(ser)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        u32_from_i64(
            "slide_count",
            row.try_get::<i64, _>("slide_count").map_err(ser)?,
        )?,
        parse_presentation_status(status_str.as_str())?,
        row.try_get("created_at").map_err(ser)?,
        rollup,
    )
    .map_err(ser)
}

pub(crate) fn map_slide_row(row: &SqliteRow) -> Result<Slide, StorageError> {
    let image = ImageSource::parse(row.try_get::<String, _>("image_url").map_err(ser)?)
        .map_err(ser)?;
    Slide::new(
        SlideId::new(row.try_get::<String, _>("id").map_err(ser)?),
        PresentationId::new(row.try_get::<String, _>("presentation_id").map_err(ser)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("content").map_err(ser)?,
        image,
        u32_from_i64("ord", row.try_get::<i64, _>("ord").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let ended_at: Option<chrono::DateTime<chrono::Utc>> =
        row.try_get("ended_at").map_err(ser)?;
    let completion = match ended_at {
        None => None,
        Some(ended_at) => {
            let secs: f64 = row
                .try_get::<Option<f64>, _>("total_time_secs")
                .map_err(ser)?
                .ok_or_else(|| {
                    StorageError::Serialization("session has ended_at but no total_time".into())
                })?;
            let engagement = engagement_from_i64(
                row.try_get::<Option<i64>, _>("engagement")
                    .map_err(ser)?
                    .unwrap_or(0),
            )?;
            Some((
                ended_at,
                duration_from_secs("total_time_secs", secs)?,
                engagement,
            ))
        }
    };

    Session::from_persisted(
        SessionId::new(row.try_get::<String, _>("id").map_err(ser)?),
        DoctorId::new(row.try_get::<String, _>("doctor_id").map_err(ser)?),
        PresentationId::new(row.try_get::<String, _>("presentation_id").map_err(ser)?),
        row.try_get("started_at").map_err(ser)?,
        completion,
    )
    .map_err(ser)
}

pub(crate) fn map_analytic_row(row: &SqliteRow) -> Result<SlideAnalytic, StorageError> {
    let time_spent_i64: i64 = row.try_get("time_spent_ms").map_err(ser)?;
    let time_spent_ms = u64::try_from(time_spent_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid time_spent_ms: {time_spent_i64}"))
    })?;
    Ok(SlideAnalytic::new(
        AnalyticId::new(row.try_get::<String, _>("id").map_err(ser)?),
        SessionId::new(row.try_get::<String, _>("session_id").map_err(ser)?),
        SlideId::new(row.try_get::<String, _>("slide_id").map_err(ser)?),
        time_spent_ms,
    ))
}

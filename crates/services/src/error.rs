//! Shared error types for the services crate.

use thiserror::Error;

use medrep_core::model::{DoctorId, PresentationError, PresentationId, SessionId, SlideError};
use storage::repository::StorageError;

/// Errors emitted by the session lifecycle (recorder + workflow).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("doctor not found: {0}")]
    DoctorNotFound(DoctorId),

    #[error("presentation not found: {0}")]
    PresentationNotFound(PresentationId),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("presentation has no slides")]
    NoSlides,

    #[error("slide index {index} out of range for {count} slides")]
    SlideOutOfRange { index: usize, count: usize },

    #[error("session has already ended")]
    AlreadyEnded,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnalyticsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyticsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Presentation(#[from] PresentationError),

    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error("presentation not found: {0}")]
    PresentationNotFound(PresentationId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

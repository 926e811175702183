use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::PresentationId;
use crate::model::session::EngagementRollup;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PresentationError {
    #[error("presentation title cannot be empty")]
    EmptyTitle,
}

/// Whether a content deck is ready to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationStatus {
    Active,
    Draft,
}

impl PresentationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PresentationStatus::Active => "active",
            PresentationStatus::Draft => "draft",
        }
    }
}

/// A content deck, with the engagement rollup recomputed after each
/// completed session. The slide rows themselves live separately; this only
/// carries the advertised slide count.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    id: PresentationId,
    title: String,
    description: Option<String>,
    slide_count: u32,
    status: PresentationStatus,
    created_at: DateTime<Utc>,
    rollup: EngagementRollup,
}

impl Presentation {
    /// Creates a new presentation with an empty engagement rollup.
    ///
    /// # Errors
    ///
    /// Returns `PresentationError::EmptyTitle` if the title is blank.
    pub fn new(
        id: PresentationId,
        title: impl Into<String>,
        description: Option<String>,
        slide_count: u32,
        status: PresentationStatus,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PresentationError> {
        Self::from_persisted(
            id,
            title,
            description,
            slide_count,
            status,
            created_at,
            EngagementRollup::zero(),
        )
    }

    /// Rehydrates a presentation from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `PresentationError::EmptyTitle` if the title is blank.
    pub fn from_persisted(
        id: PresentationId,
        title: impl Into<String>,
        description: Option<String>,
        slide_count: u32,
        status: PresentationStatus,
        created_at: DateTime<Utc>,
        rollup: EngagementRollup,
    ) -> Result<Self, PresentationError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(PresentationError::EmptyTitle);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            title,
            description,
            slide_count,
            status,
            created_at,
            rollup,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &PresentationId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn slide_count(&self) -> u32 {
        self.slide_count
    }

    #[must_use]
    pub fn status(&self) -> PresentationStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn rollup(&self) -> &EngagementRollup {
        &self.rollup
    }

    /// Replaces the rollup after a session-end recompute.
    pub fn apply_rollup(&mut self, rollup: EngagementRollup) {
        self.rollup = rollup;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn new_rejects_empty_title() {
        let err = Presentation::new(
            PresentationId::new("presentation-1"),
            "   ",
            None,
            6,
            PresentationStatus::Active,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, PresentationError::EmptyTitle);
    }

    #[test]
    fn new_filters_blank_description() {
        let presentation = Presentation::new(
            PresentationId::new("presentation-1"),
            "Cardiomax Treatment Protocol",
            Some("   ".into()),
            6,
            PresentationStatus::Active,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(presentation.description(), None);
        assert_eq!(presentation.slide_count(), 6);
        assert_eq!(presentation.rollup().sessions(), 0);
    }
}

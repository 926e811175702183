use std::sync::Arc;

use medrep_core::Clock;
use medrep_core::model::{
    ImageSource, Presentation, PresentationId, PresentationStatus, Slide, SlideId,
};
use storage::repository::{PresentationRepository, SlideRepository, Storage};

use crate::error::CatalogError;
use crate::view::{self, PresentationData};

/// The generated outline every uploaded presentation starts with.
const OUTLINE: [(&str, &str); 5] = [
    (
        "Introduction",
        "Overview of medications and their mechanisms of action.",
    ),
    ("Key Benefits", "Primary benefits and clinical outcomes."),
    (
        "Dosage Information",
        "Recommended dosages and administration guidelines.",
    ),
    (
        "Side Effects",
        "Potential side effects and contraindications.",
    ),
    (
        "Clinical Studies",
        "Summary of clinical trial results and efficacy data.",
    ),
];

/// Content-deck management: creating presentations and fetching a deck for
/// the viewer.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    presentations: Arc<dyn PresentationRepository>,
    slides: Arc<dyn SlideRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        presentations: Arc<dyn PresentationRepository>,
        slides: Arc<dyn SlideRepository>,
    ) -> Self {
        Self {
            clock,
            presentations,
            slides,
        }
    }

    /// Convenience constructor over a `Storage` aggregate.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.presentations),
            Arc::clone(&storage.slides),
        )
    }

    /// Creates a presentation with the standard five-slide outline and
    /// placeholder imagery, returning the new deck.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Presentation` for an invalid title and
    /// `CatalogError::Storage` on repository failures.
    pub async fn create_presentation(
        &self,
        title: &str,
        description: Option<String>,
    ) -> Result<PresentationData, CatalogError> {
        let now = self.clock.now();
        #[allow(clippy::cast_possible_truncation)]
        let presentation = Presentation::new(
            PresentationId::generate(),
            title,
            description,
            OUTLINE.len() as u32,
            PresentationStatus::Active,
            now,
        )?;

        let mut slides = Vec::with_capacity(OUTLINE.len());
        for (order, (slide_title, content)) in OUTLINE.into_iter().enumerate() {
            let slide_title = if order == 0 {
                format!("{slide_title} to {}", presentation.title())
            } else {
                slide_title.to_owned()
            };
            let image = ImageSource::parse(format!(
                "/placeholder.svg?height=400&width=600&text={}",
                slide_title.replace(' ', "+")
            ))?;
            #[allow(clippy::cast_possible_truncation)]
            let slide = Slide::new(
                SlideId::generate(),
                presentation.id().clone(),
                slide_title,
                content,
                image,
                order as u32,
            )?;
            slides.push(slide);
        }

        self.presentations.upsert_presentation(&presentation).await?;
        self.slides.insert_slides(&slides).await?;
        log::debug!(
            "presentation {} created with {} slides",
            presentation.id(),
            slides.len()
        );

        view::presentation_data(
            self.presentations.as_ref(),
            self.slides.as_ref(),
            presentation.id(),
        )
        .await
    }

    /// Fetches a presentation and its ordered slides, the viewer fetch.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::PresentationNotFound` for an unknown id and
    /// `CatalogError::Storage` on repository failures.
    pub async fn presentation_data(
        &self,
        id: &PresentationId,
    ) -> Result<PresentationData, CatalogError> {
        view::presentation_data(self.presentations.as_ref(), self.slides.as_ref(), id).await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use medrep_core::time::{fixed_clock, fixed_now};

    #[tokio::test]
    async fn create_presentation_builds_the_outline() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let service = CatalogService::from_storage(fixed_clock(), &storage);

        let data = service
            .create_presentation("Neurozen Launch", Some("CNS portfolio".into()))
            .await
            .unwrap();

        assert_eq!(data.presentation.title, "Neurozen Launch");
        assert_eq!(data.presentation.slides, 5);
        assert_eq!(data.slides.len(), 5);
        assert_eq!(data.slides[0].title, "Introduction to Neurozen Launch");
        assert_eq!(data.slides[0].order, 0);
        assert!(data.slides[0].image_url.starts_with("/placeholder.svg?"));
        assert_eq!(data.slides[4].title, "Clinical Studies");

        // The new deck joins the two seeded ones.
        let listed = storage.presentations.list_presentations().await.unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn create_presentation_rejects_blank_title() {
        let storage = Storage::in_memory_seeded(fixed_now());
        let service = CatalogService::from_storage(fixed_clock(), &storage);

        let err = service.create_presentation("   ", None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Presentation(_)));

        let listed = storage.presentations.list_presentations().await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}

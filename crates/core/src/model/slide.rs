use thiserror::Error;
use url::Url;

use crate::model::ids::{PresentationId, SlideId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SlideError {
    #[error("slide title cannot be empty")]
    EmptyTitle,

    #[error("slide image reference cannot be empty")]
    EmptyImage,

    #[error("invalid image url: {0}")]
    InvalidImageUrl(String),
}

//
// ─── IMAGE SOURCE ──────────────────────────────────────────────────────────────
//

/// Where a slide's image comes from: a site-relative asset path (the common
/// case, e.g. `/slides/title.png`) or an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    SitePath(String),
    Url(Url),
}

impl ImageSource {
    /// Parses an image reference as persisted.
    ///
    /// # Errors
    ///
    /// Returns `SlideError::EmptyImage` for a blank reference and
    /// `SlideError::InvalidImageUrl` for a malformed absolute URL.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, SlideError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(SlideError::EmptyImage);
        }
        if raw.contains("://") {
            let url = Url::parse(raw).map_err(|_| SlideError::InvalidImageUrl(raw.to_owned()))?;
            return Ok(ImageSource::Url(url));
        }
        Ok(ImageSource::SitePath(raw.to_owned()))
    }

    /// Renders the reference exactly as it is persisted.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::SitePath(path) => path,
            ImageSource::Url(url) => url.as_str(),
        }
    }
}

//
// ─── SLIDE ─────────────────────────────────────────────────────────────────────
//

/// One slide of a presentation. Immutable after seeding/creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    id: SlideId,
    presentation_id: PresentationId,
    title: String,
    content: String,
    image: ImageSource,
    order: u32,
}

impl Slide {
    /// Creates a slide.
    ///
    /// # Errors
    ///
    /// Returns `SlideError::EmptyTitle` if the title is blank.
    pub fn new(
        id: SlideId,
        presentation_id: PresentationId,
        title: impl Into<String>,
        content: impl Into<String>,
        image: ImageSource,
        order: u32,
    ) -> Result<Self, SlideError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(SlideError::EmptyTitle);
        }

        Ok(Self {
            id,
            presentation_id,
            title,
            content: content.into(),
            image,
            order,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &SlideId {
        &self.id
    }

    #[must_use]
    pub fn presentation_id(&self) -> &PresentationId {
        &self.presentation_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn image(&self) -> &ImageSource {
        &self.image
    }

    /// Zero-based position within the deck.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_source_accepts_site_paths_and_urls() {
        let site = ImageSource::parse("/slides/title.png").unwrap();
        assert_eq!(site.as_str(), "/slides/title.png");
        assert!(matches!(site, ImageSource::SitePath(_)));

        let url = ImageSource::parse("https://cdn.example.com/deck/1.png").unwrap();
        assert!(matches!(url, ImageSource::Url(_)));
        assert_eq!(url.as_str(), "https://cdn.example.com/deck/1.png");
    }

    #[test]
    fn image_source_keeps_query_strings() {
        let placeholder = ImageSource::parse("/placeholder.svg?height=600&width=800").unwrap();
        assert_eq!(placeholder.as_str(), "/placeholder.svg?height=600&width=800");
    }

    #[test]
    fn image_source_rejects_bad_input() {
        assert_eq!(ImageSource::parse("  ").unwrap_err(), SlideError::EmptyImage);
        assert!(matches!(
            ImageSource::parse("http://[not-a-host/x.png").unwrap_err(),
            SlideError::InvalidImageUrl(_)
        ));
    }

    #[test]
    fn slide_rejects_empty_title() {
        let err = Slide::new(
            SlideId::new("slide-1-0"),
            PresentationId::new("presentation-1"),
            " ",
            "body",
            ImageSource::parse("/slides/title.png").unwrap(),
            0,
        )
        .unwrap_err();
        assert_eq!(err, SlideError::EmptyTitle);
    }

    #[test]
    fn slide_new_happy_path() {
        let slide = Slide::new(
            SlideId::new("slide-1-0"),
            PresentationId::new("presentation-1"),
            "Overview",
            "First look at the product",
            ImageSource::parse("/slides/slide-1.png").unwrap(),
            0,
        )
        .unwrap();
        assert_eq!(slide.order(), 0);
        assert_eq!(slide.presentation_id().as_str(), "presentation-1");
    }
}

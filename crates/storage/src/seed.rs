use chrono::{DateTime, Utc};

use medrep_core::model::{
    Doctor, DoctorId, DoctorStatus, ImageSource, Presentation, PresentationId,
    PresentationStatus, Slide, SlideId,
};

use crate::document::StoreDocument;
use crate::repository::{
    DoctorRecord, PresentationRecord, SlideRecord, Storage, StorageError,
};

/// Fixed ids for the seeded rows, so demo flows are scriptable.
pub const DOCTOR_1_ID: &str = "doctor-1";
pub const DOCTOR_2_ID: &str = "doctor-2";
pub const PRESENTATION_1_ID: &str = "presentation-1";
pub const PRESENTATION_2_ID: &str = "presentation-2";

const SLIDE_TITLES: [&str; 6] = [
    "Overview",
    "Clinical Indications",
    "Mechanism of Action",
    "Dosage Guidelines",
    "Safety Profile",
    "Patient Outcomes",
];

const SLIDE_CONTENT: [&str; 6] = [
    "Product introduction and positioning",
    "Primary indications and target patient groups",
    "How the compound works at the receptor level",
    "Recommended starting dose and titration schedule",
    "Common adverse reactions and monitoring guidance",
    "Headline results from the pivotal trials",
];

/// The two seeded doctors, with no sessions yet.
///
/// # Panics
///
/// Panics only if the seed literals fail validation, which would be a bug
/// in this module.
#[must_use]
pub fn initial_doctors() -> Vec<Doctor> {
    vec![
        Doctor::new(
            DoctorId::new(DOCTOR_1_ID),
            "Dr. Sarah Smith",
            "Cardiology",
            "sarah.smith@hospital.com",
            "+1 (555) 123-4567",
            DoctorStatus::Active,
        )
        .expect("seed doctor is valid"),
        Doctor::new(
            DoctorId::new(DOCTOR_2_ID),
            "Dr. Michael Johnson",
            "Endocrinology",
            "m.johnson@clinic.com",
            "+1 (555) 234-5678",
            DoctorStatus::Active,
        )
        .expect("seed doctor is valid"),
    ]
}

/// The two seeded presentations, six slides each, with no sessions yet.
///
/// # Panics
///
/// Panics only if the seed literals fail validation.
#[must_use]
pub fn initial_presentations(now: DateTime<Utc>) -> Vec<Presentation> {
    vec![
        Presentation::new(
            PresentationId::new(PRESENTATION_1_ID),
            "Cardiomax Treatment Protocol",
            Some("Cardiovascular medication protocol for hypertension patients".into()),
            6,
            PresentationStatus::Active,
            now,
        )
        .expect("seed presentation is valid"),
        Presentation::new(
            PresentationId::new(PRESENTATION_2_ID),
            "Glucobalance Therapy",
            Some("Diabetes management medication and treatment guidelines".into()),
            6,
            PresentationStatus::Active,
            now,
        )
        .expect("seed presentation is valid"),
    ]
}

/// The slides for both seeded presentations, in deck order.
///
/// # Panics
///
/// Panics only if the seed literals fail validation.
#[must_use]
pub fn initial_slides() -> Vec<Slide> {
    let mut slides = Vec::with_capacity(SLIDE_TITLES.len() * 2);
    for (deck_index, presentation_id) in [PRESENTATION_1_ID, PRESENTATION_2_ID]
        .into_iter()
        .enumerate()
    {
        let deck_number = deck_index + 1;
        for (order, (title, content)) in SLIDE_TITLES.iter().zip(SLIDE_CONTENT).enumerate() {
            let image = ImageSource::parse(format!(
                "/slides/deck-{deck_number}/slide-{order}.png"
            ))
            .expect("seed image path is valid");
            #[allow(clippy::cast_possible_truncation)]
            let slide = Slide::new(
                SlideId::new(format!("slide-{deck_number}-{order}")),
                PresentationId::new(presentation_id),
                format!("Slide {}: {title}", order + 1),
                content,
                image,
                order as u32,
            )
            .expect("seed slide is valid");
            slides.push(slide);
        }
    }
    slides
}

/// Builds the initial store document: seeded doctors, presentations and
/// slides, empty sessions and analytics.
#[must_use]
pub fn initial_document(now: DateTime<Utc>) -> StoreDocument {
    StoreDocument {
        doctors: initial_doctors()
            .iter()
            .map(DoctorRecord::from_domain)
            .collect(),
        presentations: initial_presentations(now)
            .iter()
            .map(PresentationRecord::from_domain)
            .collect(),
        slides: initial_slides()
            .iter()
            .map(SlideRecord::from_domain)
            .collect(),
        sessions: Vec::new(),
        slide_analytics: Vec::new(),
    }
}

/// Writes the initial data set through a `Storage`, whatever its backend.
/// Existing rows with the seeded ids are overwritten; everything else is
/// left alone.
///
/// # Errors
///
/// Returns `StorageError` if any write fails.
pub async fn apply(storage: &Storage, now: DateTime<Utc>) -> Result<(), StorageError> {
    for doctor in initial_doctors() {
        storage.doctors.upsert_doctor(&doctor).await?;
    }
    for presentation in initial_presentations(now) {
        storage.presentations.upsert_presentation(&presentation).await?;
    }
    storage.slides.insert_slides(&initial_slides()).await?;
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use medrep_core::time::fixed_now;

    #[test]
    fn initial_document_has_expected_shape() {
        let doc = initial_document(fixed_now());
        assert_eq!(doc.doctors.len(), 2);
        assert_eq!(doc.presentations.len(), 2);
        assert_eq!(doc.slides.len(), 12);
        assert!(doc.sessions.is_empty());
        assert!(doc.slide_analytics.is_empty());

        // Fresh rollups everywhere.
        assert!(doc.doctors.iter().all(|d| d.sessions == 0));
        assert!(doc.presentations.iter().all(|p| p.avg_engagement == 0));
    }

    #[test]
    fn slide_ids_encode_deck_and_order() {
        let slides = initial_slides();
        let first = &slides[0];
        assert_eq!(first.id().as_str(), "slide-1-0");
        assert_eq!(first.presentation_id().as_str(), PRESENTATION_1_ID);

        let last = &slides[11];
        assert_eq!(last.id().as_str(), "slide-2-5");
        assert_eq!(last.presentation_id().as_str(), PRESENTATION_2_ID);
        assert_eq!(last.order(), 5);
    }
}

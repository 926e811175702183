use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::DoctorId;
use crate::model::session::EngagementRollup;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DoctorError {
    #[error("doctor name cannot be empty")]
    EmptyName,

    #[error("doctor specialty cannot be empty")]
    EmptySpecialty,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

//
// ─── DOCTOR ────────────────────────────────────────────────────────────────────
//

/// Whether a doctor is an active target for presentation sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorStatus {
    Active,
    Inactive,
}

impl DoctorStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoctorStatus::Active => "active",
            DoctorStatus::Inactive => "inactive",
        }
    }
}

/// A doctor a sales rep presents to, together with the engagement rollup
/// recomputed after each completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct Doctor {
    id: DoctorId,
    name: String,
    specialty: String,
    email: String,
    phone: String,
    status: DoctorStatus,
    rollup: EngagementRollup,
}

impl Doctor {
    /// Creates a new doctor with an empty engagement rollup.
    ///
    /// # Errors
    ///
    /// Returns `DoctorError::EmptyName` / `EmptySpecialty` for blank fields
    /// and `DoctorError::InvalidEmail` when the address has no `@`.
    pub fn new(
        id: DoctorId,
        name: impl Into<String>,
        specialty: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        status: DoctorStatus,
    ) -> Result<Self, DoctorError> {
        Self::from_persisted(
            id,
            name,
            specialty,
            email,
            phone,
            status,
            EngagementRollup::zero(),
        )
    }

    /// Rehydrates a doctor from persisted storage.
    ///
    /// # Errors
    ///
    /// Same validation as [`Doctor::new`].
    pub fn from_persisted(
        id: DoctorId,
        name: impl Into<String>,
        specialty: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        status: DoctorStatus,
        rollup: EngagementRollup,
    ) -> Result<Self, DoctorError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DoctorError::EmptyName);
        }
        let specialty = specialty.into().trim().to_owned();
        if specialty.is_empty() {
            return Err(DoctorError::EmptySpecialty);
        }
        let email = email.into().trim().to_owned();
        if !email.contains('@') {
            return Err(DoctorError::InvalidEmail(email));
        }

        Ok(Self {
            id,
            name,
            specialty,
            email,
            phone: phone.into(),
            status,
            rollup,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &DoctorId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn specialty(&self) -> &str {
        &self.specialty
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    #[must_use]
    pub fn status(&self) -> DoctorStatus {
        self.status
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

    fn build(name: &str, specialty: &str, email: &str) -> Result<Doctor, DoctorError> {
        Doctor::new(
            DoctorId::new("doctor-1"),
            name,
            specialty,
            email,
            "+1 (555) 123-4567",
            DoctorStatus::Active,
        )
    }

    #[test]
    fn new_rejects_blank_fields() {
        assert_eq!(
            build("   ", "Cardiology", "a@b.com").unwrap_err(),
            DoctorError::EmptyName
        );
        assert_eq!(
            build("Dr. Sarah Smith", " ", "a@b.com").unwrap_err(),
            DoctorError::EmptySpecialty
        );
    }

    #[test]
    fn new_rejects_mailless_email() {
        let err = build("Dr. Sarah Smith", "Cardiology", "not-an-email").unwrap_err();
        assert!(matches!(err, DoctorError::InvalidEmail(_)));
    }

    #[test]
    fn new_trims_and_starts_with_zero_rollup() {
        let doctor = build("  Dr. Sarah Smith  ", "Cardiology", "sarah@hospital.com").unwrap();
        assert_eq!(doctor.name(), "Dr. Sarah Smith");
        assert_eq!(doctor.rollup().sessions(), 0);
        assert_eq!(doctor.rollup().last_ended(), None);
    }
}

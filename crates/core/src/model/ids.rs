use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a Doctor.
    DoctorId
);
string_id!(
    /// Unique identifier for a Presentation.
    PresentationId
);
string_id!(
    /// Unique identifier for a Slide.
    SlideId
);
string_id!(
    /// Unique identifier for a Session.
    SessionId
);
string_id!(
    /// Unique identifier for a recorded SlideAnalytic row.
    AnalyticId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_value() {
        let id = DoctorId::new("doctor-1");
        assert_eq!(id.to_string(), "doctor-1");
        assert_eq!(id.as_str(), "doctor-1");
    }

    #[test]
    fn generate_produces_distinct_ids() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn from_str_ref_wraps_value() {
        let id: SlideId = "slide-1-0".into();
        assert_eq!(id, SlideId::new("slide-1-0"));
    }
}

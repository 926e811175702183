mod doctor;
mod ids;
mod presentation;
mod session;
mod slide;

pub use ids::{AnalyticId, DoctorId, PresentationId, SessionId, SlideId};

pub use doctor::{Doctor, DoctorError, DoctorStatus};
pub use presentation::{Presentation, PresentationError, PresentationStatus};
pub use session::{
    EngagementRollup, Session, SessionCompletion, SessionStateError, SlideAnalytic, SlideTiming,
};
pub use slide::{ImageSource, Slide, SlideError};

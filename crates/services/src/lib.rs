#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
mod queries;
pub mod recorder;
pub mod view;
pub mod workflow;

pub use medrep_core::Clock;

pub use error::{AnalyticsError, CatalogError, SessionError};

pub use catalog::CatalogService;
pub use recorder::{RecorderState, SessionRecorder};
pub use view::{
    AnalyticsData, AnalyticsService, DashboardData, PresentationData, SessionListItem,
    SlideStats, StartPageData,
};
pub use workflow::{SessionLoopService, StartedSession};

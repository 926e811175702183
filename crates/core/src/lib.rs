#![forbid(unsafe_code)]

pub mod engagement;
pub mod model;
pub mod time;

pub use engagement::Engagement;
pub use time::Clock;

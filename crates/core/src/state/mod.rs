pub mod images;
pub mod mission_state;

pub use images::{ImageError, ImageRef};
pub use mission_state::{FileSummary, ImageSummary, MissionSnapshot, MissionState};

mod matcher;
mod preprocess;
pub mod types;

pub use matcher::{match_distance, score_hsv, score_rgb, smoothstep, HsvMatcher};
pub use preprocess::Preprocessor;
pub use types::{SegmentationMask, SegmentationModel};

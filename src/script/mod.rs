//! Script parsing: pause markers and segmentation.

pub mod pause;
pub mod segmenter;

pub use pause::PauseTable;
pub use segmenter::{MarkerPolicy, Segment, segment, segment_with_policy};

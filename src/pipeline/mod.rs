//! Batch speech pipeline.
//!
//! Segments → chunks → one backend request per chunk → stitched artifact.
//! A run is strictly sequential; independent runs may share a [`Stitcher`]
//! and with it the silence cache.

pub mod chunker;
pub mod debug;
pub mod orchestrator;
pub mod progress;
pub mod silence_cache;
pub mod stitcher;
pub mod types;

pub use chunker::chunk;
pub use debug::{BuildOptions, DebugMeta, DebugSink, DebugStage, MemorySink};
pub use orchestrator::Orchestrator;
pub use progress::{ProgressEvent, ProgressReporter, ProgressStage};
pub use silence_cache::{SilenceCache, SilenceFile};
pub use stitcher::Stitcher;
pub use types::{AudioPart, Chunk, FinalArtifact};

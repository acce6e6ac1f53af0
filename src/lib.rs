//! scriptvox - Scripted speech synthesis with pause markers
//!
//! Turns marked-up script text into one stitched audio file using a
//! pluggable speech backend and ffmpeg for normalization, silence,
//! concatenation and encoding.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod script;

// Core traits (script → backend → engine)
pub use backend::{BackendFactory, BackendRegistry, Capabilities, SpeechBackend};
pub use engine::{AudioEngine, CommandRunner, ProcessRunner};
pub use pipeline::{DebugSink, ProgressReporter};

// Pipeline
pub use conductor::Conductor;
pub use pipeline::{
    AudioPart, BuildOptions, Chunk, FinalArtifact, Orchestrator, ProgressEvent, SilenceCache,
    Stitcher,
};
pub use script::{MarkerPolicy, PauseTable, Segment};

// Error handling
pub use error::{Result, ScriptvoxError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

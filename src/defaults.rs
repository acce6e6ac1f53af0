//! Default configuration constants for scriptvox.
//!
//! Shared by the config layer and the pipeline stages so both agree on
//! the same numbers when a value is not configured.

/// Sample rate of every intermediate waveform, in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Bitrate of the final compressed artifact.
pub const OUTPUT_BITRATE: &str = "192k";

/// Codec used for the final compressed artifact.
pub const OUTPUT_CODEC: &str = "libmp3lame";

/// MIME type of the final artifact.
pub const OUTPUT_MIME_TYPE: &str = "audio/mpeg";

/// Characters reserved below a backend's request limit.
///
/// Leaves room for the `<speak>` wrapper and any rendering slack.
pub const CHUNK_SAFETY_MARGIN: usize = 16;

/// Bitrate assumed when a duration has to be estimated from byte size.
pub const ESTIMATE_BITRATE_KBPS: u32 = 128;

/// Maximum number of silence files kept by the silence cache.
pub const SILENCE_CACHE_CAPACITY: usize = 50;

/// Progress percentage reached once every chunk has been generated.
pub const PROGRESS_CEILING: u8 = 80;

/// Progress percentage covered by the early in-flight tick.
pub const PROGRESS_EARLY_CAP: u8 = 10;

// Stage deadlines, in milliseconds.
pub const GENERATE_TIMEOUT_MS: u64 = 60_000;
pub const STITCH_TIMEOUT_MS: u64 = 45_000;
pub const TRANSCODE_TIMEOUT_MS: u64 = 30_000;
pub const SILENCE_TIMEOUT_MS: u64 = 30_000;
pub const CONCAT_TIMEOUT_MS: u64 = 45_000;
pub const CONCAT_FALLBACK_TIMEOUT_MS: u64 = 60_000;
pub const ENCODE_TIMEOUT_MS: u64 = 45_000;
pub const PROBE_TIMEOUT_MS: u64 = 10_000;

/// Pause labels shipped with the default configuration.
pub const PAUSE_LABELS: &[(&str, f64)] = &[
    ("MICRO", 0.5),
    ("SHORT", 1.5),
    ("MEDIUM", 3.5),
    ("LONG", 8.0),
    ("FULL_BREATH", 5.0),
    ("HALF_BREATH", 3.0),
    ("SETTLE", 10.0),
    ("BREATH", 5.0),
];

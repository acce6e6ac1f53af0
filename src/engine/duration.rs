//! Measuring how long a chunk of generated audio plays.
//!
//! Backends usually report durations; when they don't, the bytes are written
//! to a temporary file and measured. Each method falls through to the next
//! one, ending in a bitrate estimate that cannot fail.

use crate::engine::ffmpeg::AudioEngine;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static FFMPEG_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d+):(\d+(?:\.\d+)?)").expect("duration regex")
});

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Duration implied by `byte_len` at a constant bitrate, rounded to 0.01 s.
pub fn estimate_duration(byte_len: usize, bitrate_kbps: u32) -> f64 {
    if bitrate_kbps == 0 {
        return 0.0;
    }
    round2((byte_len as f64 * 8.0) / (f64::from(bitrate_kbps) * 1000.0))
}

/// Exact duration of an in-memory WAV, if the bytes are one.
pub fn wav_duration(bytes: &[u8]) -> Option<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    // duration() counts frames (samples per channel).
    Some(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Parses the `Duration: HH:MM:SS.ss` line of an ffmpeg banner.
pub fn parse_ffmpeg_duration(banner: &str) -> Option<f64> {
    let caps = FFMPEG_DURATION_RE.captures(banner)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total > 0.0).then_some(total)
}

/// Measures `bytes`, trying WAV headers, ffprobe, the ffmpeg banner, and
/// finally a bitrate estimate.
pub async fn measure_duration(engine: &AudioEngine, bytes: &[u8], bitrate_kbps: u32) -> f64 {
    if let Some(secs) = wav_duration(bytes) {
        return round2(secs);
    }

    match write_scratch(bytes).await {
        Ok(file) => {
            if let Some(secs) = measure_file(engine, file.path()).await {
                return secs;
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Could not stage audio for measurement");
        }
    }

    let estimate = estimate_duration(bytes.len(), bitrate_kbps);
    tracing::debug!(
        bytes = bytes.len(),
        bitrate_kbps,
        estimate,
        "Falling back to bitrate duration estimate"
    );
    estimate
}

async fn measure_file(engine: &AudioEngine, path: &Path) -> Option<f64> {
    if let Some(secs) = engine.probe_duration(path).await {
        return Some(round2(secs));
    }
    let banner = engine.describe_input(path).await?;
    parse_ffmpeg_duration(&banner).map(round2)
}

async fn write_scratch(bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("scriptvox_measure_")
        .suffix(".mp3")
        .tempfile()?;
    tokio::fs::write(file.path(), bytes).await?;
    Ok(file)
}

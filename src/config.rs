use crate::defaults;
use crate::error::{Result, ScriptvoxError};
use crate::script::{MarkerPolicy, PauseTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Label → seconds table used to resolve pause markers
    pub pauses: PauseTable,
    pub engine: EngineConfig,
    pub pipeline: PipelineConfig,
}

/// External audio engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub sample_rate: u32,
    pub output_codec: String,
    pub output_bitrate: String,
    pub silence_cache_capacity: usize,
    pub transcode_timeout_ms: u64,
    pub silence_timeout_ms: u64,
    pub concat_timeout_ms: u64,
    pub concat_fallback_timeout_ms: u64,
    pub encode_timeout_ms: u64,
    pub probe_timeout_ms: u64,
}

/// Orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub generate_timeout_ms: u64,
    pub stitch_timeout_ms: u64,
    /// Progress value reached once every chunk is generated
    pub progress_ceiling: u8,
    pub marker_policy: MarkerPolicy,
    /// Bitrate assumed when a chunk's duration can only be estimated
    pub estimate_bitrate_kbps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            sample_rate: defaults::SAMPLE_RATE,
            output_codec: defaults::OUTPUT_CODEC.to_string(),
            output_bitrate: defaults::OUTPUT_BITRATE.to_string(),
            silence_cache_capacity: defaults::SILENCE_CACHE_CAPACITY,
            transcode_timeout_ms: defaults::TRANSCODE_TIMEOUT_MS,
            silence_timeout_ms: defaults::SILENCE_TIMEOUT_MS,
            concat_timeout_ms: defaults::CONCAT_TIMEOUT_MS,
            concat_fallback_timeout_ms: defaults::CONCAT_FALLBACK_TIMEOUT_MS,
            encode_timeout_ms: defaults::ENCODE_TIMEOUT_MS,
            probe_timeout_ms: defaults::PROBE_TIMEOUT_MS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generate_timeout_ms: defaults::GENERATE_TIMEOUT_MS,
            stitch_timeout_ms: defaults::STITCH_TIMEOUT_MS,
            progress_ceiling: defaults::PROGRESS_CEILING,
            marker_policy: MarkerPolicy::default(),
            estimate_bitrate_kbps: defaults::ESTIMATE_BITRATE_KBPS,
        }
    }
}

impl EngineConfig {
    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_millis(self.transcode_timeout_ms)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    pub fn concat_timeout(&self) -> Duration {
        Duration::from_millis(self.concat_timeout_ms)
    }

    pub fn concat_fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.concat_fallback_timeout_ms)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_millis(self.encode_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl PipelineConfig {
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }

    pub fn stitch_timeout(&self) -> Duration {
        Duration::from_millis(self.stitch_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML or invalid values.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&contents).map_err(|e| ScriptvoxError::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                let missing = e
                    .downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false);
                if missing {
                    tracing::debug!(path = %path.display(), "No config file, using defaults");
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("Failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIPTVOX_FFMPEG_PATH → engine.ffmpeg_path
    /// - SCRIPTVOX_FFPROBE_PATH → engine.ffprobe_path
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("SCRIPTVOX_FFMPEG_PATH")
            && !path.is_empty()
        {
            self.engine.ffmpeg_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("SCRIPTVOX_FFPROBE_PATH")
            && !path.is_empty()
        {
            self.engine.ffprobe_path = Some(PathBuf::from(path));
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scriptvox/config.toml on Linux, or a relative
    /// `scriptvox/config.toml` when no config directory is known.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriptvox")
            .join("config.toml")
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (label, seconds) in self.pauses.iter() {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid(
                    &format!("pauses.{}", label),
                    "must be a non-negative number of seconds",
                ));
            }
        }

        let engine = &self.engine;
        if engine.sample_rate == 0 {
            return Err(invalid("engine.sample_rate", "must be greater than zero"));
        }
        if engine.output_codec.trim().is_empty() {
            return Err(invalid("engine.output_codec", "must not be empty"));
        }
        if crate::engine::output_format(&engine.output_codec).is_none() {
            return Err(invalid(
                "engine.output_codec",
                "unsupported encoder (expected libmp3lame, aac, libopus, libvorbis, flac or pcm_s16le)",
            ));
        }
        if engine.output_bitrate.trim().is_empty() {
            return Err(invalid("engine.output_bitrate", "must not be empty"));
        }
        if engine.silence_cache_capacity == 0 {
            return Err(invalid(
                "engine.silence_cache_capacity",
                "must be greater than zero",
            ));
        }
        let timeouts = [
            ("engine.transcode_timeout_ms", engine.transcode_timeout_ms),
            ("engine.silence_timeout_ms", engine.silence_timeout_ms),
            ("engine.concat_timeout_ms", engine.concat_timeout_ms),
            (
                "engine.concat_fallback_timeout_ms",
                engine.concat_fallback_timeout_ms,
            ),
            ("engine.encode_timeout_ms", engine.encode_timeout_ms),
            ("engine.probe_timeout_ms", engine.probe_timeout_ms),
            (
                "pipeline.generate_timeout_ms",
                self.pipeline.generate_timeout_ms,
            ),
            ("pipeline.stitch_timeout_ms", self.pipeline.stitch_timeout_ms),
        ];
        if let Some((key, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(invalid(key, "must be greater than zero"));
        }

        if self.pipeline.progress_ceiling > 100 {
            return Err(invalid(
                "pipeline.progress_ceiling",
                "must be between 0 and 100",
            ));
        }
        if self.pipeline.estimate_bitrate_kbps == 0 {
            return Err(invalid(
                "pipeline.estimate_bitrate_kbps",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ScriptvoxError {
    ScriptvoxError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

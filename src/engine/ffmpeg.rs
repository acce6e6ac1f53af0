//! ffmpeg / ffprobe invocations used by the stitcher.
//!
//! Every call is bounded by a stage-specific deadline taken from
//! [`EngineConfig`]. Only concatenation has a fallback: when the concat
//! demuxer fails, the same parts are joined through an explicit filter graph.

use crate::config::EngineConfig;
use crate::defaults;
use crate::engine::command::{CommandOutput, CommandRunner, render_command};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Handle on the external audio engine.
#[derive(Clone)]
pub struct AudioEngine {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    ffprobe: String,
    settings: EngineConfig,
}

impl AudioEngine {
    /// Creates an engine, resolving the ffmpeg and ffprobe binaries.
    pub fn new(settings: EngineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let ffmpeg = resolve_ffmpeg(settings.ffmpeg_path.as_deref());
        let ffprobe = resolve_ffprobe(settings.ffprobe_path.as_deref());
        tracing::debug!(%ffmpeg, %ffprobe, "Resolved audio engine binaries");
        Self {
            runner,
            ffmpeg,
            ffprobe,
            settings,
        }
    }

    pub fn ffmpeg_bin(&self) -> &str {
        &self.ffmpeg
    }

    pub fn ffprobe_bin(&self) -> &str {
        &self.ffprobe
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    /// Transcodes any input into the normalized waveform (mono PCM).
    pub async fn transcode_to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        let mut args = strings(&["-hide_banner", "-loglevel", "error", "-i"]);
        args.push(path_arg(input));
        args.extend(self.waveform_args());
        args.push("-y".to_string());
        args.push(path_arg(output));
        self.ffmpeg_checked(&args, "ffmpeg.transcode", self.settings.transcode_timeout())
            .await
    }

    /// Writes `seconds` of silence in the normalized waveform format.
    pub async fn generate_silence(&self, seconds: f64, output: &Path) -> Result<()> {
        let mut args = strings(&["-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"]);
        args.push(format!(
            "anullsrc=r={}:cl=mono",
            self.settings.sample_rate
        ));
        args.push("-t".to_string());
        args.push(seconds.to_string());
        args.extend(self.waveform_args());
        args.push("-y".to_string());
        args.push(path_arg(output));
        self.ffmpeg_checked(&args, "ffmpeg.silence", self.settings.silence_timeout())
            .await
    }

    /// Concatenates `parts` into `output`.
    ///
    /// Tries the concat demuxer with a list file written to `scratch_dir`
    /// first. An engine failure there triggers exactly one filter-graph
    /// attempt; timeouts and the fallback's own failure are fatal.
    pub async fn concatenate(
        &self,
        parts: &[PathBuf],
        output: &Path,
        scratch_dir: &Path,
    ) -> Result<()> {
        let list_file = scratch_dir.join("concat_list.txt");
        tokio::fs::write(&list_file, concat_list_contents(parts)).await?;

        let result = self.concat_with_list(&list_file, output).await;
        if let Err(e) = tokio::fs::remove_file(&list_file).await {
            tracing::debug!(list_file = %list_file.display(), error = %e, "Failed to remove concat list");
        }

        match result {
            Err(e) if e.is_engine_failure() => {
                tracing::warn!(error = %e, "Concat demuxer failed, attempting filter fallback");
                self.concat_with_filter(parts, output).await
            }
            other => other,
        }
    }

    /// Concat demuxer invocation over a list file.
    pub async fn concat_with_list(&self, list_file: &Path, output: &Path) -> Result<()> {
        let mut args = strings(&[
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]);
        args.push(path_arg(list_file));
        args.extend(self.waveform_args());
        args.push("-y".to_string());
        args.push(path_arg(output));
        self.ffmpeg_checked(&args, "ffmpeg.concat", self.settings.concat_timeout())
            .await
    }

    /// Filter-graph concatenation: every part is its own input.
    pub async fn concat_with_filter(&self, parts: &[PathBuf], output: &Path) -> Result<()> {
        let mut args = strings(&["-hide_banner", "-loglevel", "error"]);
        for part in parts {
            args.push("-i".to_string());
            args.push(path_arg(part));
        }
        args.push("-filter_complex".to_string());
        args.push(concat_filter_graph(parts.len(), self.settings.sample_rate));
        args.push("-map".to_string());
        args.push("[a]".to_string());
        args.extend(self.waveform_args());
        args.push("-y".to_string());
        args.push(path_arg(output));
        self.ffmpeg_checked(
            &args,
            "ffmpeg.concat_fallback",
            self.settings.concat_fallback_timeout(),
        )
        .await
    }

    /// Format of the files [`AudioEngine::encode`] writes.
    ///
    /// Falls back to MP3 labelling for codecs that bypassed validation.
    pub fn output_format(&self) -> OutputFormat {
        output_format(&self.settings.output_codec).unwrap_or(OutputFormat {
            extension: "mp3",
            mime_type: defaults::OUTPUT_MIME_TYPE,
        })
    }

    /// Encodes the concatenated waveform into the final compressed codec.
    pub async fn encode(&self, input: &Path, output: &Path) -> Result<()> {
        let mut args = strings(&["-hide_banner", "-loglevel", "error", "-i"]);
        args.push(path_arg(input));
        args.push("-c:a".to_string());
        args.push(self.settings.output_codec.clone());
        args.push("-ar".to_string());
        args.push(self.settings.sample_rate.to_string());
        args.push("-b:a".to_string());
        args.push(self.settings.output_bitrate.clone());
        args.push("-y".to_string());
        args.push(path_arg(output));
        self.ffmpeg_checked(&args, "ffmpeg.encode", self.settings.encode_timeout())
            .await
    }

    /// Duration reported by ffprobe, if it reports a positive one.
    pub async fn probe_duration(&self, input: &Path) -> Option<f64> {
        let mut args = strings(&[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]);
        args.push(path_arg(input));
        let output = self
            .runner
            .run(&self.ffprobe, &args, "ffprobe.duration", self.settings.probe_timeout())
            .await
            .ok()?;
        if !output.success {
            return None;
        }
        let secs = output.stdout_text().trim().parse::<f64>().ok()?;
        (secs.is_finite() && secs > 0.0).then_some(secs)
    }

    /// Runs `ffmpeg -i <input>` and returns its stderr banner.
    ///
    /// ffmpeg exits non-zero without an output file; only the banner matters.
    pub async fn describe_input(&self, input: &Path) -> Option<String> {
        let args = vec!["-hide_banner".to_string(), "-i".to_string(), path_arg(input)];
        self.runner
            .run(&self.ffmpeg, &args, "ffmpeg.describe", self.settings.probe_timeout())
            .await
            .ok()
            .map(|output| output.stderr_text())
    }

    fn waveform_args(&self) -> Vec<String> {
        vec![
            "-ar".to_string(),
            self.settings.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
        ]
    }

    async fn ffmpeg_checked(&self, args: &[String], stage: &str, timeout: Duration) -> Result<()> {
        let rendered = render_command(&self.ffmpeg, args);
        tracing::debug!(stage, command = %rendered, "Running audio engine");
        let output: CommandOutput = self.runner.run(&self.ffmpeg, args, stage, timeout).await?;
        output.into_checked(&rendered).map(|_| ())
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("ffmpeg", &self.ffmpeg)
            .field("ffprobe", &self.ffprobe)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Body of a concat demuxer list file, one quoted path per line.
pub fn concat_list_contents(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| format!("file '{}'", p.display().to_string().replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[0:a][1:a]...concat=n=N:v=0:a=1, aformat=...[a]`
pub fn concat_filter_graph(inputs: usize, sample_rate: u32) -> String {
    let labels: String = (0..inputs).map(|i| format!("[{}:a]", i)).collect();
    format!(
        "{}concat=n={}:v=0:a=1, aformat=sample_fmts=s16:sample_rates={}:channel_layouts=mono [a]",
        labels, inputs, sample_rate
    )
}

/// Container extension and MIME type of an encoded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub extension: &'static str,
    pub mime_type: &'static str,
}

/// Format produced by an ffmpeg audio encoder, or `None` for encoders
/// scriptvox cannot label.
pub fn output_format(codec: &str) -> Option<OutputFormat> {
    let (extension, mime_type) = match codec.trim().to_ascii_lowercase().as_str() {
        "libmp3lame" | "mp3" => ("mp3", defaults::OUTPUT_MIME_TYPE),
        "aac" | "libfdk_aac" => ("m4a", "audio/mp4"),
        "libopus" | "opus" => ("ogg", "audio/ogg"),
        "libvorbis" | "vorbis" => ("ogg", "audio/ogg"),
        "flac" => ("flac", "audio/flac"),
        "pcm_s16le" => ("wav", "audio/wav"),
        _ => return None,
    };
    Some(OutputFormat {
        extension,
        mime_type,
    })
}

/// ffmpeg binary: configured path, `FFMPEG_PATH`, `FFMPEG_BIN`, `PATH`, then `ffmpeg`.
pub fn resolve_ffmpeg(configured: Option<&Path>) -> String {
    let env_candidates = ["FFMPEG_PATH", "FFMPEG_BIN"];
    resolve_binary(configured, &env_candidates, "ffmpeg")
}

/// ffprobe binary: configured path, `FFPROBE_PATH`, `PATH`, then `ffprobe`.
pub fn resolve_ffprobe(configured: Option<&Path>) -> String {
    resolve_binary(configured, &["FFPROBE_PATH"], "ffprobe")
}

fn resolve_binary(configured: Option<&Path>, env_keys: &[&str], fallback: &str) -> String {
    let from_env = env_keys
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);

    for candidate in configured.map(Path::to_path_buf).into_iter().chain(from_env) {
        if candidate.exists() {
            return candidate.display().to_string();
        }
    }

    which::which(fallback)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| fallback.to_string())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

//! Optional side channel for keeping intermediate audio.
//!
//! The pipeline hands raw chunk audio and the final file to a [`DebugSink`]
//! after each stage. Sink failures are logged and discarded; they never
//! change the outcome of a run.

use crate::error::Result;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Which stage produced a debug artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugStage {
    Raw,
    Final,
    #[default]
    Unknown,
}

impl DebugStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebugStage::Raw => "raw",
            DebugStage::Final => "final",
            DebugStage::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DebugStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata passed along with every debug artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugMeta {
    pub file_name: String,
    pub job_id: Option<String>,
    pub stage: DebugStage,
}

impl DebugMeta {
    pub fn new(file_name: impl Into<String>, job_id: Option<&str>, stage: DebugStage) -> Self {
        Self {
            file_name: file_name.into(),
            job_id: job_id.map(str::to_string),
            stage,
        }
    }
}

/// Per-run options shared by the orchestrator and the stitcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    /// Correlates debug artifacts of one run.
    pub job_id: Option<String>,
    /// Label of the encoded output; defaults to `scriptvox_<ms>.mp3`.
    /// Only the final path component is used.
    pub file_name: Option<String>,
}

impl BuildOptions {
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn file_name_or_default(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("scriptvox_{}.mp3", timestamp_ms()))
    }
}

/// Receiver for debug artifacts. Both methods default to doing nothing.
#[async_trait::async_trait]
pub trait DebugSink: Send + Sync {
    async fn save_bytes(&self, _bytes: &[u8], _meta: &DebugMeta) -> Result<()> {
        Ok(())
    }

    async fn save_file(&self, _path: &Path, _meta: &DebugMeta) -> Result<()> {
        Ok(())
    }
}

/// Forwards bytes to `sink`, swallowing any error.
pub async fn save_bytes(sink: Option<&dyn DebugSink>, bytes: &[u8], meta: DebugMeta) {
    let Some(sink) = sink else {
        return;
    };
    if let Err(e) = sink.save_bytes(bytes, &meta).await {
        tracing::debug!(file = %meta.file_name, stage = %meta.stage, error = %e, "Debug sink failed");
    }
}

/// Forwards a file to `sink`, swallowing any error.
pub async fn save_file(sink: Option<&dyn DebugSink>, path: &Path, meta: DebugMeta) {
    let Some(sink) = sink else {
        return;
    };
    if let Err(e) = sink.save_file(path, &meta).await {
        tracing::debug!(file = %meta.file_name, stage = %meta.stage, error = %e, "Debug sink failed");
    }
}

/// Milliseconds since the Unix epoch, for artifact names.
pub fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Sink that records what it receives. Useful in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: std::sync::Mutex<Vec<(DebugMeta, usize)>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Recorded `(meta, byte length)` pairs in call order.
    pub fn saved(&self) -> Vec<(DebugMeta, usize)> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, meta: &DebugMeta, len: usize) -> Result<()> {
        if self.fail {
            return Err(crate::error::ScriptvoxError::Other(
                "debug sink unavailable".to_string(),
            ));
        }
        if let Ok(mut saved) = self.saved.lock() {
            saved.push((meta.clone(), len));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DebugSink for MemorySink {
    async fn save_bytes(&self, bytes: &[u8], meta: &DebugMeta) -> Result<()> {
        self.record(meta, bytes.len())
    }

    async fn save_file(&self, path: &Path, meta: &DebugMeta) -> Result<()> {
        let len = tokio::fs::metadata(path).await?.len();
        self.record(meta, usize::try_from(len).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopSink;

    impl DebugSink for NoopSink {}

    #[tokio::test]
    async fn test_default_methods_are_noops() {
        let sink = NoopSink;
        let meta = DebugMeta::new("x.mp3", None, DebugStage::Raw);
        assert!(sink.save_bytes(b"abc", &meta).await.is_ok());
        assert!(sink.save_file(Path::new("/nonexistent"), &meta).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_bytes_forwards_meta() {
        let sink = MemorySink::new();
        save_bytes(
            Some(&sink),
            b"abcd",
            DebugMeta::new("raw_mock_0.mp3", Some("job-1"), DebugStage::Raw),
        )
        .await;

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0.file_name, "raw_mock_0.mp3");
        assert_eq!(saved[0].0.job_id.as_deref(), Some("job-1"));
        assert_eq!(saved[0].1, 4);
    }

    #[tokio::test]
    async fn test_sink_errors_are_swallowed() {
        let sink = MemorySink::failing();
        let meta = DebugMeta::new("final_x.mp3", None, DebugStage::Final);
        save_bytes(Some(&sink), b"abc", meta.clone()).await;
        save_file(Some(&sink), Path::new("/nonexistent/file.mp3"), meta).await;
        assert!(sink.saved().is_empty());
    }

    #[tokio::test]
    async fn test_absent_sink_is_fine() {
        save_bytes(None, b"abc", DebugMeta::new("x", None, DebugStage::Unknown)).await;
    }

    #[test]
    fn test_default_file_name() {
        let options = BuildOptions::default();
        let name = options.file_name_or_default();
        assert!(name.starts_with("scriptvox_"));
        assert!(name.ends_with(".mp3"));

        let named = BuildOptions::default().with_file_name("episode.mp3");
        assert_eq!(named.file_name_or_default(), "episode.mp3");
    }

    #[test]
    fn test_file_name_keeps_last_component_only() {
        let absolute = BuildOptions::default().with_file_name("/var/tmp/episode.mp3");
        assert_eq!(absolute.file_name_or_default(), "episode.mp3");

        let parent = BuildOptions::default().with_file_name("../up.mp3");
        assert_eq!(parent.file_name_or_default(), "up.mp3");

        let dots = BuildOptions::default().with_file_name("..");
        assert!(dots.file_name_or_default().starts_with("scriptvox_"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(DebugStage::Raw.to_string(), "raw");
        assert_eq!(DebugStage::default(), DebugStage::Unknown);
    }
}

//! Runs one script end to end: segment, chunk, generate, stitch.
//!
//! Chunks are generated strictly in order, one request at a time, because
//! generation order is stitching order.

use crate::backend::SpeechBackend;
use crate::config::Config;
use crate::defaults;
use crate::engine::duration;
use crate::error::{Result, ScriptvoxError};
use crate::pipeline::chunker;
use crate::pipeline::debug::{self, BuildOptions, DebugMeta, DebugStage};
use crate::pipeline::progress::{self, ProgressReporter, ProgressStage, ProgressTracker};
use crate::pipeline::stitcher::Stitcher;
use crate::pipeline::types::{AudioPart, Chunk, FinalArtifact};
use crate::script;
use std::sync::Arc;

/// Sequences the pipeline stages for a single run.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    stitcher: Stitcher,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, stitcher: Stitcher) -> Self {
        Self { config, stitcher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stitcher(&self) -> &Stitcher {
        &self.stitcher
    }

    /// Turns `raw_text` into one stitched audio file using `backend`.
    ///
    /// Any failure aborts the run; nothing is retried.
    pub async fn generate(
        &self,
        raw_text: &str,
        backend: &dyn SpeechBackend,
        progress: Option<&dyn ProgressReporter>,
        options: &BuildOptions,
    ) -> Result<FinalArtifact> {
        let pipeline = &self.config.pipeline;
        let mut tracker = ProgressTracker::new(progress);

        let segments =
            script::segment_with_policy(raw_text, &self.config.pauses, pipeline.marker_policy)?;
        tracing::info!(count = segments.len(), "Parsed segments");

        let chunks = chunker::chunk(&segments, backend.capabilities());
        tracing::info!(count = chunks.len(), backend = backend.id(), "Generated chunks");
        if chunks.is_empty() {
            return Err(ScriptvoxError::Precondition {
                message: "script contains no speakable text".to_string(),
            });
        }

        let total = chunks.len();
        let mut parts = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            tracker.emit(
                progress::early_tick(i, total, defaults::PROGRESS_EARLY_CAP),
                ProgressStage::Generating { chunk: i, total },
            );

            parts.push(self.generate_chunk(backend, i, chunk, options).await?);

            tracker.emit(
                progress::completion_tick(i + 1, total, pipeline.progress_ceiling),
                ProgressStage::Generated { chunk: i, total },
            );
        }

        tracker.emit(pipeline.progress_ceiling, ProgressStage::Stitching);
        let budget = pipeline.stitch_timeout();
        let artifact = tokio::time::timeout(
            budget,
            self.stitcher.build_final(&chunks, &parts, options),
        )
        .await
        .map_err(|_| ScriptvoxError::timeout("stitcher.build_final", budget))??;
        tracker.emit(100, ProgressStage::Done);

        Ok(artifact)
    }

    async fn generate_chunk(
        &self,
        backend: &dyn SpeechBackend,
        index: usize,
        chunk: &Chunk,
        options: &BuildOptions,
    ) -> Result<AudioPart> {
        let markup = format!("<speak>{}</speak>", chunk.text);
        tracing::debug!(
            backend = backend.id(),
            index,
            post_pause = chunk.post_pause_seconds,
            "Generating chunk"
        );

        let budget = self.config.pipeline.generate_timeout();
        let result = tokio::time::timeout(budget, backend.generate(&markup))
            .await
            .map_err(|_| ScriptvoxError::timeout(format!("backend.generate chunk {}", index), budget))?
            .map_err(|e| ScriptvoxError::Backend {
                backend: backend.id().to_string(),
                chunk_index: index,
                message: e.to_string(),
            })?;

        let duration_seconds = match result.duration_seconds {
            Some(seconds) => seconds,
            None => {
                duration::measure_duration(
                    self.stitcher.engine(),
                    &result.audio,
                    self.config.pipeline.estimate_bitrate_kbps,
                )
                .await
            }
        };

        debug::save_bytes(
            self.stitcher.debug_sink(),
            &result.audio,
            DebugMeta::new(
                format!("raw_{}_{}_{}.mp3", backend.id(), index, debug::timestamp_ms()),
                options.job_id.as_deref(),
                DebugStage::Raw,
            ),
        )
        .await;

        Ok(AudioPart {
            bytes: result.audio,
            duration_seconds,
            mime_type: result.mime_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, MockBackend};
    use crate::engine::{AudioEngine, MockRunner};
    use crate::pipeline::progress::ProgressEvent;
    use crate::pipeline::silence_cache::SilenceCache;
    use std::sync::Mutex;
    use std::time::Duration;

    fn orchestrator_with(config: Config, runner: Arc<MockRunner>) -> Orchestrator {
        let engine = AudioEngine::new(config.engine.clone(), runner);
        let stitcher = Stitcher::new(engine, Arc::new(SilenceCache::new(50).unwrap()));
        Orchestrator::new(Arc::new(config), stitcher)
    }

    fn orchestrator(runner: Arc<MockRunner>) -> Orchestrator {
        orchestrator_with(Config::default(), runner)
    }

    fn backend() -> MockBackend {
        MockBackend::new("mock").with_capabilities(Capabilities::new(Some(2.0), Some(1000)))
    }

    #[tokio::test]
    async fn test_generates_one_request_per_chunk() {
        let runner = Arc::new(MockRunner::new());
        let backend = backend();

        let artifact = orchestrator(runner)
            .generate(
                "Hello [PAUSE:LONG] world [PAUSE:MICRO] again",
                &backend,
                None,
                &BuildOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            backend.requests(),
            vec![
                "<speak>Hello</speak>".to_string(),
                "<speak>world <break time=\"0.5s\" /> again</speak>".to_string(),
            ]
        );
        // 1.0 s per mock chunk plus the 8 s LONG pause.
        assert_eq!(artifact.total_duration_seconds, 10.0);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let runner = Arc::new(MockRunner::new());
        let backend = MockBackend::new("mock");
        let seen = Mutex::new(Vec::new());
        let reporter = |event: ProgressEvent| seen.lock().unwrap().push(event.percent);

        orchestrator(runner)
            .generate(
                "One [PAUSE:LONG] two [PAUSE:LONG] three [PAUSE:LONG] four",
                &backend,
                Some(&reporter),
                &BuildOptions::default(),
            )
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![3, 20, 20, 40, 40, 60, 60, 80, 80, 100]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_empty_script_is_rejected() {
        let runner = Arc::new(MockRunner::new());
        let backend = MockBackend::new("mock");

        let err = orchestrator(runner)
            .generate("  [PAUSE:LONG]  ", &backend, None, &BuildOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptvoxError::Precondition { .. }));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped_with_index() {
        let runner = Arc::new(MockRunner::new());
        let backend = MockBackend::new("mock").with_failure_on(1);

        let err = orchestrator(runner.clone())
            .generate(
                "a [PAUSE:LONG] b [PAUSE:LONG] c",
                &backend,
                None,
                &BuildOptions::default(),
            )
            .await
            .unwrap_err();

        match err {
            ScriptvoxError::Backend {
                backend,
                chunk_index,
                ..
            } => {
                assert_eq!(backend, "mock");
                assert_eq!(chunk_index, 1);
            }
            other => panic!("Expected Backend error, got {other:?}"),
        }
        assert!(runner.calls().is_empty(), "stitching must not start");
    }

    #[tokio::test]
    async fn test_backend_timeout_names_chunk() {
        let runner = Arc::new(MockRunner::new());
        let mut config = Config::default();
        config.pipeline.generate_timeout_ms = 20;
        let backend = MockBackend::new("slow").with_delay(Duration::from_secs(5));

        let err = orchestrator_with(config, runner)
            .generate("hello", &backend, None, &BuildOptions::default())
            .await
            .unwrap_err();

        match err {
            ScriptvoxError::Timeout { stage, budget_ms } => {
                assert_eq!(stage, "backend.generate chunk 0");
                assert_eq!(budget_ms, 20);
            }
            other => panic!("Expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stitch_timeout() {
        let runner = Arc::new(MockRunner::new().with_delay(Duration::from_millis(200)));
        let mut config = Config::default();
        config.pipeline.stitch_timeout_ms = 50;

        let err = orchestrator_with(config, runner)
            .generate("hello", &MockBackend::new("mock"), None, &BuildOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("stitcher.build_final"));
    }

    #[tokio::test]
    async fn test_missing_duration_is_measured() {
        let runner = Arc::new(MockRunner::new().with_probe_output("2.5"));
        let backend = MockBackend::new("mock").with_duration(None);

        let artifact = orchestrator(runner.clone())
            .generate("hello", &backend, None, &BuildOptions::default())
            .await
            .unwrap();

        assert_eq!(artifact.total_duration_seconds, 2.5);
        assert_eq!(runner.count_matching("ffprobe"), 1);
    }

    #[tokio::test]
    async fn test_strict_marker_policy_aborts_before_generation() {
        let runner = Arc::new(MockRunner::new());
        let mut config = Config::default();
        config.pipeline.marker_policy = script::MarkerPolicy::Reject;
        let backend = MockBackend::new("mock");

        let err = orchestrator_with(config, runner)
            .generate("a [PAUSE:] b", &backend, None, &BuildOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptvoxError::MalformedMarker { .. }));
        assert_eq!(backend.call_count(), 0);
    }
}

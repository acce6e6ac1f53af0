//! Application-facing entry point.
//!
//! A [`Conductor`] owns the runtime configuration, the backend registry and
//! a shared [`Stitcher`]. Every `generate_full` call is an independent run;
//! concurrent runs share only the silence cache.

use crate::backend::{BackendFactory, BackendRegistry, SpeechBackend};
use crate::config::Config;
use crate::engine::{AudioEngine, CommandRunner, ProcessRunner};
use crate::error::Result;
use crate::pipeline::{
    BuildOptions, DebugSink, FinalArtifact, Orchestrator, ProgressReporter, SilenceCache, Stitcher,
};
use std::sync::Arc;

#[derive(Debug)]
pub struct Conductor {
    config: Arc<Config>,
    registry: BackendRegistry,
    orchestrator: Orchestrator,
}

impl Conductor {
    /// Creates a conductor that runs the real ffmpeg binaries.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    /// Creates a conductor on top of a custom command runner.
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        config.validate()?;
        let engine = AudioEngine::new(config.engine.clone(), runner);
        let silence = Arc::new(SilenceCache::new(config.engine.silence_cache_capacity)?);
        let config = Arc::new(config);
        let orchestrator = Orchestrator::new(Arc::clone(&config), Stitcher::new(engine, silence));
        Ok(Self {
            config,
            registry: BackendRegistry::new(),
            orchestrator,
        })
    }

    /// Routes raw and final audio of every run to `sink`.
    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        let stitcher = self.stitcher().clone().with_debug_sink(sink);
        self.orchestrator = Orchestrator::new(Arc::clone(&self.config), stitcher);
        self
    }

    pub fn runtime_config(&self) -> &Config {
        &self.config
    }

    pub fn stitcher(&self) -> &Stitcher {
        self.orchestrator.stitcher()
    }

    pub fn register_backend(&mut self, factory: Arc<dyn BackendFactory>) -> String {
        self.registry.register(factory)
    }

    pub fn has_backend(&self, id: &str) -> bool {
        self.registry.has(id)
    }

    pub fn list_backends(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Builds a backend instance from a registered factory.
    pub fn create_backend(&self, id: &str, options: &toml::Value) -> Result<Arc<dyn SpeechBackend>> {
        self.registry.create(id, Arc::clone(&self.config), options)
    }

    /// Runs the full pipeline for `raw_text` on `backend`.
    pub async fn generate_full(
        &self,
        raw_text: &str,
        backend: &dyn SpeechBackend,
        progress: Option<&dyn ProgressReporter>,
        options: &BuildOptions,
    ) -> Result<FinalArtifact> {
        self.orchestrator
            .generate(raw_text, backend, progress, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendContext, Capabilities, MockBackend};
    use crate::engine::MockRunner;
    use crate::error::ScriptvoxError;
    use crate::pipeline::{DebugStage, MemorySink};

    struct MockFactory;

    impl BackendFactory for MockFactory {
        fn id(&self) -> &str {
            "mock"
        }

        fn create(
            &self,
            ctx: &BackendContext,
            _options: &toml::Value,
        ) -> Result<Arc<dyn SpeechBackend>> {
            let caps = Capabilities::new(Some(2.0), Some(500));
            Ok(Arc::new(MockBackend::new(&ctx.id).with_capabilities(caps)))
        }
    }

    fn conductor(runner: Arc<MockRunner>) -> Conductor {
        Conductor::with_runner(Config::default(), runner).unwrap()
    }

    fn no_options() -> toml::Value {
        toml::Value::Table(toml::map::Map::new())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.engine.sample_rate = 0;
        let err = Conductor::with_runner(config, Arc::new(MockRunner::new())).unwrap_err();
        assert!(matches!(err, ScriptvoxError::ConfigInvalidValue { .. }));
    }

    #[test]
    fn test_backend_registration() {
        let mut conductor = conductor(Arc::new(MockRunner::new()));
        assert!(!conductor.has_backend("mock"));

        conductor.register_backend(Arc::new(MockFactory));

        assert!(conductor.has_backend("mock"));
        assert_eq!(conductor.list_backends(), vec!["mock".to_string()]);
        assert!(conductor.create_backend("other", &no_options()).is_err());
    }

    #[tokio::test]
    async fn test_generate_full_with_registered_backend() {
        let runner = Arc::new(MockRunner::new());
        let mut conductor = conductor(runner);
        conductor.register_backend(Arc::new(MockFactory));
        let backend = conductor.create_backend("mock", &no_options()).unwrap();

        let artifact = conductor
            .generate_full(
                "Intro [PAUSE:SETTLE] body",
                backend.as_ref(),
                None,
                &BuildOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(artifact.total_duration_seconds, 12.0);
        assert!(!artifact.to_base64().is_empty());
    }

    #[tokio::test]
    async fn test_debug_sink_sees_raw_and_final() {
        let runner = Arc::new(MockRunner::new());
        let sink = Arc::new(MemorySink::new());
        let conductor = conductor(runner).with_debug_sink(sink.clone());
        let backend = MockBackend::new("mock");

        conductor
            .generate_full(
                "one [PAUSE:LONG] two",
                &backend,
                None,
                &BuildOptions::default().with_job_id("job-1"),
            )
            .await
            .unwrap();

        let stages: Vec<DebugStage> = sink.saved().iter().map(|(meta, _)| meta.stage).collect();
        assert_eq!(
            stages,
            vec![DebugStage::Raw, DebugStage::Raw, DebugStage::Final]
        );
        assert!(sink.saved()[0].0.file_name.starts_with("raw_mock_0_"));
    }

    #[tokio::test]
    async fn test_runs_share_silence_cache() {
        let runner = Arc::new(MockRunner::new());
        let conductor = conductor(runner.clone());
        let backend = MockBackend::new("mock");

        for _ in 0..2 {
            conductor
                .generate_full("a [PAUSE:LONG] b", &backend, None, &BuildOptions::default())
                .await
                .unwrap();
        }

        assert_eq!(runner.count_matching("anullsrc"), 1);
        assert_eq!(conductor.stitcher().silence_cache().len(), 1);
    }
}

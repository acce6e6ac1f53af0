//! End-to-end runs of the pipeline against a mock backend and a recording
//! mock command runner. No ffmpeg installation is needed.

use scriptvox::backend::{Capabilities, MockBackend};
use scriptvox::engine::MockRunner;
use scriptvox::pipeline::{
    AudioPart, BuildOptions, Chunk, ProgressEvent, ProgressStage, SilenceCache, Stitcher,
};
use scriptvox::{AudioEngine, Conductor, Config, MarkerPolicy, ScriptvoxError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn conductor(runner: Arc<MockRunner>) -> Conductor {
    Conductor::with_runner(Config::default(), runner).unwrap()
}

fn conductor_with(config: Config, runner: Arc<MockRunner>) -> Conductor {
    Conductor::with_runner(config, runner).unwrap()
}

fn limited_backend() -> MockBackend {
    MockBackend::new("mock").with_capabilities(Capabilities::new(Some(4.0), Some(96)))
}

#[tokio::test]
async fn script_with_mixed_pauses_produces_one_artifact() {
    let runner = Arc::new(MockRunner::new());
    let backend = limited_backend();
    let script = "Welcome back. [PAUSE:SHORT] Take a breath [PAUSE:BREATH:2] \
                  and let it go. [PAUSE:MEDIUM] Good.";

    let artifact = conductor(runner.clone())
        .generate_full(script, &backend, None, &BuildOptions::default())
        .await
        .unwrap();

    // SHORT (1.5) and MEDIUM (3.5) are inlined; BREATH:2 (10 s) is not.
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0],
        "<speak>Welcome back. <break time=\"1.5s\" /> Take a breath</speak>"
    );
    assert_eq!(
        requests[1],
        "<speak>and let it go. <break time=\"3.5s\" /> Good.</speak>"
    );
    assert_eq!(artifact.total_duration_seconds, 12.0);
    assert_eq!(artifact.mime_type, "audio/mpeg");
    assert_eq!(runner.count_matching("anullsrc"), 1);
}

#[tokio::test]
async fn identical_post_pauses_generate_silence_once() {
    let runner = Arc::new(MockRunner::new());
    let backend = MockBackend::new("mock");

    conductor(runner.clone())
        .generate_full(
            "One [PAUSE:LONG] two [PAUSE:LONG] three",
            &backend,
            None,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(backend.call_count(), 3);
    assert_eq!(runner.count_matching("anullsrc"), 1);
}

#[tokio::test]
async fn failed_concat_falls_back_to_filter_graph_exactly_once() {
    let runner = Arc::new(MockRunner::new().fail_when("-f concat"));
    let backend = MockBackend::new("mock");

    let artifact = conductor(runner.clone())
        .generate_full("A [PAUSE:LONG] B", &backend, None, &BuildOptions::default())
        .await;

    assert!(artifact.is_ok());
    assert_eq!(runner.count_matching("-f concat"), 1);
    assert_eq!(runner.count_matching("-filter_complex"), 1);
}

#[tokio::test]
async fn stitcher_rejects_misaligned_parts() {
    let runner = Arc::new(MockRunner::new());
    let engine = AudioEngine::new(Config::default().engine, runner.clone());
    let stitcher = Stitcher::new(engine, Arc::new(SilenceCache::new(4).unwrap()));

    let err = stitcher
        .build_final(
            &[Chunk::new("a", 0.0), Chunk::new("b", 0.0)],
            &[AudioPart::new(vec![1, 2, 3], 1.0)],
            &BuildOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptvoxError::Precondition { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn progress_reaches_100_only_after_stitching() {
    let runner = Arc::new(MockRunner::new());
    let backend = MockBackend::new("mock");
    let events = Mutex::new(Vec::new());
    let reporter = |event: ProgressEvent| events.lock().unwrap().push(event);

    conductor(runner)
        .generate_full(
            "a [PAUSE:LONG] b [PAUSE:LONG] c",
            &backend,
            Some(&reporter),
            &BuildOptions::default(),
        )
        .await
        .unwrap();

    let events = events.into_inner().unwrap();
    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(percents.iter().filter(|&&p| p == 100).count(), 1);

    let stitching = events
        .iter()
        .position(|e| e.stage == ProgressStage::Stitching)
        .unwrap();
    assert_eq!(events[stitching].percent, 80);
    assert_eq!(events.last().map(|e| e.stage), Some(ProgressStage::Done));
}

#[tokio::test]
async fn progress_stops_below_100_on_failure() {
    let runner = Arc::new(MockRunner::new().fail_when("libmp3lame"));
    let backend = MockBackend::new("mock");
    let (tx, rx) = crossbeam_channel::unbounded();

    let result = conductor(runner)
        .generate_full("a [PAUSE:LONG] b", &backend, Some(&tx), &BuildOptions::default())
        .await;
    drop(tx);

    assert!(result.is_err());
    let percents: Vec<u8> = rx.iter().map(|e| e.percent).collect();
    assert_eq!(percents.last(), Some(&80));
}

#[tokio::test]
async fn backend_timeout_aborts_run() {
    let runner = Arc::new(MockRunner::new());
    let mut config = Config::default();
    config.pipeline.generate_timeout_ms = 25;
    let backend = MockBackend::new("mock").with_delay(Duration::from_secs(10));

    let err = conductor_with(config, runner.clone())
        .generate_full("hello", &backend, None, &BuildOptions::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("backend.generate chunk 0"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn backend_failure_is_not_retried() {
    let runner = Arc::new(MockRunner::new());
    let backend = MockBackend::new("mock").with_failure_on(0);

    let err = conductor(runner)
        .generate_full("a [PAUSE:LONG] b", &backend, None, &BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptvoxError::Backend { chunk_index: 0, .. }));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn malformed_markers_follow_configured_policy() {
    let script = "Start [PAUSE:] middle [PAUSE:LONG] end";

    let lenient = MockBackend::new("mock");
    conductor(Arc::new(MockRunner::new()))
        .generate_full(script, &lenient, None, &BuildOptions::default())
        .await
        .unwrap();
    assert_eq!(
        lenient.requests(),
        vec![
            "<speak>Start middle</speak>".to_string(),
            "<speak>end</speak>".to_string(),
        ]
    );

    let mut config = Config::default();
    config.pipeline.marker_policy = MarkerPolicy::Reject;
    let strict = MockBackend::new("mock");
    let err = conductor_with(config, Arc::new(MockRunner::new()))
        .generate_full(script, &strict, None, &BuildOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScriptvoxError::MalformedMarker { .. }));
    assert_eq!(strict.call_count(), 0);
}

#[tokio::test]
async fn long_text_is_split_under_request_limit() {
    let runner = Arc::new(MockRunner::new());
    let backend = limited_backend();
    let paragraph = "This sentence is short enough. ".repeat(12);

    conductor(runner)
        .generate_full(paragraph.trim(), &backend, None, &BuildOptions::default())
        .await
        .unwrap();

    let requests = backend.requests();
    assert!(requests.len() > 1);
    for request in requests {
        let inner = request
            .strip_prefix("<speak>")
            .and_then(|r| r.strip_suffix("</speak>"))
            .unwrap();
        assert!(inner.chars().count() <= 80, "too long: {inner:?}");
    }
}

#[tokio::test]
async fn concurrent_runs_complete_independently() {
    let runner = Arc::new(MockRunner::new());
    let conductor = Arc::new(conductor(runner.clone()));

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let conductor = Arc::clone(&conductor);
            tokio::spawn(async move {
                let backend = MockBackend::new("mock");
                let script = format!("run {i} [PAUSE:LONG] done");
                conductor
                    .generate_full(&script, &backend, None, &BuildOptions::default())
                    .await
                    .map(|a| a.total_duration_seconds)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 10.0);
    }
    assert_eq!(conductor.stitcher().silence_cache().len(), 1);
}

//! Speech generation backends.
//!
//! A backend is an opaque service that turns markup into audio bytes. The
//! pipeline only needs its [`Capabilities`] (to size chunks) and its
//! `generate` call.

pub mod registry;

use crate::error::{Result, ScriptvoxError};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use registry::{BackendContext, BackendFactory, BackendRegistry};

/// Renders a short pause as backend-native inline markup.
pub trait InlineBreakRenderer: Send + Sync {
    fn render(&self, seconds: f64) -> String;
}

/// Default renderer producing `<break time="Ns" />`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SsmlBreakRenderer;

impl InlineBreakRenderer for SsmlBreakRenderer {
    fn render(&self, seconds: f64) -> String {
        format!("<break time=\"{}s\" />", seconds)
    }
}

/// Any `Fn(f64) -> String` closure is a renderer.
impl<F> InlineBreakRenderer for F
where
    F: Fn(f64) -> String + Send + Sync,
{
    fn render(&self, seconds: f64) -> String {
        self(seconds)
    }
}

/// Limits and affordances a backend advertises to the chunker.
#[derive(Clone)]
pub struct Capabilities {
    /// Longest pause that may be rendered inline. `None` means no inline breaks.
    pub max_inline_break_seconds: Option<f64>,
    /// Longest request the backend accepts. `None` means unbounded.
    pub max_chars_per_request: Option<usize>,
    renderer: Arc<dyn InlineBreakRenderer>,
}

impl Capabilities {
    pub fn new(max_inline_break_seconds: Option<f64>, max_chars_per_request: Option<usize>) -> Self {
        Self {
            max_inline_break_seconds,
            max_chars_per_request,
            renderer: Arc::new(SsmlBreakRenderer),
        }
    }

    /// Replaces the default `<break>` renderer.
    pub fn with_renderer(mut self, renderer: impl InlineBreakRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn render_inline_break(&self, seconds: f64) -> String {
        self.renderer.render(seconds)
    }

    /// True when a pause of `seconds` should be rendered inline.
    ///
    /// A zero threshold disables inlining just like `None`.
    pub fn can_inline(&self, seconds: f64) -> bool {
        match self.max_inline_break_seconds {
            Some(limit) if limit > 0.0 => seconds <= limit,
            _ => false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("max_inline_break_seconds", &self.max_inline_break_seconds)
            .field("max_chars_per_request", &self.max_chars_per_request)
            .finish_non_exhaustive()
    }
}

/// Audio returned by one backend call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationResult {
    pub audio: Vec<u8>,
    pub mime_type: Option<String>,
    /// Trusted as-is when present; measured otherwise.
    pub duration_seconds: Option<f64>,
    pub byte_size: Option<usize>,
}

impl GenerationResult {
    pub fn new(audio: Vec<u8>) -> Self {
        Self {
            audio,
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }
}

/// Trait for speech generation backends.
///
/// Allows swapping implementations (a hosted API vs a mock).
#[async_trait::async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Identifier used in logs and debug file names.
    fn id(&self) -> &str;

    fn capabilities(&self) -> &Capabilities;

    /// Generate audio for one chunk of markup.
    async fn generate(&self, markup: &str) -> Result<GenerationResult>;
}

#[async_trait::async_trait]
impl<T: SpeechBackend + ?Sized> SpeechBackend for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn capabilities(&self) -> &Capabilities {
        (**self).capabilities()
    }

    async fn generate(&self, markup: &str) -> Result<GenerationResult> {
        (**self).generate(markup).await
    }
}

/// Mock backend for tests and dry runs.
///
/// Records every request it receives.
#[derive(Debug)]
pub struct MockBackend {
    id: String,
    caps: Capabilities,
    audio: Vec<u8>,
    duration_seconds: Option<f64>,
    delay: Option<Duration>,
    fail_on: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            caps: Capabilities::default(),
            audio: b"mock audio".to_vec(),
            duration_seconds: Some(1.0),
            delay: None,
            fail_on: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = audio;
        self
    }

    /// Duration reported with each result. `None` forces measurement.
    pub fn with_duration(mut self, seconds: Option<f64>) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the call with this zero-based index.
    pub fn with_failure_on(mut self, call_index: usize) -> Self {
        self.fail_on = Some(call_index);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SpeechBackend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    async fn generate(&self, markup: &str) -> Result<GenerationResult> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(markup.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on == Some(index) {
            return Err(ScriptvoxError::Other(format!(
                "mock generation failure on call {}",
                index
            )));
        }
        Ok(GenerationResult {
            audio: self.audio.clone(),
            mime_type: Some("audio/mpeg".to_string()),
            duration_seconds: self.duration_seconds,
            byte_size: Some(self.audio.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_renderer_formats_seconds() {
        let caps = Capabilities::new(Some(2.0), None);
        assert_eq!(caps.render_inline_break(1.0), "<break time=\"1s\" />");
        assert_eq!(caps.render_inline_break(1.5), "<break time=\"1.5s\" />");
    }

    #[test]
    fn test_custom_renderer() {
        let caps = Capabilities::new(Some(2.0), None)
            .with_renderer(|s: f64| format!("<mark name=\"pause:{}\"/>", s));
        assert_eq!(caps.render_inline_break(2.0), "<mark name=\"pause:2\"/>");
    }

    #[test]
    fn test_can_inline_respects_threshold() {
        let caps = Capabilities::new(Some(2.0), None);
        assert!(caps.can_inline(2.0));
        assert!(caps.can_inline(0.5));
        assert!(!caps.can_inline(2.5));
    }

    #[test]
    fn test_can_inline_disabled_by_none_or_zero() {
        assert!(!Capabilities::new(None, None).can_inline(0.1));
        assert!(!Capabilities::new(Some(0.0), None).can_inline(0.0));
    }

    #[test]
    fn test_capabilities_debug_omits_renderer() {
        let debug = format!("{:?}", Capabilities::new(Some(3.0), Some(1200)));
        assert!(debug.contains("1200"));
        assert!(debug.contains("Capabilities"));
    }

    #[tokio::test]
    async fn test_mock_backend_records_requests() {
        let backend = MockBackend::new("mock").with_audio(vec![1, 2, 3]);
        let result = backend.generate("<speak>hi</speak>").await.unwrap();

        assert_eq!(result.audio, vec![1, 2, 3]);
        assert_eq!(result.byte_size, Some(3));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.requests(), vec!["<speak>hi</speak>".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_backend_fails_on_configured_call() {
        let backend = MockBackend::new("mock").with_failure_on(1);
        assert!(backend.generate("a").await.is_ok());
        assert!(backend.generate("b").await.is_err());
        assert!(backend.generate("c").await.is_ok());
    }

    #[tokio::test]
    async fn test_backend_trait_is_object_safe() {
        let backend: Arc<dyn SpeechBackend> = Arc::new(MockBackend::new("boxed"));
        assert_eq!(backend.id(), "boxed");
        assert!(backend.generate("x").await.is_ok());
    }
}

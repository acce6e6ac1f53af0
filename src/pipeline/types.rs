//! Data types passed between pipeline stages.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// One backend request's worth of markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Backend-ready markup, never empty.
    pub text: String,
    /// Silence to insert after this chunk's audio (0 if none).
    pub post_pause_seconds: f64,
}

impl Chunk {
    pub fn new(text: impl Into<String>, post_pause_seconds: f64) -> Self {
        Self {
            text: text.into(),
            post_pause_seconds,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Generated audio for one chunk plus its duration.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPart {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
    pub mime_type: Option<String>,
}

impl AudioPart {
    pub fn new(bytes: Vec<u8>, duration_seconds: f64) -> Self {
        Self {
            bytes,
            duration_seconds,
            mime_type: None,
        }
    }
}

/// The stitched result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalArtifact {
    pub payload: Vec<u8>,
    pub mime_type: String,
    pub byte_size: usize,
    /// Sum of part durations and post-pauses, not a re-measurement.
    pub total_duration_seconds: f64,
}

impl FinalArtifact {
    pub fn new(payload: Vec<u8>, mime_type: &str, total_duration_seconds: f64) -> Self {
        Self {
            byte_size: payload.len(),
            payload,
            mime_type: mime_type.to_string(),
            total_duration_seconds,
        }
    }

    /// Payload as standard base64 (with padding).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.payload)
    }
}

//! Joins per-chunk audio and silence into the final encoded file.
//!
//! Every part is normalized to mono PCM before concatenation so that the
//! concat step never has to reconcile formats. All scratch files of a run
//! live in one temporary directory that is removed on every exit path.

use crate::engine::AudioEngine;
use crate::error::{Result, ScriptvoxError};
use crate::pipeline::debug::{self, BuildOptions, DebugMeta, DebugSink, DebugStage};
use crate::pipeline::silence_cache::{SilenceCache, SilenceFile};
use crate::pipeline::types::{AudioPart, Chunk, FinalArtifact};
use std::path::PathBuf;
use std::sync::Arc;

/// Builds final artifacts. Cheap to clone; clones share the silence cache.
#[derive(Clone)]
pub struct Stitcher {
    engine: AudioEngine,
    silence: Arc<SilenceCache>,
    debug: Option<Arc<dyn DebugSink>>,
}

impl Stitcher {
    pub fn new(engine: AudioEngine, silence: Arc<SilenceCache>) -> Self {
        Self {
            engine,
            silence,
            debug: None,
        }
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug = Some(sink);
        self
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn silence_cache(&self) -> &Arc<SilenceCache> {
        &self.silence
    }

    pub fn debug_sink(&self) -> Option<&dyn DebugSink> {
        self.debug.as_deref()
    }

    /// Stitches `parts` (one per chunk, same order) into one encoded file.
    pub async fn build_final(
        &self,
        chunks: &[Chunk],
        parts: &[AudioPart],
        options: &BuildOptions,
    ) -> Result<FinalArtifact> {
        if chunks.len() != parts.len() {
            return Err(ScriptvoxError::Precondition {
                message: format!(
                    "chunks and audio parts must be equal length ({} chunks, {} parts)",
                    chunks.len(),
                    parts.len()
                ),
            });
        }
        if chunks.is_empty() {
            return Err(ScriptvoxError::Precondition {
                message: "nothing to stitch".to_string(),
            });
        }

        let scratch = tempfile::Builder::new()
            .prefix("scriptvox_run_")
            .tempdir()?;
        let file_name = options.file_name_or_default();

        // Silence handles stay alive until concatenation is done, even if
        // the cache evicts them meanwhile.
        let mut held_silence: Vec<Arc<SilenceFile>> = Vec::new();
        let mut part_files: Vec<PathBuf> = Vec::with_capacity(chunks.len() * 2);

        for (i, (chunk, part)) in chunks.iter().zip(parts).enumerate() {
            let speech_src = scratch.path().join(format!("chunk_{}.mp3", i));
            let speech_wav = scratch.path().join(format!("chunk_{}.wav", i));
            tokio::fs::write(&speech_src, &part.bytes).await?;
            self.engine.transcode_to_wav(&speech_src, &speech_wav).await?;
            part_files.push(speech_wav);

            if chunk.post_pause_seconds > 0.0 {
                let silence = self
                    .silence
                    .get_or_generate(&self.engine, chunk.post_pause_seconds)
                    .await?;
                part_files.push(silence.path().to_path_buf());
                held_silence.push(silence);
            }
        }

        let concat_wav = scratch.path().join("concat.wav");
        self.engine
            .concatenate(&part_files, &concat_wav, scratch.path())
            .await?;
        drop(held_silence);

        // The caller's name only labels the debug copy.
        let encoded = self.engine.output_format();
        let out_path = scratch.path().join(format!("final.{}", encoded.extension));
        self.engine.encode(&concat_wav, &out_path).await?;

        debug::save_file(
            self.debug_sink(),
            &out_path,
            DebugMeta::new(
                format!("final_{}", file_name),
                options.job_id.as_deref(),
                DebugStage::Final,
            ),
        )
        .await;

        let payload = tokio::fs::read(&out_path).await?;
        let total_duration_seconds = total_duration(chunks, parts);
        tracing::info!(
            parts = part_files.len(),
            bytes = payload.len(),
            duration = total_duration_seconds,
            "Stitched final audio"
        );

        if let Err(e) = scratch.close() {
            tracing::debug!(error = %e, "Failed to remove stitch scratch directory");
        }

        Ok(FinalArtifact::new(
            payload,
            encoded.mime_type,
            total_duration_seconds,
        ))
    }
}

impl std::fmt::Debug for Stitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stitcher")
            .field("engine", &self.engine)
            .field("silence", &self.silence)
            .field("debug", &self.debug.is_some())
            .finish()
    }
}

/// Sum of every part's duration plus its chunk's post-pause.
pub fn total_duration(chunks: &[Chunk], parts: &[AudioPart]) -> f64 {
    chunks
        .iter()
        .zip(parts)
        .map(|(chunk, part)| part.duration_seconds + chunk.post_pause_seconds)
        .sum()
}

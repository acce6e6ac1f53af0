//! Regroups segments into backend-sized chunks.
//!
//! Short pauses are rendered inline with the backend's break markup; longer
//! ones end the current chunk and become its post-pause. Text that would
//! push a chunk over the request limit is split at the most natural
//! boundary available inside the window.

use crate::backend::Capabilities;
use crate::defaults::CHUNK_SAFETY_MARGIN;
use crate::pipeline::types::Chunk;
use crate::script::Segment;

/// Builds chunks for a backend advertising `caps`.
pub fn chunk(segments: &[Segment], caps: &Capabilities) -> Vec<Chunk> {
    let mut chunker = Chunker::new(caps);
    for segment in segments {
        match segment {
            Segment::Text { value } => chunker.push_text(value),
            Segment::Pause { label, seconds } => chunker.push_pause(label, *seconds),
        }
    }
    let chunks = chunker.finish();
    tracing::debug!(count = chunks.len(), "Chunked segments");
    chunks
}

/// Effective per-chunk character limit, if the backend has one.
pub fn effective_limit(caps: &Capabilities) -> Option<usize> {
    caps.max_chars_per_request
        .map(|max| max.saturating_sub(CHUNK_SAFETY_MARGIN).max(1))
}

struct Chunker<'a> {
    caps: &'a Capabilities,
    limit: Option<usize>,
    buffer: String,
    chunks: Vec<Chunk>,
}

impl<'a> Chunker<'a> {
    fn new(caps: &'a Capabilities) -> Self {
        Self {
            caps,
            limit: effective_limit(caps),
            buffer: String::new(),
            chunks: Vec::new(),
        }
    }

    fn push_text(&mut self, value: &str) {
        self.append(value);
        self.split_overflow();
    }

    fn push_pause(&mut self, label: &str, seconds: f64) {
        if self.caps.can_inline(seconds) {
            let token = self.caps.render_inline_break(seconds);
            self.append(&token);
            self.split_overflow();
            return;
        }
        self.flush(seconds, label);
    }

    fn append(&mut self, piece: &str) {
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(piece);
    }

    /// Emits all but the last piece of an over-long buffer.
    fn split_overflow(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.buffer.chars().count() <= limit {
            return;
        }
        let mut pieces = split_by_boundaries(&self.buffer, limit);
        let tail = pieces.pop().unwrap_or_default();
        for piece in pieces {
            let piece = piece.trim();
            if !piece.is_empty() {
                self.chunks.push(Chunk::new(piece, 0.0));
            }
        }
        self.buffer = tail;
    }

    fn flush(&mut self, post_pause_seconds: f64, label: &str) {
        let text = self.buffer.trim();
        if !text.is_empty() {
            self.chunks.push(Chunk::new(text, post_pause_seconds));
            self.buffer.clear();
            return;
        }
        self.buffer.clear();
        // Nothing to attach the silence to: extend the previous chunk's pause.
        match self.chunks.last_mut() {
            Some(prev) => prev.post_pause_seconds += post_pause_seconds,
            None => {
                tracing::debug!(label, seconds = post_pause_seconds, "Dropping leading pause");
            }
        }
    }

    fn finish(mut self) -> Vec<Chunk> {
        let text = self.buffer.trim();
        if !text.is_empty() {
            self.chunks.push(Chunk::new(text, 0.0));
        }
        self.chunks
    }
}

/// Splits `input` into pieces of at most `max_len` characters.
///
/// Split priority inside each window: paragraph break, line break, the
/// rightmost sentence terminator, the last space, then a hard cut. A split
/// that lands inside an unclosed `<...>` tag is moved back before the tag.
pub fn split_by_boundaries(input: &str, max_len: usize) -> Vec<String> {
    let hard_max = max_len.max(1);
    let mut pieces = Vec::new();
    let mut text: Vec<char> = input.chars().collect();

    while text.len() > hard_max {
        let window = &text[..hard_max];
        let pos = find_split(window).unwrap_or(hard_max);
        let pos = avoid_open_tag(window, pos).clamp(1, hard_max);

        let head: String = text[..pos].iter().collect();
        pieces.push(head.trim_end().to_string());
        let rest: String = text[pos..].iter().collect();
        text = rest.trim_start().chars().collect();
    }

    if !text.is_empty() {
        pieces.push(text.into_iter().collect());
    }
    pieces
}

fn find_split(window: &[char]) -> Option<usize> {
    last_index_of(window, &['\n', '\n'])
        .or_else(|| last_index_of(window, &['\n']))
        .or_else(|| last_sentence_end(window))
        .or_else(|| last_index_of(window, &[' ']))
}

fn last_index_of(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Position just after the rightmost `.`, `!` or `?` followed by whitespace
/// or the end of the window.
fn last_sentence_end(window: &[char]) -> Option<usize> {
    (0..window.len()).rev().find_map(|i| {
        let terminator = matches!(window[i], '.' | '!' | '?');
        let boundary = window.get(i + 1).is_none_or(|c| c.is_whitespace());
        (terminator && boundary).then_some(i + 1)
    })
}

fn avoid_open_tag(window: &[char], pos: usize) -> usize {
    let upto = pos.min(window.len().saturating_sub(1));
    let last_lt = (0..=upto).rev().find(|&i| window[i] == '<');
    let last_gt = (0..=upto).rev().find(|&i| window[i] == '>');
    let lt = match (last_lt, last_gt) {
        (Some(lt), Some(gt)) if lt > gt => lt,
        (Some(lt), None) => lt,
        _ => return pos,
    };

    let mut p = if lt > 0 { lt - 1 } else { upto };
    while p > 0 && !window[p].is_whitespace() {
        p -= 1;
    }
    p.max(1)
}

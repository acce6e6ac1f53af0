//! Splits raw script text into text and pause segments.
//!
//! After scanning, pause boundaries are normalized so that punctuation and
//! dashes stay attached to the clause they belong to instead of being
//! spoken after the silence.

use crate::error::{Result, ScriptvoxError};
use crate::script::pause::{self, PauseTable};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Anything shaped like a marker. Content is validated separately so that
/// malformed markers can be reported instead of leaking into the text.
#[allow(clippy::expect_used)]
static MARKER_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[PAUSE:([^\[\]]*)\]").expect("marker shape regex"));

const DASHES: [char; 3] = ['-', '\u{2013}', '\u{2014}'];
const MIGRATING_PUNCTUATION: [char; 11] =
    ['.', ',', '!', '?', ':', ';', '\u{2026}', '"', '\'', ')', ']'];

/// One element of a parsed script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Text { value: String },
    Pause { label: String, seconds: f64 },
}

impl Segment {
    pub fn text(value: impl Into<String>) -> Self {
        Segment::Text {
            value: value.into(),
        }
    }

    pub fn pause(label: impl Into<String>, seconds: f64) -> Self {
        Segment::Pause {
            label: label.into(),
            seconds,
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, Segment::Pause { .. })
    }
}

/// What to do with a marker whose content does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPolicy {
    /// Report through tracing and drop the marker from the output.
    #[default]
    Drop,
    /// Abort the parse with [`ScriptvoxError::MalformedMarker`].
    Reject,
}

/// Segments `text` with the default [`MarkerPolicy::Drop`] policy.
pub fn segment(text: &str, table: &PauseTable) -> Vec<Segment> {
    let mut segments = scan(text, table, &mut |marker| {
        tracing::warn!(marker, "Invalid pause format encountered");
    });
    normalize_boundaries(&mut segments);
    prune_empty_text(&mut segments);
    segments
}

/// Segments `text`, applying `policy` to malformed markers.
pub fn segment_with_policy(
    text: &str,
    table: &PauseTable,
    policy: MarkerPolicy,
) -> Result<Vec<Segment>> {
    let mut rejected: Option<String> = None;
    let mut segments = scan(text, table, &mut |marker| match policy {
        MarkerPolicy::Drop => tracing::warn!(marker, "Invalid pause format encountered"),
        MarkerPolicy::Reject => {
            if rejected.is_none() {
                rejected = Some(marker.to_string());
            }
        }
    });
    if let Some(marker) = rejected {
        return Err(ScriptvoxError::MalformedMarker { marker });
    }
    normalize_boundaries(&mut segments);
    prune_empty_text(&mut segments);
    tracing::debug!(count = segments.len(), "Segmented script");
    Ok(segments)
}

fn scan(text: &str, table: &PauseTable, on_malformed: &mut dyn FnMut(&str)) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for caps in MARKER_SHAPE_RE.captures_iter(text) {
        let (Some(whole), Some(content)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_text(&mut segments, &text[last_end..whole.start()]);
        last_end = whole.end();

        let spec = content.as_str().trim();
        if spec.is_empty() || !pause::is_valid_spec(spec) {
            on_malformed(whole.as_str());
            continue;
        }
        segments.push(Segment::pause(spec, pause::resolve(spec, table)));
    }

    push_text(&mut segments, &text[last_end..]);
    segments
}

fn push_text(segments: &mut Vec<Segment>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::text(trimmed));
    }
}

/// Moves dashes and leading punctuation across every text|pause|text boundary.
fn normalize_boundaries(segments: &mut [Segment]) {
    if segments.len() < 3 {
        return;
    }
    for i in 1..segments.len() - 1 {
        if !segments[i].is_pause() {
            continue;
        }
        let (head, tail) = segments.split_at_mut(i + 1);
        let (Segment::Text { value: prev }, Segment::Text { value: next }) =
            (&mut head[i - 1], &mut tail[0])
        else {
            continue;
        };
        carry_dash(prev, next);
        carry_punctuation(prev, next);
    }
}

/// Drops text emptied by boundary moves.
fn prune_empty_text(segments: &mut Vec<Segment>) {
    segments.retain(|s| !matches!(s, Segment::Text { value } if value.trim().is_empty()));
}

fn carry_dash(prev: &mut String, next: &mut String) {
    let without_ws = prev.trim_end();
    let Some(dash) = without_ws.chars().last().filter(|c| DASHES.contains(c)) else {
        return;
    };
    let kept = without_ws[..without_ws.len() - dash.len_utf8()]
        .trim_end()
        .to_string();
    *prev = kept;
    *next = format!("{} {}", dash, next.trim_start());
}

fn carry_punctuation(prev: &mut String, next: &mut String) {
    let rest = next.trim_start();
    let punct_len: usize = rest
        .chars()
        .take_while(|c| MIGRATING_PUNCTUATION.contains(c))
        .map(char::len_utf8)
        .sum();
    if punct_len == 0 {
        return;
    }
    let punct = &rest[..punct_len];
    let remainder = rest[punct_len..].trim_start().to_string();
    let joined = format!("{}{}", prev.trim_end(), punct);
    *prev = joined;
    *next = remainder;
}

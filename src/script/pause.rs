//! Pause marker grammar and duration resolution.
//!
//! A pause marker is written `[PAUSE:<spec>]` (case-insensitive) where
//! `<spec>` is one of:
//! - `<number>` or `<number>s`: literal seconds
//! - `<LABEL>`: table lookup
//! - `<LABEL>:<number>x`: table lookup times a multiplier
//! - `<LABEL>:<number>s`: literal seconds, label kept for readability
//!
//! The legacy form `<BREATH|FULL_BREATH|HALF_BREATH>:<integer>` is read as a
//! multiplier on the table value.

use crate::defaults;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Strict marker syntax, anchored. Used by [`is_valid_pause_format`].
#[allow(clippy::expect_used)]
static VALID_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\[PAUSE:([A-Z_]+(?::[0-9]+(?:\.[0-9]+)?[xs]?)?|[0-9]+(?:\.[0-9]+)?s?)\]$")
        .expect("valid marker regex")
});

/// Strict marker syntax, unanchored. Used by [`extract_markers`].
#[allow(clippy::expect_used)]
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[PAUSE:([A-Z_]+(?::[0-9]+(?:\.[0-9]+)?[xs]?)?|[0-9]+(?:\.[0-9]+)?s?)\]")
        .expect("marker regex")
});

/// Strict grammar of a marker's inner content.
#[allow(clippy::expect_used)]
static SPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[A-Z_]+(?::[0-9]+(?:\.[0-9]+)?[xs]?)?|[0-9]+(?:\.[0-9]+)?s?)$")
        .expect("spec regex")
});

#[allow(clippy::expect_used)]
static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)s?$").expect("numeric regex"));

#[allow(clippy::expect_used)]
static MODIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Z_]+):([0-9]+(?:\.[0-9]+)?)([xs])$").expect("modifier regex")
});

#[allow(clippy::expect_used)]
static LEGACY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(BREATH|FULL_BREATH|HALF_BREATH):([0-9]+)$").expect("legacy regex")
});

/// Mapping from uppercase pause label to seconds.
///
/// Keys are uppercased on construction so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct PauseTable {
    entries: BTreeMap<String, f64>,
}

impl PauseTable {
    /// Creates an empty table. Every lookup resolves to 0.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Seconds for `label`, or 0 when the label is unknown.
    pub fn lookup(&self, label: &str) -> f64 {
        self.entries
            .get(&label.to_uppercase())
            .copied()
            .unwrap_or(0.0)
    }

    /// Inserts or replaces a label.
    pub fn insert(&mut self, label: &str, seconds: f64) {
        self.entries.insert(label.to_uppercase(), seconds);
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(&label.to_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PauseTable {
    fn default() -> Self {
        defaults::PAUSE_LABELS.iter().copied().collect()
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for PauseTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = Self::empty();
        for (label, seconds) in iter {
            table.insert(label.as_ref(), seconds);
        }
        table
    }
}

impl From<BTreeMap<String, f64>> for PauseTable {
    fn from(map: BTreeMap<String, f64>) -> Self {
        map.into_iter().collect()
    }
}

impl From<PauseTable> for BTreeMap<String, f64> {
    fn from(table: PauseTable) -> Self {
        table.entries
    }
}

/// Resolves the content of one marker (the part after `PAUSE:`) to seconds.
///
/// Accepts the full `[PAUSE:...]` form as well. Never fails: anything that
/// does not match a known grammar falls through to a label lookup, which
/// yields 0 for unknown labels.
pub fn resolve(marker_content: &str, table: &PauseTable) -> f64 {
    let content = strip_marker(marker_content);

    if let Some(caps) = NUMERIC_RE.captures(content) {
        return parse_number(&caps[1]);
    }

    if let Some(caps) = MODIFIER_RE.captures(content) {
        let value = parse_number(&caps[2]);
        return if caps[3].eq_ignore_ascii_case("x") {
            table.lookup(&caps[1]) * value
        } else {
            value
        };
    }

    if let Some(caps) = LEGACY_RE.captures(content) {
        let multiplier = caps[2].parse::<u32>().map(f64::from).unwrap_or(0.0);
        return table.lookup(&caps[1]) * multiplier;
    }

    table.lookup(content)
}

/// True when `input` is exactly one well-formed `[PAUSE:<spec>]` marker.
pub fn is_valid_pause_format(input: &str) -> bool {
    VALID_MARKER_RE.is_match(input)
}

/// True when `content` (without the `[PAUSE:` / `]` wrapper) is a valid spec.
pub fn is_valid_spec(content: &str) -> bool {
    SPEC_RE.is_match(content)
}

/// Every well-formed marker in `text`, in order of appearance, unresolved.
pub fn extract_markers(text: &str) -> Vec<&str> {
    MARKER_RE.find_iter(text).map(|m| m.as_str()).collect()
}

fn strip_marker(input: &str) -> &str {
    let trimmed = input.trim();
    let inner = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("[PAUSE:") => &trimmed[7..],
        _ => trimmed,
    };
    inner.strip_suffix(']').unwrap_or(inner)
}

fn parse_number(raw: &str) -> f64 {
    raw.parse::<f64>().unwrap_or(0.0)
}

//! Density-aware selection of article sections to illustrate.
//!
//! Long paragraph-only articles would end up with a photo after every
//! paragraph if each one were enriched. The sampler instead picks a small,
//! evenly spread subset whose size grows with the article:
//!
//! ```text
//! eligible   target
//! 0          0
//! 1..=5      1
//! 6..=11     2
//! 12..=19    3
//! 20+        round(n / 6), clamped to 4..=5
//! ```
//!
//! When there are at least five eligible sections, the first and the last
//! are never picked (they tend to be lead-ins and sign-offs). The walk
//! starts at an offset derived from [`stable_hash`] of the document key and
//! the eligible count, so the same document always gets the same picks, and
//! different documents do not all start on the same paragraph.

use crate::hash::stable_hash;

/// Minimum length, in characters, of `header + " " + body` (trimmed) for a
/// section to be considered at all.
pub const MIN_ELIGIBLE_CHARS: usize = 20;

/// Eligible count from which the first and last sections are protected.
const EDGE_PROTECTION_FROM: usize = 5;

/// A run of document content that may receive an image.
///
/// Sections are built by the document layer and never mutated here.
/// `anchor` is a byte offset into the caller's document marking where an
/// image for this section would be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Zero-based position among all sections of the article.
    pub position: usize,
    pub header: Option<String>,
    pub body: String,
    pub anchor: usize,
}

impl Section {
    /// Header and body joined by a space, as used for keyword extraction.
    pub fn analysis_text(&self) -> String {
        format!("{} {}", self.header.as_deref().unwrap_or(""), self.body)
    }

    /// Whether the section has enough text to be worth illustrating.
    pub fn is_eligible(&self) -> bool {
        self.analysis_text().trim().chars().count() >= MIN_ELIGIBLE_CHARS
    }
}

/// Number of sections to pick out of `eligible` eligible ones.
pub fn target_density(eligible: usize) -> usize {
    let target = match eligible {
        0 => 0,
        1..6 => 1,
        6..12 => 2,
        12..20 => 3,
        // round-half-up of n / 6
        n => ((n + 3) / 6).clamp(4, 5),
    };
    target.min(eligible)
}

/// Pick the sections to enrich, preserving document order.
///
/// Pure: the same `(sections, document_key)` always yields the same result.
pub fn select<'a>(sections: &'a [Section], document_key: &str) -> Vec<&'a Section> {
    let eligible: Vec<&Section> = sections.iter().filter(|s| s.is_eligible()).collect();
    sample_indices(eligible.len(), document_key)
        .into_iter()
        .map(|i| eligible[i])
        .collect()
}

/// Indices into an eligible list of length `count`, ascending.
fn sample_indices(count: usize, document_key: &str) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }

    let target = target_density(count);
    let skip = usize::from(count >= EDGE_PROTECTION_FROM);
    let span = count.saturating_sub(2 * skip).max(1);
    let interval = (span / target).max(2);

    let seed = stable_hash(&format!("{document_key}:{count}"));
    let offset = seed as usize % interval;

    let end = count - skip;
    let mut start = skip + offset;
    if start >= end {
        start = skip;
    }

    let mut picked: Vec<usize> = (start..end).step_by(interval).take(target).collect();
    if picked.is_empty() {
        picked.push(skip.min(count - 1));
    }
    picked
}

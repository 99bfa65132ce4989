//! Diff calculation for change events.
//!
//! Computes a token-level longest-common-subsequence diff between two
//! normalized snapshots. Tokens are Unicode word-bound segments (words,
//! whitespace runs and punctuation), so segment edges never split a word.
//!
//! The common prefix and suffix are peeled off before the LCS table is built;
//! page edits are usually local, which keeps the table small. When the
//! remaining region is still too large the region is reported as one
//! removal followed by one addition.

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{DiffSegment, SegmentKind};

/// Largest LCS table (in cells) built before falling back to block replace.
const DEFAULT_MAX_TABLE_CELLS: usize = 4_000_000;

/// Calculator for computing diffs between snapshots.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    max_table_cells: usize,
}

impl DiffEngine {
    /// Create a diff engine with the default table limit.
    pub fn new() -> Self {
        Self {
            max_table_cells: DEFAULT_MAX_TABLE_CELLS,
        }
    }

    /// Create a diff engine with a custom table limit.
    pub fn with_table_limit(max_table_cells: usize) -> Self {
        Self { max_table_cells }
    }

    /// Diff `old_text` against `new_text`.
    ///
    /// Segments are in left-to-right order; adjacent segments never share a
    /// kind. Unchanged and added text concatenate to `new_text`, unchanged and
    /// removed text to `old_text`.
    pub fn diff(&self, old_text: &str, new_text: &str) -> Vec<DiffSegment> {
        if old_text == new_text {
            if old_text.is_empty() {
                return Vec::new();
            }
            return vec![DiffSegment::unchanged(old_text)];
        }
        if old_text.is_empty() {
            return vec![DiffSegment::added(new_text)];
        }
        if new_text.is_empty() {
            return vec![DiffSegment::removed(old_text)];
        }

        let old_tokens: Vec<&str> = old_text.split_word_bounds().collect();
        let new_tokens: Vec<&str> = new_text.split_word_bounds().collect();

        let prefix = old_tokens
            .iter()
            .zip(&new_tokens)
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old_tokens[prefix..]
            .iter()
            .rev()
            .zip(new_tokens[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_mid = &old_tokens[prefix..old_tokens.len() - suffix];
        let new_mid = &new_tokens[prefix..new_tokens.len() - suffix];

        let mut builder = SegmentBuilder::default();
        for token in &old_tokens[..prefix] {
            builder.push(SegmentKind::Unchanged, token);
        }

        let cells = (old_mid.len() + 1).saturating_mul(new_mid.len() + 1);
        if cells > self.max_table_cells {
            log::debug!(
                "Diff region {}x{} tokens exceeds table limit, reporting as replacement",
                old_mid.len(),
                new_mid.len()
            );
            for token in old_mid {
                builder.push(SegmentKind::Removed, token);
            }
            for token in new_mid {
                builder.push(SegmentKind::Added, token);
            }
        } else {
            lcs_walk(old_mid, new_mid, &mut builder);
        }

        for token in &old_tokens[old_tokens.len() - suffix..] {
            builder.push(SegmentKind::Unchanged, token);
        }
        builder.finish()
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to calculate a diff with default limits.
pub fn calculate_diff(old_text: &str, new_text: &str) -> Vec<DiffSegment> {
    DiffEngine::new().diff(old_text, new_text)
}

/// Emit segments for the LCS alignment of `a` and `b`.
///
/// `table[i][j]` holds the LCS length of `a[i..]` and `b[j..]`; removals are
/// preferred over additions on ties so a replaced run reads `-old +new`.
fn lcs_walk(a: &[&str], b: &[&str], builder: &mut SegmentBuilder) {
    let width = b.len() + 1;
    let mut table = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            builder.push(SegmentKind::Unchanged, a[i]);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            builder.push(SegmentKind::Removed, a[i]);
            i += 1;
        } else {
            builder.push(SegmentKind::Added, b[j]);
            j += 1;
        }
    }
    for token in &a[i..] {
        builder.push(SegmentKind::Removed, token);
    }
    for token in &b[j..] {
        builder.push(SegmentKind::Added, token);
    }
}

/// Accumulates tokens, merging runs of the same kind.
///
/// Within a changed run, removals are kept ahead of additions even when the
/// LCS walk interleaves them, which keeps both reconstructions intact.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<DiffSegment>,
    pending_removed: String,
    pending_added: String,
}

impl SegmentBuilder {
    fn push(&mut self, kind: SegmentKind, token: &str) {
        match kind {
            SegmentKind::Removed => self.pending_removed.push_str(token),
            SegmentKind::Added => self.pending_added.push_str(token),
            SegmentKind::Unchanged => {
                self.flush_changes();
                match self.segments.last_mut() {
                    Some(last) if last.kind == SegmentKind::Unchanged => {
                        last.text.push_str(token)
                    }
                    _ => self.segments.push(DiffSegment::unchanged(token)),
                }
            }
        }
    }

    fn flush_changes(&mut self) {
        if !self.pending_removed.is_empty() {
            let text = std::mem::take(&mut self.pending_removed);
            self.segments.push(DiffSegment::removed(text));
        }
        if !self.pending_added.is_empty() {
            let text = std::mem::take(&mut self.pending_added);
            self.segments.push(DiffSegment::added(text));
        }
    }

    fn finish(mut self) -> Vec<DiffSegment> {
        self.flush_changes();
        self.segments
    }
}

//! Change events and diff segments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a diff segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Unchanged,
    Added,
    Removed,
}

/// A run of text that is kept, inserted or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSegment {
    pub kind: SegmentKind,
    pub text: String,
}

impl DiffSegment {
    pub fn unchanged(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Unchanged,
            text: text.into(),
        }
    }

    pub fn added(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Added,
            text: text.into(),
        }
    }

    pub fn removed(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Removed,
            text: text.into(),
        }
    }

    /// Format for terminal display: `+text`, `-text` or ` text`.
    pub fn format(&self) -> String {
        let marker = match self.kind {
            SegmentKind::Unchanged => ' ',
            SegmentKind::Added => '+',
            SegmentKind::Removed => '-',
        };
        format!("{marker}{}", self.text)
    }
}

/// Rebuild the newer text from a diff.
pub fn reconstruct_new(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.kind != SegmentKind::Removed)
        .map(|s| s.text.as_str())
        .collect()
}

/// Rebuild the older text from a diff.
pub fn reconstruct_old(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.kind != SegmentKind::Added)
        .map(|s| s.text.as_str())
        .collect()
}

/// Emitted once per detected content change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub url: String,
    pub diff: Vec<DiffSegment>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(url: impl Into<String>, diff: Vec<DiffSegment>) -> Self {
        Self {
            url: url.into(),
            diff,
            occurred_at: Utc::now(),
        }
    }

    /// Number of added and removed segments.
    pub fn change_count(&self) -> usize {
        self.diff
            .iter()
            .filter(|s| s.kind != SegmentKind::Unchanged)
            .count()
    }

    /// Concatenated text of all added segments.
    pub fn added_text(&self) -> String {
        self.diff
            .iter()
            .filter(|s| s.kind == SegmentKind::Added)
            .map(|s| s.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DiffSegment> {
        vec![
            DiffSegment::unchanged("Price: "),
            DiffSegment::removed("10"),
            DiffSegment::added("12"),
            DiffSegment::unchanged(" EUR"),
        ]
    }

    #[test]
    fn test_reconstruct() {
        let diff = sample();
        assert_eq!(reconstruct_old(&diff), "Price: 10 EUR");
        assert_eq!(reconstruct_new(&diff), "Price: 12 EUR");
    }

    #[test]
    fn test_event_counts() {
        let event = ChangeEvent::new("https://example.com/", sample());
        assert_eq!(event.change_count(), 2);
        assert_eq!(event.added_text(), "12");
    }

    #[test]
    fn test_format() {
        assert_eq!(DiffSegment::added("x").format(), "+x");
        assert_eq!(DiffSegment::removed("x").format(), "-x");
        assert_eq!(DiffSegment::unchanged("x").format(), " x");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&DiffSegment::added("x")).unwrap();
        assert_eq!(json, r#"{"kind":"added","text":"x"}"#);
    }
}

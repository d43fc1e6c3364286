//! Core types for document comparison

use serde::{Deserialize, Serialize};

/// Token that marks a paragraph or hard line break boundary.
///
/// Sits in the private use area so it can never collide with extracted text.
pub const PARAGRAPH_SENTINEL: &str = "\u{E000}PARA";

/// Returns true if the token is a paragraph boundary marker
#[inline]
#[must_use]
pub fn is_sentinel(token: &str) -> bool {
    token == PARAGRAPH_SENTINEL
}

/// Rectangle in normalized page space (unit square, unrotated viewport)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Build from edges, returning `None` for degenerate boxes
    #[must_use]
    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Option<Self> {
        if right > left && bottom > top {
            Some(Self::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// True if the box is non-degenerate and within the unit square
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        const SLACK: f32 = 1e-5;
        self.width > 0.0
            && self.height > 0.0
            && self.left >= 0.0
            && self.top >= 0.0
            && self.right() <= 1.0 + SLACK
            && self.bottom() <= 1.0 + SLACK
    }

    /// Smallest box covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(left, top, right - left, bottom - top)
    }

    /// True if the boxes overlap or lie within `epsilon` of each other
    #[must_use]
    pub fn touches(&self, other: &Self, epsilon: f32) -> bool {
        self.left <= other.right() + epsilon
            && other.left <= self.right() + epsilon
            && self.top <= other.bottom() + epsilon
            && other.top <= self.bottom() + epsilon
    }
}

/// Position information for a single token
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Page number (1-indexed)
    pub page: usize,
    /// Paragraph number within the page (1-indexed)
    pub paragraph: usize,
    /// Token box, absent for sentinels and unmeasurable runs
    pub bbox: Option<BoundingBox>,
}

/// Text of a single paragraph as extracted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareParagraph {
    pub page: usize,
    pub paragraph: usize,
    pub text: String,
}

/// Viewport dimensions of a page in page-space units
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Output of text extraction for one document
#[derive(Clone, Debug, Default)]
pub struct ExtractedContent {
    pub tokens: Vec<String>,
    pub metadata: Vec<TokenMetadata>,
    pub page_sizes: Vec<PageSize>,
    pub paragraphs: Vec<CompareParagraph>,
}

impl ExtractedContent {
    /// Number of tokens that are not paragraph sentinels
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.tokens.iter().filter(|t| !is_sentinel(t)).count()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }
}

/// Classification of a diffed token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Unchanged,
    Added,
    Removed,
}

/// A token tagged with its diff classification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffToken {
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub text: String,
}

impl DiffToken {
    #[must_use]
    pub fn new(kind: DiffKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn unchanged(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Unchanged, text)
    }

    #[must_use]
    pub fn added(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Added, text)
    }

    #[must_use]
    pub fn removed(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Removed, text)
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        is_sentinel(&self.text)
    }
}

/// One side of a change record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSide {
    pub text: String,
    pub page: Option<usize>,
    pub paragraph: Option<usize>,
}

/// A grouped change between the two documents
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareChange {
    pub id: String,
    pub base: Option<ChangeSide>,
    pub comparison: Option<ChangeSide>,
}

impl CompareChange {
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.base.is_some() && self.comparison.is_none()
    }

    #[must_use]
    pub fn is_insertion(&self) -> bool {
        self.base.is_none() && self.comparison.is_some()
    }

    #[must_use]
    pub fn is_replacement(&self) -> bool {
        self.base.is_some() && self.comparison.is_some()
    }

    /// Page to jump to for the given pane
    #[must_use]
    pub fn page_for(&self, pane: Pane) -> Option<usize> {
        match pane {
            Pane::Base => self.base.as_ref().and_then(|s| s.page),
            Pane::Comparison => self.comparison.as_ref().and_then(|s| s.page),
        }
    }
}

/// Which document a value belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pane {
    Base,
    Comparison,
}

impl Pane {
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Base => Self::Comparison,
            Self::Comparison => Self::Base,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Base => 0,
            Self::Comparison => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Comparison => "comparison",
        }
    }
}

/// Rendered page as supplied by the page renderer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PagePreview {
    /// Page number (1-indexed)
    pub page_number: usize,
    /// Rendered width in pixels
    pub width: f32,
    /// Rendered height in pixels
    pub height: f32,
    /// Location of the rendered image
    pub url: String,
    /// Page rotation in degrees
    pub rotation: i32,
}

/// A single visual highlight tied to a change group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HighlightEntry {
    pub rect: BoundingBox,
    pub group_id: String,
}

/// Counts of classified tokens
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffTotals {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl DiffTotals {
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.removed + self.unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_edges_rejects_degenerate() {
        assert!(BoundingBox::from_edges(0.2, 0.2, 0.2, 0.4).is_none());
        assert!(BoundingBox::from_edges(0.2, 0.5, 0.4, 0.4).is_none());
        assert!(BoundingBox::from_edges(0.1, 0.1, 0.3, 0.2).is_some());
    }

    #[test]
    fn touches_respects_epsilon() {
        let a = BoundingBox::new(0.1, 0.1, 0.1, 0.05);
        let b = BoundingBox::new(0.203, 0.1, 0.1, 0.05);
        assert!(a.touches(&b, 0.004));
        assert!(!a.touches(&b, 0.001));
    }

    #[test]
    fn diff_token_serializes_with_type_tag() {
        let json = serde_json::to_string(&DiffToken::added("dog")).unwrap();
        assert_eq!(json, r#"{"type":"added","text":"dog"}"#);
    }
}

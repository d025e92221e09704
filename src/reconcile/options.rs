//! Reconciliation thresholds.
//!
//! The defaults are empirically tuned and carry no derivation; they are kept
//! as named constants so they can be re-tuned against an evaluation set.

use crate::model::BlockType;

/// A region counts as covered when more than this many provider lines touch it.
pub const DEFAULT_LAYOUT_COVERAGE_MIN_LINES: usize = 1;

/// Minimum share of covered regions for the embedded text to be usable.
pub const DEFAULT_LAYOUT_COVERAGE_THRESHOLD: f32 = 0.1;

/// A lone text region larger than this share of the page passes coverage.
pub const DEFAULT_FULL_PAGE_BLOCK_THRESHOLD: f32 = 0.8;

/// Detected lines overlapping a provider line by more than this share of
/// their own area are duplicates.
pub const DEFAULT_DUPLICATE_LINE_OVERLAP: f32 = 0.3;

/// Minimum share of a math box that must fall inside a line to merge into it.
pub const DEFAULT_INLINE_MATH_LINE_OVERLAP: f32 = 0.0;

/// Characters (or char-less spans) covered by more than this share are excised.
pub const DEFAULT_INLINE_MATH_CHAR_OVERLAP: f32 = 0.5;

/// Region types that never take part in coverage.
pub const DEFAULT_COVERAGE_EXCLUDED_TYPES: [BlockType; 6] = [
    BlockType::Figure,
    BlockType::Picture,
    BlockType::Table,
    BlockType::FigureGroup,
    BlockType::TableGroup,
    BlockType::PictureGroup,
];

/// Options for per-page line reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Lines a region needs (exclusive) to count as covered
    pub layout_coverage_min_lines: usize,

    /// Covered-region ratio needed to trust embedded text
    pub layout_coverage_threshold: f32,

    /// Page-area share for the single-large-block exception
    pub full_page_block_threshold: f32,

    /// Overlap share above which a detected line duplicates a provider line
    pub duplicate_line_overlap: f32,

    /// Overlap share above which a math box merges into a line
    pub inline_math_line_overlap: f32,

    /// Overlap share above which a character is excised for a math box
    pub inline_math_char_overlap: f32,

    /// Region types ignored when computing coverage
    pub coverage_excluded_types: Vec<BlockType>,
}

impl ReconcileOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coverage_min_lines(mut self, lines: usize) -> Self {
        self.layout_coverage_min_lines = lines;
        self
    }

    pub fn with_coverage_threshold(mut self, threshold: f32) -> Self {
        self.layout_coverage_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_full_page_block_threshold(mut self, threshold: f32) -> Self {
        self.full_page_block_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_duplicate_line_overlap(mut self, overlap: f32) -> Self {
        self.duplicate_line_overlap = overlap.clamp(0.0, 1.0);
        self
    }

    pub fn with_inline_math_line_overlap(mut self, overlap: f32) -> Self {
        self.inline_math_line_overlap = overlap.clamp(0.0, 1.0);
        self
    }

    pub fn with_inline_math_char_overlap(mut self, overlap: f32) -> Self {
        self.inline_math_char_overlap = overlap.clamp(0.0, 1.0);
        self
    }

    /// Replace the region types excluded from coverage.
    pub fn with_coverage_excluded_types(mut self, types: Vec<BlockType>) -> Self {
        self.coverage_excluded_types = types;
        self
    }

    pub(crate) fn counts_for_coverage(&self, block_type: BlockType) -> bool {
        block_type.is_region() && !self.coverage_excluded_types.contains(&block_type)
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            layout_coverage_min_lines: DEFAULT_LAYOUT_COVERAGE_MIN_LINES,
            layout_coverage_threshold: DEFAULT_LAYOUT_COVERAGE_THRESHOLD,
            full_page_block_threshold: DEFAULT_FULL_PAGE_BLOCK_THRESHOLD,
            duplicate_line_overlap: DEFAULT_DUPLICATE_LINE_OVERLAP,
            inline_math_line_overlap: DEFAULT_INLINE_MATH_LINE_OVERLAP,
            inline_math_char_overlap: DEFAULT_INLINE_MATH_CHAR_OVERLAP,
            coverage_excluded_types: DEFAULT_COVERAGE_EXCLUDED_TYPES.to_vec(),
        }
    }
}

//! Rendering result with metadata and statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{BlockType, Metadata, OutputNode};

/// Result of rendering a document, including content and statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderResult {
    /// The rendered content (HTML, Markdown, JSON)
    pub content: String,

    /// Extracted image assets by file name (PNG bytes)
    pub images: BTreeMap<String, Vec<u8>>,

    /// Document metadata (copied from source document)
    pub metadata: Metadata,

    /// Extraction statistics
    pub stats: ExtractionStats,
}

impl RenderResult {
    /// Create a new render result.
    pub fn new(
        content: String,
        images: BTreeMap<String, Vec<u8>>,
        metadata: Metadata,
        stats: ExtractionStats,
    ) -> Self {
        Self {
            content,
            images,
            metadata,
            stats,
        }
    }
}

/// Statistics collected while rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Total number of pages rendered
    pub page_count: u32,

    /// Number of layout regions rendered
    pub region_count: u32,

    /// Number of text lines rendered
    pub line_count: u32,

    /// Number of tables rendered
    pub table_count: u32,

    /// Number of images rendered
    pub image_count: u32,

    /// Number of headings rendered
    pub heading_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,
}

impl ExtractionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a rendered page node and everything under it.
    pub fn tally_page(&mut self, page: &OutputNode) {
        self.page_count += 1;
        for child in &page.children {
            self.tally(child);
        }
    }

    fn tally(&mut self, node: &OutputNode) {
        let block_type = node.block_type();
        match block_type {
            BlockType::Line => self.line_count += 1,
            BlockType::Span | BlockType::Char | BlockType::Page => {}
            _ => {
                self.region_count += 1;
                if block_type.is_image() {
                    self.image_count += 1;
                }
                if block_type == BlockType::SectionHeader {
                    self.heading_count += 1;
                }
                if block_type == BlockType::Table {
                    self.table_count += 1;
                }
            }
        }
        for child in &node.children {
            self.tally(child);
        }
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }
}

//! Document-level types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::block::{BlockId, BlockType, SourceMethod};
use super::output::DEFAULT_HEADING_LEVEL;
use super::page::Page;
use crate::error::{Error, Result};
use crate::geometry::Polygon;

/// An assembled document: pages in order plus derived metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, table of contents, per-page stats)
    pub metadata: Metadata,

    /// Pages in the document
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Append a page. Its index must be the next page position.
    pub fn add_page(&mut self, page: Page) -> Result<()> {
        if page.index != self.page_count() {
            return Err(Error::Address(format!(
                "page index {} does not follow page {}",
                page.index,
                self.pages.len()
            )));
        }
        self.pages.push(page);
        Ok(())
    }

    /// Get a page by index (0-based).
    pub fn get_page(&self, index: u32) -> Option<&Page> {
        self.pages.get(index as usize)
    }

    pub fn get_page_mut(&mut self, index: u32) -> Option<&mut Page> {
        self.pages.get_mut(index as usize)
    }

    fn page_checked(&self, index: u32) -> Result<&Page> {
        let count = self.page_count();
        self.get_page(index)
            .ok_or(Error::PageOutOfRange(index, count))
    }

    fn page_checked_mut(&mut self, index: u32) -> Result<&mut Page> {
        let count = self.page_count();
        self.get_page_mut(index)
            .ok_or(Error::PageOutOfRange(index, count))
    }

    /// Allocate a region at page scope. Fails only for an invalid page index.
    pub fn add_block(
        &mut self,
        page_index: u32,
        block_type: BlockType,
        polygon: Polygon,
    ) -> Result<BlockId> {
        self.page_checked_mut(page_index)?
            .add_block(block_type, polygon)
    }

    /// Resolve a block id anywhere in the document.
    pub fn get_block(&self, id: BlockId) -> Option<&super::Block> {
        self.get_page(id.page)?.get_block(id)
    }

    /// Append `child` to `parent`'s structure. Cross-page links are refused.
    pub fn add_structure(&mut self, parent: BlockId, child: BlockId) -> Result<()> {
        if parent.page != child.page {
            let err = Error::Address(format!(
                "cross-page reference from {} to {}",
                parent, child
            ));
            log::warn!("Dropping structure reference: {}", err);
            return Err(err);
        }
        self.page_checked_mut(parent.page)?
            .add_structure(parent, child)
    }

    /// Swap `old` for `new` in `parent`'s structure.
    pub fn replace_block(&mut self, parent: BlockId, old: BlockId, new: BlockId) -> Result<()> {
        if parent.page != old.page || parent.page != new.page {
            return Err(Error::Address(format!(
                "cross-page replacement of {} by {} under {}",
                old, new, parent
            )));
        }
        self.page_checked_mut(parent.page)?
            .replace_block(parent, old, new)
    }

    /// Plain text under a block.
    pub fn raw_text(&self, id: BlockId) -> Result<String> {
        Ok(self.page_checked(id.page)?.raw_text(id))
    }

    /// Recompute the table of contents, title, and per-page statistics.
    pub fn refresh_metadata(&mut self) {
        let mut toc = Vec::new();
        let mut page_stats = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let mut block_counts = BTreeMap::new();
            for id in page.contained_blocks(page.id(), &[]) {
                if id.block_type.is_region() {
                    *block_counts.entry(id.block_type).or_insert(0) += 1;
                }
            }
            page_stats.push(PageStats {
                page: page.index,
                text_extraction_method: page.text_extraction_method,
                block_counts,
            });

            for id in page.contained_blocks(page.id(), &[BlockType::SectionHeader]) {
                let Some(block) = page.get_block(id) else {
                    continue;
                };
                if block.ignore_for_output {
                    continue;
                }
                let title = page
                    .raw_text(id)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if title.is_empty() {
                    continue;
                }
                toc.push(TocEntry {
                    title,
                    heading_level: block
                        .region()
                        .and_then(|r| r.heading_level)
                        .unwrap_or(DEFAULT_HEADING_LEVEL),
                    page: page.index,
                    polygon: block.polygon,
                });
            }
        }

        self.metadata.title = toc
            .iter()
            .find(|entry| entry.heading_level == 1)
            .map(|entry| entry.title.clone());
        self.metadata.page_count = self.page_count();
        self.metadata.table_of_contents = toc;
        self.metadata.page_stats = page_stats;
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title (the first level-1 heading)
    pub title: Option<String>,

    /// Total number of pages
    pub page_count: u32,

    /// Section headers in reading order
    pub table_of_contents: Vec<TocEntry>,

    /// Per-page extraction statistics
    pub page_stats: Vec<PageStats>,
}

impl Metadata {
    /// Convert metadata to YAML frontmatter format.
    pub fn to_yaml_frontmatter(&self) -> String {
        let mut lines = vec!["---".to_string()];

        if let Some(ref title) = self.title {
            lines.push(format!("title: \"{}\"", escape_yaml(title)));
        }
        lines.push(format!("pages: {}", self.page_count));

        let ocr_pages: Vec<String> = self
            .page_stats
            .iter()
            .filter(|stats| stats.text_extraction_method == SourceMethod::Ocr)
            .map(|stats| stats.page.to_string())
            .collect();
        if !ocr_pages.is_empty() {
            lines.push(format!("ocr_pages: [{}]", ocr_pages.join(", ")));
        }

        lines.push("---".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// One table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub heading_level: u8,
    pub page: u32,
    pub polygon: Polygon,
}

/// Statistics for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStats {
    pub page: u32,
    pub text_extraction_method: SourceMethod,
    pub block_counts: BTreeMap<BlockType, usize>,
}

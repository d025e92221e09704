//! Heading levels from a size histogram of section headers.

use std::collections::BTreeMap;

use crate::model::{Block, BlockId, BlockType, Document, Page};

/// Deepest level assigned by inference.
pub const MAX_INFERRED_HEADING_LEVEL: u8 = 4;

/// Sizes within this many points share a level.
const SIZE_TOLERANCE: f32 = 0.5;

/// Observed header sizes and the levels derived from them.
#[derive(Debug, Clone, Default)]
pub struct HeadingStatistics {
    /// Distinct sizes, largest first, after clustering
    pub heading_sizes: Vec<f32>,
    /// All observed sizes with frequency
    pub size_histogram: BTreeMap<i32, usize>,
}

impl HeadingStatistics {
    /// Add a size observation.
    pub fn add_size(&mut self, size: f32) {
        if !size.is_finite() || size <= 0.0 {
            return;
        }
        let key = (size * 10.0).round() as i32; // 0.1 precision
        *self.size_histogram.entry(key).or_insert(0) += 1;
    }

    /// Cluster observed sizes, largest first.
    pub fn analyze(&mut self) {
        let mut sizes: Vec<f32> = self
            .size_histogram
            .keys()
            .rev()
            .map(|key| *key as f32 / 10.0)
            .collect();
        sizes.dedup_by(|smaller, larger| *larger - *smaller <= SIZE_TOLERANCE);
        self.heading_sizes = sizes;
    }

    /// Heading level for a size: 1 for the largest cluster, capped at
    /// [`MAX_INFERRED_HEADING_LEVEL`].
    pub fn get_heading_level(&self, size: f32) -> u8 {
        for (i, &heading_size) in self.heading_sizes.iter().enumerate() {
            if size >= heading_size - SIZE_TOLERANCE {
                return (i + 1).min(MAX_INFERRED_HEADING_LEVEL as usize) as u8;
            }
        }
        MAX_INFERRED_HEADING_LEVEL
    }
}

/// Representative size of a header: mean font size of its spans when the
/// source reports one, else mean line height.
fn header_size(page: &Page, id: BlockId) -> Option<f32> {
    let spans = page.contained_blocks(id, &[BlockType::Span]);
    let font_sizes: Vec<f32> = spans
        .iter()
        .filter_map(|span| page.get_block(*span).and_then(Block::span))
        .filter_map(|span| span.font.size)
        .collect();
    if !font_sizes.is_empty() {
        return Some(font_sizes.iter().sum::<f32>() / font_sizes.len() as f32);
    }

    let heights: Vec<f32> = page
        .children(id)
        .iter()
        .filter(|child| child.block_type == BlockType::Line)
        .filter_map(|child| page.get_block(*child).map(|line| line.polygon.height()))
        .collect();
    if heights.is_empty() {
        return None;
    }
    Some(heights.iter().sum::<f32>() / heights.len() as f32)
}

/// Assign levels to every section header that does not have one yet.
pub fn infer_heading_levels(document: &mut Document) -> HeadingStatistics {
    let mut measured = Vec::new();
    for page in &document.pages {
        for id in page.contained_blocks(page.id(), &[BlockType::SectionHeader]) {
            if let Some(size) = header_size(page, id) {
                measured.push((id, size));
            }
        }
    }

    let mut stats = HeadingStatistics::default();
    for (_, size) in &measured {
        stats.add_size(*size);
    }
    stats.analyze();

    for (id, size) in measured {
        let level = stats.get_heading_level(size);
        let Some(region) = document
            .get_page_mut(id.page)
            .and_then(|page| page.get_block_mut(id))
            .and_then(Block::region_mut)
        else {
            continue;
        };
        if region.heading_level.is_none() {
            region.heading_level = Some(level);
        }
    }

    stats
}

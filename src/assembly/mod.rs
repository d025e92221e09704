//! Page assembly: builds layout regions and attaches reconciled lines to them.

mod continuation;
mod headings;

pub use continuation::{ends_sentence, flag_continuations};
pub use headings::{infer_heading_levels, HeadingStatistics, MAX_INFERRED_HEADING_LEVEL};

use crate::collaborator::LayoutPrediction;
use crate::error::Result;
use crate::geometry::{intersection_matrix, Polygon};
use crate::model::{
    BlockContent, BlockId, BlockType, CharContent, Page, ProviderOutput, RegionContent,
    SourceMethod, SpanContent,
};

/// Builds a page's region list and assigns every line to one region.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageAssembler;

impl PageAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Create one empty region per detected layout region, rescaled from the
    /// detector's image space into page points.
    pub fn build_regions(&self, page: &mut Page, prediction: &LayoutPrediction) -> Vec<BlockId> {
        let page_size = page.size();
        let mut ids = Vec::with_capacity(prediction.regions.len());

        for region in &prediction.regions {
            if !region.label.is_region() {
                log::warn!(
                    "Page {}: ignoring layout region labelled {}",
                    page.index,
                    region.label
                );
                continue;
            }

            let polygon = region.polygon.rescale(prediction.image_size, page_size);
            let content = BlockContent::Region(RegionContent {
                scores: region.scores.clone(),
                ..Default::default()
            });
            let id = match page.allocate(region.label, polygon, content, SourceMethod::Heuristic) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("Page {}: {}", page.index, e);
                    continue;
                }
            };
            if let Some(block) = page.get_block_mut(id) {
                block.ignore_for_output =
                    matches!(region.label, BlockType::PageHeader | BlockType::PageFooter);
            }
            page.structure.push(id);
            ids.push(id);
        }

        log::debug!("Page {}: built {} layout region(s)", page.index, ids.len());
        ids
    }

    /// Add a full-page text region when the page has no region to receive lines.
    pub fn ensure_fallback_region(&self, page: &mut Page) -> Result<Option<BlockId>> {
        if !receiving_regions(page).is_empty() {
            return Ok(None);
        }
        let id = page.allocate(
            BlockType::Text,
            page.polygon,
            BlockContent::Region(RegionContent::default()),
            SourceMethod::Heuristic,
        )?;
        page.structure.push(id);
        log::debug!("Page {}: added full-page fallback region", page.index);
        Ok(Some(id))
    }

    /// Allocate `Line`, `Span`, and `Char` blocks for each line. The lines
    /// start unattached.
    pub fn insert_lines(&self, page: &mut Page, lines: Vec<ProviderOutput>) -> Result<Vec<BlockId>> {
        let mut ids = Vec::with_capacity(lines.len());
        for line in lines {
            let line_id = page.allocate(BlockType::Line, line.polygon, BlockContent::Line, line.source)?;

            for span in line.spans {
                let content = BlockContent::Span(SpanContent {
                    text: span.text,
                    font: span.font,
                    format: span.format,
                    url: span.url,
                });
                let span_id = page.allocate(BlockType::Span, span.polygon, content, line.source)?;
                page.add_structure(line_id, span_id)?;

                for c in span.chars.unwrap_or_default() {
                    let content = BlockContent::Char(CharContent { text: c.text });
                    let char_id = page.allocate(BlockType::Char, c.polygon, content, line.source)?;
                    page.add_structure(span_id, char_id)?;
                }
            }
            ids.push(line_id);
        }
        Ok(ids)
    }

    /// Attach each line to the region it overlaps most, or to the nearest
    /// region by center distance when it overlaps none. Regions grow to
    /// cover their lines; lines inside a region are kept top-to-bottom.
    pub fn assign_lines(&self, page: &mut Page, lines: &[BlockId]) {
        let regions = receiving_regions(page);
        if regions.is_empty() {
            if !lines.is_empty() {
                log::warn!("Page {}: {} line(s) with no region", page.index, lines.len());
            }
            return;
        }

        let region_polygons: Vec<Polygon> = regions.iter().map(|(_, polygon)| *polygon).collect();
        let line_polygons: Vec<Polygon> = lines
            .iter()
            .filter_map(|id| page.get_block(*id).map(|block| block.polygon))
            .collect();
        if line_polygons.len() != lines.len() {
            log::warn!("Page {}: some lines do not resolve", page.index);
            return;
        }

        let matrix = intersection_matrix(&line_polygons, &region_polygons);
        let mut touched = Vec::new();
        for ((line_id, line_polygon), row) in lines.iter().zip(&line_polygons).zip(&matrix) {
            let target = largest_overlap(row)
                .unwrap_or_else(|| nearest_region(line_polygon, &region_polygons));
            let region_id = regions[target].0;

            if page.add_structure(region_id, *line_id).is_err() {
                continue;
            }
            if let Some(region) = page.get_block_mut(region_id) {
                region.polygon = region.polygon.merge(&[*line_polygon]);
            }
            if !touched.contains(&region_id) {
                touched.push(region_id);
            }
        }

        for region_id in touched {
            sort_lines(page, region_id);
        }
    }

    /// Make sure lines have a region, then insert and assign them.
    pub fn assemble(&self, page: &mut Page, lines: Vec<ProviderOutput>) -> Result<Vec<BlockId>> {
        if !lines.is_empty() {
            self.ensure_fallback_region(page)?;
        }
        let ids = self.insert_lines(page, lines)?;
        self.assign_lines(page, &ids);
        Ok(ids)
    }
}

/// Top-level regions that can hold lines, in reading order.
fn receiving_regions(page: &Page) -> Vec<(BlockId, Polygon)> {
    page.structure
        .iter()
        .filter(|id| id.block_type.is_region())
        .filter_map(|id| page.get_block(*id).map(|block| (*id, block.polygon)))
        .collect()
}

/// Column with the largest nonzero value; ties keep the first.
fn largest_overlap(row: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, area) in row.iter().enumerate() {
        if *area > 0.0 && best.map_or(true, |(_, current)| *area > current) {
            best = Some((index, *area));
        }
    }
    best.map(|(index, _)| index)
}

/// Region whose center is closest; ties keep the first.
fn nearest_region(line: &Polygon, regions: &[Polygon]) -> usize {
    let mut best = (0, f32::INFINITY);
    for (index, region) in regions.iter().enumerate() {
        let distance = line.center_distance(region);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best.0
}

/// Lines whose tops differ by at most this fraction of their height share a row.
const ROW_TOLERANCE: f32 = 0.3;

/// Order a region's lines by row, then left to right within each row.
fn sort_lines(page: &mut Page, region_id: BlockId) {
    let mut keyed: Vec<(Polygon, BlockId)> = page
        .children(region_id)
        .iter()
        .filter_map(|id| page.get_block(*id).map(|block| (block.polygon, *id)))
        .collect();
    keyed.sort_by(|a, b| a.0.y_start().total_cmp(&b.0.y_start()));

    let mut rows: Vec<Vec<(Polygon, BlockId)>> = Vec::new();
    let mut row_top: Option<f32> = None;
    for (polygon, id) in keyed {
        let tolerance = polygon.height() * ROW_TOLERANCE;
        let same_row = row_top.is_some_and(|top| (polygon.y_start() - top).abs() <= tolerance);
        if let (true, Some(row)) = (same_row, rows.last_mut()) {
            row.push((polygon, id));
            continue;
        }
        row_top = Some(polygon.y_start());
        rows.push(vec![(polygon, id)]);
    }

    let ordered: Vec<BlockId> = rows
        .into_iter()
        .flat_map(|mut row| {
            row.sort_by(|a, b| a.0.x_start().total_cmp(&b.0.x_start()));
            row.into_iter().map(|(_, id)| id)
        })
        .collect();

    if let Some(region) = page.get_block_mut(region_id) {
        if ordered.len() == region.structure.len() {
            region.structure = ordered;
        }
    }
}

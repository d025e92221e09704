//! Layout coverage and duplicate-line filtering.

use crate::geometry::Polygon;
use crate::model::{Page, ProviderOutput};

use super::ReconcileOptions;

/// How well provider lines cover a page's layout regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageReport {
    /// Regions taking part in coverage
    pub total_regions: usize,

    /// Regions touched by more than the minimum number of lines
    pub covered_regions: usize,

    /// `covered / total`, 1.0 when there are no regions
    pub ratio: f32,

    /// The page is a single text region spanning most of the page
    pub large_text_block: bool,

    /// Coverage is good enough to keep provider text
    pub text_okay: bool,
}

/// Measure how many of the page's regions contain provider lines.
pub fn layout_coverage(
    page: &Page,
    lines: &[ProviderOutput],
    options: &ReconcileOptions,
) -> CoverageReport {
    let regions: Vec<_> = page
        .structure
        .iter()
        .filter(|id| options.counts_for_coverage(id.block_type))
        .filter_map(|id| page.get_block(*id))
        .collect();

    let covered_regions = regions
        .iter()
        .filter(|region| {
            let touching = lines
                .iter()
                .filter(|line| region.polygon.intersection_area(&line.polygon) > 0.0)
                .count();
            touching > options.layout_coverage_min_lines
        })
        .count();

    let total_regions = regions.len();
    let ratio = if total_regions == 0 {
        1.0
    } else {
        covered_regions as f32 / total_regions as f32
    };

    let page_area = page.area();
    let large_text_block = match regions.as_slice() {
        [region] => {
            region.block_type().is_text_flow()
                && page_area > 0.0
                && region.polygon.area() / page_area > options.full_page_block_threshold
        }
        _ => false,
    };

    CoverageReport {
        total_regions,
        covered_regions,
        ratio,
        large_text_block,
        text_okay: large_text_block || ratio >= options.layout_coverage_threshold,
    }
}

/// Drop detected lines that mostly sit on top of a provider line.
///
/// Returns the surviving lines in their original order.
pub fn filter_duplicate_lines(
    detected: &[Polygon],
    provider: &[ProviderOutput],
    options: &ReconcileOptions,
) -> Vec<Polygon> {
    detected
        .iter()
        .filter(|candidate| {
            !provider.iter().any(|line| {
                candidate.intersection_pct(&line.polygon) > options.duplicate_line_overlap
            })
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockType, ProviderSpan, SourceMethod};

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Polygon {
        Polygon::from_bbox([x0, y0, x1, y1]).unwrap()
    }

    fn line(x0: f32, y0: f32, x1: f32, y1: f32) -> ProviderOutput {
        let polygon = rect(x0, y0, x1, y1);
        ProviderOutput::new(
            polygon,
            vec![ProviderSpan::new("text", polygon)],
            SourceMethod::Vector,
        )
    }

    #[test]
    fn test_no_regions_is_fully_covered() {
        let page = Page::new(0, 100.0, 100.0).unwrap();
        let report = layout_coverage(&page, &[], &ReconcileOptions::default());
        assert_eq!(report.ratio, 1.0);
        assert!(report.text_okay);
    }

    #[test]
    fn test_region_needs_more_than_min_lines() {
        let mut page = Page::new(0, 1000.0, 1000.0).unwrap();
        page.add_block(BlockType::Text, rect(0.0, 0.0, 100.0, 100.0)).unwrap();
        page.add_block(BlockType::Text, rect(0.0, 200.0, 100.0, 300.0)).unwrap();

        let one_line = [line(0.0, 10.0, 100.0, 20.0)];
        let report = layout_coverage(&page, &one_line, &ReconcileOptions::default());
        assert_eq!(report.covered_regions, 0);

        let two_lines = [line(0.0, 10.0, 100.0, 20.0), line(0.0, 30.0, 100.0, 40.0)];
        let report = layout_coverage(&page, &two_lines, &ReconcileOptions::default());
        assert_eq!(report.covered_regions, 1);
        assert_eq!(report.ratio, 0.5);
        assert!(report.text_okay);
    }

    #[test]
    fn test_low_coverage_fails() {
        let mut page = Page::new(0, 1000.0, 2000.0).unwrap();
        for i in 0..11 {
            let y = i as f32 * 150.0;
            page.add_block(BlockType::Text, rect(0.0, y, 100.0, y + 100.0)).unwrap();
        }
        let lines = [line(0.0, 10.0, 100.0, 20.0), line(0.0, 30.0, 100.0, 40.0)];
        let report = layout_coverage(&page, &lines, &ReconcileOptions::default());
        assert_eq!(report.covered_regions, 1);
        assert!(report.ratio < 0.1);
        assert!(!report.text_okay);
    }

    #[test]
    fn test_excluded_regions_ignored() {
        let mut page = Page::new(0, 1000.0, 1000.0).unwrap();
        page.add_block(BlockType::Picture, rect(0.0, 0.0, 500.0, 500.0)).unwrap();
        page.add_block(BlockType::Table, rect(0.0, 500.0, 500.0, 900.0)).unwrap();
        let report = layout_coverage(&page, &[], &ReconcileOptions::default());
        assert_eq!(report.total_regions, 0);
        assert!(report.text_okay);
    }

    #[test]
    fn test_single_large_text_block_exception() {
        let mut page = Page::new(0, 100.0, 100.0).unwrap();
        page.add_block(BlockType::Text, rect(0.0, 0.0, 95.0, 95.0)).unwrap();
        let report = layout_coverage(&page, &[], &ReconcileOptions::default());
        assert_eq!(report.ratio, 0.0);
        assert!(report.large_text_block);
        assert!(report.text_okay);
    }

    #[test]
    fn test_single_small_block_no_exception() {
        let mut page = Page::new(0, 100.0, 100.0).unwrap();
        page.add_block(BlockType::Text, rect(0.0, 0.0, 50.0, 50.0)).unwrap();
        let report = layout_coverage(&page, &[], &ReconcileOptions::default());
        assert!(!report.large_text_block);
        assert!(!report.text_okay);
    }

    #[test]
    fn test_filter_duplicate_lines() {
        let provider = [line(0.0, 0.0, 100.0, 10.0)];
        let detected = [
            rect(0.0, 0.0, 100.0, 10.0),
            rect(0.0, 8.0, 100.0, 18.0),
            rect(0.0, 50.0, 100.0, 60.0),
        ];
        let kept = filter_duplicate_lines(&detected, &provider, &ReconcileOptions::default());
        assert_eq!(kept, vec![detected[1], detected[2]]);
    }
}

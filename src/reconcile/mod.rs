//! Per-page line reconciliation.
//!
//! Each page carries two competing sets of lines: provider lines with
//! embedded text and detected boxes that still need recognition. The
//! reconciler decides per page which set wins, removes duplicates, and folds
//! inline-math boxes into the surviving lines.

mod coverage;
mod inline_math;
mod markup;
mod options;

pub use coverage::{filter_duplicate_lines, layout_coverage, CoverageReport};
pub use inline_math::{best_line_for_math, excise_math, merge_inline_math, MathMerge, MathSpanRef};
pub use markup::MarkupSpanBuilder;
pub use options::{
    ReconcileOptions, DEFAULT_COVERAGE_EXCLUDED_TYPES, DEFAULT_DUPLICATE_LINE_OVERLAP,
    DEFAULT_FULL_PAGE_BLOCK_THRESHOLD, DEFAULT_INLINE_MATH_CHAR_OVERLAP,
    DEFAULT_INLINE_MATH_LINE_OVERLAP, DEFAULT_LAYOUT_COVERAGE_MIN_LINES,
    DEFAULT_LAYOUT_COVERAGE_THRESHOLD,
};

use crate::collaborator::{RecognizedLine, TextQuality};
use crate::geometry::Polygon;
use crate::model::{Page, ProviderOutput, SourceMethod};

/// Everything known about one page's text before reconciliation.
#[derive(Debug, Clone, Default)]
pub struct PageEvidence {
    /// Lines with embedded text, in reading order
    pub provider_lines: Vec<ProviderOutput>,

    /// Text-line boxes from the line detector, in page points
    pub detected_lines: Vec<Polygon>,

    /// Inline-math boxes from the line detector, in page points
    pub math_boxes: Vec<Polygon>,

    /// Classifier verdict on the provider text
    pub quality: TextQuality,

    /// A collaborator failed for this page
    pub collaborator_failed: bool,
}

/// A box queued for recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrLine {
    pub polygon: Polygon,

    /// The box is a standalone math region
    pub math: bool,
}

/// Result of reconciling one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledPage {
    /// `Vector` when provider text was kept, `Ocr` otherwise
    pub method: SourceMethod,

    pub coverage: CoverageReport,

    /// Provider lines kept for the page
    pub lines: Vec<ProviderOutput>,

    /// Boxes that need recognized text
    pub ocr_lines: Vec<OcrLine>,

    /// Empty math spans inside `lines` that need recognized text
    pub math_spans: Vec<MathSpanRef>,
}

impl ReconciledPage {
    /// Boxes to send to the recognizer: OCR lines first, then math spans.
    pub fn ocr_boxes(&self) -> Vec<Polygon> {
        self.ocr_lines
            .iter()
            .map(|line| line.polygon)
            .chain(self.math_spans.iter().map(|span| span.polygon))
            .collect()
    }

    pub fn needs_ocr(&self) -> bool {
        !self.ocr_lines.is_empty() || !self.math_spans.is_empty()
    }
}

/// Decides, per page, which line set becomes the page's text.
#[derive(Debug, Clone, Default)]
pub struct LineReconciler {
    options: ReconcileOptions,
}

impl LineReconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Whether the provider text can be kept, with the coverage it was
    /// judged on. The page's layout regions must already be built.
    pub fn is_trustworthy(&self, page: &Page, evidence: &PageEvidence) -> (bool, CoverageReport) {
        let coverage = layout_coverage(page, &evidence.provider_lines, &self.options);
        let trusted = !evidence.collaborator_failed
            && !evidence.provider_lines.is_empty()
            && evidence.quality != TextQuality::Bad
            && coverage.text_okay;
        (trusted, coverage)
    }

    /// Reconcile one page. Never fails: empty inputs yield an empty result.
    pub fn reconcile(&self, page: &Page, evidence: PageEvidence) -> ReconciledPage {
        let (trusted, coverage) = self.is_trustworthy(page, &evidence);
        log::debug!(
            "Page {}: coverage {:.2} ({}/{} regions), quality {:?}, provider text {}",
            page.index,
            coverage.ratio,
            coverage.covered_regions,
            coverage.total_regions,
            evidence.quality,
            if trusted { "kept" } else { "discarded" }
        );

        if trusted {
            self.reconcile_trusted(page, evidence, coverage)
        } else {
            self.reconcile_untrusted(page, evidence, coverage)
        }
    }

    fn reconcile_trusted(
        &self,
        page: &Page,
        evidence: PageEvidence,
        coverage: CoverageReport,
    ) -> ReconciledPage {
        let PageEvidence {
            mut provider_lines,
            detected_lines,
            math_boxes,
            ..
        } = evidence;

        let survivors = filter_duplicate_lines(&detected_lines, &provider_lines, &self.options);
        log::debug!(
            "Page {}: discarded {} duplicate detected line(s)",
            page.index,
            detected_lines.len() - survivors.len()
        );

        let merge = merge_inline_math(&mut provider_lines, &math_boxes, &self.options);
        if !merge.unmatched.is_empty() {
            log::debug!(
                "Page {}: {} math box(es) matched no provider line",
                page.index,
                merge.unmatched.len()
            );
        }

        ReconciledPage {
            method: SourceMethod::Vector,
            coverage,
            lines: provider_lines,
            ocr_lines: survivors
                .into_iter()
                .map(|polygon| OcrLine {
                    polygon,
                    math: false,
                })
                .collect(),
            math_spans: merge.placeholders,
        }
    }

    fn reconcile_untrusted(
        &self,
        page: &Page,
        evidence: PageEvidence,
        coverage: CoverageReport,
    ) -> ReconciledPage {
        let mut ocr_lines: Vec<OcrLine> = evidence
            .detected_lines
            .iter()
            .map(|polygon| OcrLine {
                polygon: *polygon,
                math: false,
            })
            .collect();

        let detected = evidence.detected_lines;
        let mut absorbed = 0;
        for math in &evidence.math_boxes {
            match best_line_for_math(math, &detected, self.options.inline_math_line_overlap) {
                Some(index) => {
                    let line = &mut ocr_lines[index];
                    line.polygon = line.polygon.merge(&[*math]);
                    absorbed += 1;
                }
                None => ocr_lines.push(OcrLine {
                    polygon: *math,
                    math: true,
                }),
            }
        }
        log::debug!(
            "Page {}: queued {} line(s) for OCR, {} math box(es) absorbed into lines",
            page.index,
            ocr_lines.len(),
            absorbed
        );

        ReconciledPage {
            method: SourceMethod::Ocr,
            coverage,
            lines: Vec::new(),
            ocr_lines,
            math_spans: Vec::new(),
        }
    }

    /// Fill the page's queued boxes with recognizer output, in the order of
    /// [`ReconciledPage::ocr_boxes`], and return the final line set.
    ///
    /// Missing recognizer output leaves the affected lines without text.
    pub fn apply_recognition(
        &self,
        reconciled: ReconciledPage,
        recognized: &[RecognizedLine],
        builder: &MarkupSpanBuilder,
    ) -> Vec<ProviderOutput> {
        let ReconciledPage {
            mut lines,
            ocr_lines,
            math_spans,
            ..
        } = reconciled;

        let expected = ocr_lines.len() + math_spans.len();
        if recognized.len() != expected && expected > 0 {
            log::warn!(
                "Recognizer returned {} line(s) for {} box(es)",
                recognized.len(),
                expected
            );
        }

        for (offset, target) in math_spans.iter().enumerate() {
            let Some(result) = recognized.get(ocr_lines.len() + offset) else {
                continue;
            };
            if let Some(span) = lines
                .get_mut(target.line)
                .and_then(|line| line.spans.get_mut(target.span))
            {
                span.text = builder.plain_text(&result.markup);
            }
        }

        for (index, ocr_line) in ocr_lines.iter().enumerate() {
            let spans = match recognized.get(index) {
                Some(result) if ocr_line.math => builder.build_math(result, ocr_line.polygon),
                Some(result) => builder.build(result, ocr_line.polygon),
                None => Vec::new(),
            };
            lines.push(ProviderOutput::new(ocr_line.polygon, spans, SourceMethod::Ocr));
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockType, ProviderSpan};

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Polygon {
        Polygon::from_bbox([x0, y0, x1, y1]).unwrap()
    }

    fn provider_line(y: f32, text: &str) -> ProviderOutput {
        let polygon = rect(0.0, y, 100.0, y + 10.0);
        ProviderOutput::new(
            polygon,
            vec![ProviderSpan::new(text, polygon)],
            SourceMethod::Vector,
        )
    }

    fn covered_page() -> Page {
        let mut page = Page::new(0, 200.0, 200.0).unwrap();
        page.add_block(BlockType::Text, rect(0.0, 0.0, 100.0, 100.0)).unwrap();
        page
    }

    fn evidence() -> PageEvidence {
        PageEvidence {
            provider_lines: vec![provider_line(0.0, "one"), provider_line(20.0, "two")],
            detected_lines: vec![rect(0.0, 0.0, 100.0, 10.0), rect(0.0, 150.0, 100.0, 160.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_trusted_page_keeps_provider_lines() {
        let reconciler = LineReconciler::default();
        let result = reconciler.reconcile(&covered_page(), evidence());

        assert_eq!(result.method, SourceMethod::Vector);
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.ocr_lines.len(), 1);
        assert_eq!(result.ocr_lines[0].polygon, rect(0.0, 150.0, 100.0, 160.0));
    }

    #[test]
    fn test_bad_quality_discards_provider_lines() {
        let reconciler = LineReconciler::default();
        let mut input = evidence();
        input.quality = TextQuality::Bad;
        let result = reconciler.reconcile(&covered_page(), input);

        assert_eq!(result.method, SourceMethod::Ocr);
        assert!(result.lines.is_empty());
        assert_eq!(result.ocr_lines.len(), 2);
    }

    #[test]
    fn test_collaborator_failure_forces_ocr() {
        let reconciler = LineReconciler::default();
        let mut input = evidence();
        input.collaborator_failed = true;
        let result = reconciler.reconcile(&covered_page(), input);
        assert_eq!(result.method, SourceMethod::Ocr);
    }

    #[test]
    fn test_empty_page_is_valid() {
        let reconciler = LineReconciler::default();
        let page = Page::new(0, 100.0, 100.0).unwrap();
        let result = reconciler.reconcile(&page, PageEvidence::default());
        assert_eq!(result.method, SourceMethod::Ocr);
        assert!(!result.needs_ocr());
    }

    #[test]
    fn test_untrusted_math_absorbed_or_standalone() {
        let reconciler = LineReconciler::default();
        let input = PageEvidence {
            detected_lines: vec![rect(0.0, 0.0, 100.0, 10.0)],
            math_boxes: vec![rect(90.0, 0.0, 110.0, 12.0), rect(0.0, 50.0, 40.0, 60.0)],
            ..Default::default()
        };
        let result = reconciler.reconcile(&covered_page(), input);

        assert_eq!(result.ocr_lines.len(), 2);
        assert_eq!(result.ocr_lines[0].polygon.bbox(), [0.0, 0.0, 110.0, 12.0]);
        assert!(result.ocr_lines[1].math);
    }

    #[test]
    fn test_apply_recognition_fills_math_and_ocr_lines() {
        let reconciler = LineReconciler::default();
        let mut input = evidence();
        input.math_boxes = vec![rect(40.0, 20.0, 60.0, 30.0)];
        let result = reconciler.reconcile(&covered_page(), input);
        assert_eq!(result.ocr_boxes().len(), 2);

        let recognized = vec![
            RecognizedLine {
                markup: "third <b>line</b>".to_string(),
                chars: None,
            },
            RecognizedLine {
                markup: "<math>x^2</math>".to_string(),
                chars: None,
            },
        ];
        let lines = reconciler.apply_recognition(result, &recognized, &MarkupSpanBuilder::new());

        assert_eq!(lines.len(), 3);
        assert!(lines[1].spans.iter().any(|s| s.format.math && s.text == "x^2"));
        assert_eq!(lines[2].source, SourceMethod::Ocr);
        assert_eq!(lines[2].text(), "third line");
    }
}

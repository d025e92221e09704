//! The assembly pipeline: collaborator calls, reconciliation, and assembly.

use std::sync::Arc;

use image::DynamicImage;
use rayon::prelude::*;

use super::{ConvertOptions, ConvertResult, RendererRegistry};
use crate::assembly::{flag_continuations, infer_heading_levels, PageAssembler};
use crate::collaborator::{
    LayoutDetector, LineDetection, LineDetector, OcrQualityClassifier,
    PageView, RecognitionBatch, RecognizedLine, Recognizer, TextQuality,
};
use crate::error::{Error, Result};
use crate::geometry::Polygon;
use crate::model::{Document, Page, ProviderOutput, SourceMethod};
use crate::reconcile::{LineReconciler, MarkupSpanBuilder, PageEvidence, ReconciledPage};

/// One page as handed to the converter.
#[derive(Debug, Clone, Default)]
pub struct PageInput {
    /// Page size in points
    pub width: f32,
    pub height: f32,

    /// Rendered page image, when available
    pub image: Option<DynamicImage>,

    /// Lines with embedded text from the vector provider
    pub provider_lines: Vec<ProviderOutput>,
}

impl PageInput {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_provider_lines(mut self, lines: Vec<ProviderOutput>) -> Self {
        self.provider_lines = lines;
        self
    }
}

/// Assembles pages into a [`Document`] and renders it.
///
/// Every collaborator is optional. Without a layout detector each page gets
/// a single fallback region; without a recognizer queued OCR lines stay
/// empty.
pub struct Converter {
    options: ConvertOptions,
    layout: Option<Arc<dyn LayoutDetector>>,
    line_detector: Option<Arc<dyn LineDetector>>,
    classifier: Option<Arc<dyn OcrQualityClassifier>>,
    recognizer: Option<Arc<dyn Recognizer>>,
    registry: RendererRegistry,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            layout: None,
            line_detector: None,
            classifier: None,
            recognizer: None,
            registry: RendererRegistry::with_defaults(),
        }
    }

    pub fn with_layout_detector(mut self, detector: Arc<dyn LayoutDetector>) -> Self {
        self.layout = Some(detector);
        self
    }

    pub fn with_line_detector(mut self, detector: Arc<dyn LineDetector>) -> Self {
        self.line_detector = Some(detector);
        self
    }

    pub fn with_quality_classifier(mut self, classifier: Arc<dyn OcrQualityClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Replace the renderer registry.
    pub fn with_registry(mut self, registry: RendererRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Build a document and render it in the configured output format.
    pub fn convert(&self, inputs: Vec<PageInput>) -> Result<ConvertResult> {
        let doc = self.build_document(inputs)?;
        self.render(&doc)
    }

    /// Render an already built document in the configured output format.
    pub fn render(&self, doc: &Document) -> Result<ConvertResult> {
        self.registry.render(
            self.options.output_format.renderer_name(),
            doc,
            &self.options.render,
        )
    }

    /// Run collaborators, reconcile lines, and assemble the block tree.
    pub fn build_document(&self, inputs: Vec<PageInput>) -> Result<Document> {
        let mut doc = Document::new();
        let mut provider_lines = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let mut page = Page::new(index as u32, input.width, input.height)?;
            if let Some(image) = input.image {
                page = page.with_image(image);
            }
            doc.add_page(page)?;
            provider_lines.push(input.provider_lines);
        }
        let page_count = doc.pages.len();
        log::debug!("Building document from {} page(s)", page_count);

        let (layouts, detections, qualities) = {
            let views = page_views(&doc);
            let texts: Vec<String> = provider_lines
                .iter()
                .map(|lines| lines.iter().map(ProviderOutput::text).collect::<Vec<_>>().join("\n"))
                .collect();
            (
                self.layout
                    .as_ref()
                    .and_then(|d| batch_call("layout detector", page_count, || d.detect(&views))),
                self.line_detector.as_ref().and_then(|d| {
                    batch_call("line detector", page_count, || d.detect_lines(&views))
                }),
                self.classifier
                    .as_ref()
                    .and_then(|c| batch_call("quality classifier", page_count, || c.classify(&texts))),
            )
        };
        let collaborator_failed = (self.layout.is_some() && layouts.is_none())
            || (self.line_detector.is_some() && detections.is_none())
            || (self.classifier.is_some() && qualities.is_none());

        let assembler = PageAssembler::new();
        if let Some(layouts) = &layouts {
            for (page, prediction) in doc.pages.iter_mut().zip(layouts) {
                assembler.build_regions(page, prediction);
            }
        }

        let evidence: Vec<PageEvidence> = provider_lines
            .into_iter()
            .enumerate()
            .map(|(index, lines)| {
                let page = &doc.pages[index];
                let (detected_lines, math_boxes) = detections
                    .as_ref()
                    .map(|d| split_detection(&d[index], page.size()))
                    .unwrap_or_default();
                PageEvidence {
                    provider_lines: lines,
                    detected_lines,
                    math_boxes,
                    quality: qualities
                        .as_ref()
                        .map(|q| q[index])
                        .unwrap_or(TextQuality::Good),
                    collaborator_failed,
                }
            })
            .collect();

        let reconciler = LineReconciler::new(self.options.reconcile.clone());
        let reconciled: Vec<ReconciledPage> = if self.options.parallel {
            doc.pages
                .par_iter()
                .zip(evidence.into_par_iter())
                .map(|(page, evidence)| reconciler.reconcile(page, evidence))
                .collect()
        } else {
            doc.pages
                .iter()
                .zip(evidence)
                .map(|(page, evidence)| reconciler.reconcile(page, evidence))
                .collect()
        };

        let recognized = self.recognize(&doc, &reconciled);
        let builder = MarkupSpanBuilder::new();
        let pages: Vec<(SourceMethod, Vec<ProviderOutput>)> = reconciled
            .into_iter()
            .zip(recognized)
            .map(|(page, lines)| {
                let method = page.method;
                (method, reconciler.apply_recognition(page, &lines, &builder))
            })
            .collect();

        let assemble = |page: &mut Page, (method, lines): (SourceMethod, Vec<ProviderOutput>)| {
            page.text_extraction_method = method;
            assembler.assemble(page, lines).map(|_| ())
        };
        if self.options.parallel {
            doc.pages
                .par_iter_mut()
                .zip(pages.into_par_iter())
                .map(|(page, lines)| assemble(page, lines))
                .collect::<Result<Vec<()>>>()?;
        } else {
            for (page, lines) in doc.pages.iter_mut().zip(pages) {
                assemble(page, lines)?;
            }
        }

        if self.options.infer_heading_levels {
            let stats = infer_heading_levels(&mut doc);
            log::debug!("Heading sizes: {:?}", stats.heading_sizes);
        }
        if self.options.detect_continuations {
            flag_continuations(&mut doc);
        }
        doc.refresh_metadata();
        Ok(doc)
    }

    /// One recognizer call for every queued box, split back per page.
    fn recognize(&self, doc: &Document, reconciled: &[ReconciledPage]) -> Vec<Vec<RecognizedLine>> {
        let mut per_page = vec![Vec::new(); reconciled.len()];
        let views = page_views(doc);

        let mut pages = Vec::new();
        let mut batches = Vec::new();
        for (index, page) in reconciled.iter().enumerate() {
            let boxes = page.ocr_boxes();
            if boxes.is_empty() {
                continue;
            }
            pages.push(index);
            batches.push(RecognitionBatch {
                page: views[index],
                boxes,
            });
        }
        if batches.is_empty() {
            return per_page;
        }

        let Some(recognizer) = &self.recognizer else {
            log::debug!(
                "No recognizer configured, {} page(s) keep empty OCR lines",
                batches.len()
            );
            return per_page;
        };

        if let Some(results) = batch_call("recognizer", batches.len(), || recognizer.recognize(&batches)) {
            for (index, lines) in pages.into_iter().zip(results) {
                per_page[index] = lines;
            }
        }
        per_page
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertOptions::default())
    }
}

fn page_views(doc: &Document) -> Vec<PageView<'_>> {
    doc.pages
        .iter()
        .map(|page| PageView {
            index: page.index,
            size: page.size(),
            image: page.image.as_ref(),
        })
        .collect()
}

/// Call a batched collaborator, logging and discarding failed or
/// misaligned results.
fn batch_call<T>(name: &str, expected: usize, call: impl FnOnce() -> Result<Vec<T>>) -> Option<Vec<T>> {
    match call() {
        Ok(results) if results.len() == expected => Some(results),
        Ok(results) => {
            let err = Error::Collaborator(format!(
                "{} returned {} result(s) for {} input(s)",
                name,
                results.len(),
                expected
            ));
            log::warn!("Ignoring collaborator output: {}", err);
            None
        }
        Err(e) => {
            log::warn!("{} failed: {}", name, e);
            None
        }
    }
}

/// Split detected lines into text lines and inline-math boxes in page points.
fn split_detection(
    detection: &LineDetection,
    page_size: (f32, f32),
) -> (Vec<Polygon>, Vec<Polygon>) {
    let mut lines = Vec::new();
    let mut math = Vec::new();
    for line in &detection.lines {
        let polygon = line.polygon.rescale(detection.image_size, page_size);
        if line.math {
            math.push(polygon);
        } else {
            lines.push(polygon);
        }
    }
    (lines, math)
}


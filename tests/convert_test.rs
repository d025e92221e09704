//! Integration tests for the conversion pipeline with mock collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use docweave::collaborator::{
    DetectedLine, DetectedRegion, LayoutDetector, LayoutPrediction, LineDetection, LineDetector,
    OcrQualityClassifier, PageView, RecognitionBatch, RecognizedLine, Recognizer, TextQuality,
};
use docweave::convert::{ConvertOptions, Converter, OutputFormat, PageInput};
use docweave::error::{Error, Result};
use docweave::geometry::Polygon;
use docweave::model::{BlockType, ProviderOutput, ProviderSpan, SourceMethod};

const PAGE_SIZE: (f32, f32) = (612.0, 792.0);

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Polygon {
    Polygon::from_bbox([x0, y0, x1, y1]).unwrap()
}

fn provider_line(text: &str, polygon: Polygon) -> ProviderOutput {
    ProviderOutput::new(
        polygon,
        vec![ProviderSpan::new(text, polygon)],
        SourceMethod::Vector,
    )
}

fn page(lines: Vec<ProviderOutput>) -> PageInput {
    PageInput::new(PAGE_SIZE.0, PAGE_SIZE.1).with_provider_lines(lines)
}

/// Mock layout detector returning the same regions for every page.
struct MockLayout {
    regions: Vec<(BlockType, Polygon)>,
}

impl LayoutDetector for MockLayout {
    fn detect(&self, pages: &[PageView<'_>]) -> Result<Vec<LayoutPrediction>> {
        Ok(pages
            .iter()
            .map(|view| LayoutPrediction {
                image_size: view.image_size(),
                regions: self
                    .regions
                    .iter()
                    .map(|(label, polygon)| DetectedRegion {
                        polygon: *polygon,
                        label: *label,
                        scores: BTreeMap::from([(*label, 0.9)]),
                    })
                    .collect(),
            })
            .collect())
    }
}

/// Layout detector whose batch call always fails.
struct FailingLayout;

impl LayoutDetector for FailingLayout {
    fn detect(&self, _pages: &[PageView<'_>]) -> Result<Vec<LayoutPrediction>> {
        Err(Error::Collaborator("model crashed".to_string()))
    }
}

struct MockLines {
    lines: Vec<Polygon>,
}

impl LineDetector for MockLines {
    fn detect_lines(&self, pages: &[PageView<'_>]) -> Result<Vec<LineDetection>> {
        Ok(pages
            .iter()
            .map(|view| LineDetection {
                image_size: view.image_size(),
                lines: self
                    .lines
                    .iter()
                    .map(|polygon| DetectedLine {
                        polygon: *polygon,
                        math: false,
                    })
                    .collect(),
            })
            .collect())
    }
}

struct FixedQuality(TextQuality);

impl OcrQualityClassifier for FixedQuality {
    fn classify(&self, texts: &[String]) -> Result<Vec<TextQuality>> {
        Ok(vec![self.0; texts.len()])
    }
}

/// Recognizer that reports the box index as bold markup.
struct MockRecognizer;

impl Recognizer for MockRecognizer {
    fn recognize(&self, batches: &[RecognitionBatch<'_>]) -> Result<Vec<Vec<RecognizedLine>>> {
        Ok(batches
            .iter()
            .map(|batch| {
                (0..batch.boxes.len())
                    .map(|i| RecognizedLine {
                        markup: format!("<b>word{}</b> tail", i),
                        chars: None,
                    })
                    .collect()
            })
            .collect())
    }
}

struct FailingRecognizer;

impl Recognizer for FailingRecognizer {
    fn recognize(&self, _batches: &[RecognitionBatch<'_>]) -> Result<Vec<Vec<RecognizedLine>>> {
        Err(Error::Collaborator("out of memory".to_string()))
    }
}

#[test]
fn test_vector_page_without_collaborators() {
    let input = page(vec![
        provider_line("Hello", rect(72.0, 72.0, 200.0, 84.0)),
        provider_line("world.", rect(72.0, 90.0, 200.0, 102.0)),
    ]);
    let converter = Converter::new(ConvertOptions::new());
    let result = converter.convert(vec![input]).unwrap();

    assert_eq!(result.content, "Hello world.");
    assert_eq!(result.mime_type, "text/markdown");
    assert_eq!(
        result.metadata.page_stats[0].text_extraction_method,
        SourceMethod::Vector
    );
}

#[test]
fn test_layout_regions_and_inferred_heading() {
    let layout = MockLayout {
        regions: vec![
            (BlockType::SectionHeader, rect(50.0, 50.0, 550.0, 80.0)),
            (BlockType::Text, rect(50.0, 100.0, 550.0, 200.0)),
        ],
    };
    let input = page(vec![
        provider_line("Introduction", rect(60.0, 55.0, 300.0, 75.0)),
        provider_line("Body text here.", rect(60.0, 110.0, 500.0, 122.0)),
        provider_line("More body.", rect(60.0, 130.0, 500.0, 142.0)),
    ]);

    let converter = Converter::new(ConvertOptions::new()).with_layout_detector(Arc::new(layout));
    let result = converter.convert(vec![input]).unwrap();

    assert_eq!(result.content, "# Introduction\n\nBody text here. More body.");
    assert_eq!(result.metadata.title.as_deref(), Some("Introduction"));
    assert_eq!(result.metadata.table_of_contents.len(), 1);
    assert_eq!(result.stats.heading_count, 1);
}

#[test]
fn test_collaborator_failure_degrades_to_ocr() {
    let input = page(vec![provider_line("Hello", rect(72.0, 72.0, 200.0, 84.0))]);
    let converter = Converter::new(ConvertOptions::new()).with_layout_detector(Arc::new(FailingLayout));

    let doc = converter.build_document(vec![input]).unwrap();
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.pages[0].text_extraction_method, SourceMethod::Ocr);
    assert!(converter.render(&doc).unwrap().content.is_empty());
}

#[test]
fn test_bad_quality_uses_recognizer_output() {
    let lines = MockLines {
        lines: vec![rect(50.0, 100.0, 550.0, 112.0), rect(50.0, 120.0, 550.0, 132.0)],
    };
    let input = page(vec![provider_line("g4rbl3d", rect(50.0, 100.0, 550.0, 112.0))]);

    let converter = Converter::new(ConvertOptions::new())
        .with_line_detector(Arc::new(lines))
        .with_quality_classifier(Arc::new(FixedQuality(TextQuality::Bad)))
        .with_recognizer(Arc::new(MockRecognizer));
    let result = converter.convert(vec![input]).unwrap();

    assert_eq!(result.content, "**word0** tail **word1** tail");
    assert_eq!(
        result.metadata.page_stats[0].text_extraction_method,
        SourceMethod::Ocr
    );
}

#[test]
fn test_recognizer_failure_keeps_document() {
    let lines = MockLines {
        lines: vec![rect(50.0, 100.0, 550.0, 112.0)],
    };
    let converter = Converter::new(ConvertOptions::new())
        .with_line_detector(Arc::new(lines))
        .with_recognizer(Arc::new(FailingRecognizer));

    let doc = converter.build_document(vec![page(Vec::new())]).unwrap();
    let page = &doc.pages[0];
    let lines = page.contained_blocks(page.id(), &[BlockType::Line]);
    assert_eq!(lines.len(), 1);
    assert!(page.raw_text(lines[0]).trim().is_empty());
}

#[test]
fn test_parallel_matches_sequential() {
    let inputs = || {
        (0..4)
            .map(|i| {
                page(vec![
                    provider_line(&format!("Page {} first.", i), rect(72.0, 72.0, 300.0, 84.0)),
                    provider_line("second line", rect(72.0, 90.0, 300.0, 102.0)),
                ])
            })
            .collect::<Vec<_>>()
    };

    let parallel = Converter::new(ConvertOptions::new()).convert(inputs()).unwrap();
    let sequential = Converter::new(ConvertOptions::new().sequential())
        .convert(inputs())
        .unwrap();
    assert_eq!(parallel.content, sequential.content);
    assert_eq!(parallel.stats, sequential.stats);
}

#[test]
fn test_json_output_mirrors_tree() {
    let input = page(vec![provider_line("Hello", rect(72.0, 72.0, 200.0, 84.0))]);
    let converter = Converter::new(ConvertOptions::new().with_format(OutputFormat::Json));
    let result = converter.convert(vec![input]).unwrap();
    assert_eq!(result.mime_type, "application/json");

    let value: serde_json::Value = serde_json::from_str(&result.content).unwrap();
    let page = &value["children"][0];
    assert_eq!(page["id"], "/page/0");
    let region = &page["children"][0];
    assert_eq!(region["block_type"], "Text");
    let line = &region["children"][0];
    assert_eq!(line["block_type"], "Line");
    assert!(line["chars"].is_array());
    assert_eq!(line["html"], "Hello\n");
}

#[test]
fn test_ocr_json_output() {
    let input = page(vec![provider_line("Hello", rect(72.0, 72.0, 200.0, 84.0))]);
    let converter = Converter::new(ConvertOptions::new().with_format(OutputFormat::OcrJson));
    let result = converter.convert(vec![input]).unwrap();

    let value: serde_json::Value = serde_json::from_str(&result.content).unwrap();
    assert_eq!(value[0]["page"], 0);
    assert_eq!(value[0]["text_extraction_method"], "vector");
    assert_eq!(value[0]["lines"][0]["html"], "Hello");
}

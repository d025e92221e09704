//! Contracts of the external models the assembler consumes.
//!
//! Every collaborator is called once per document with all pages batched
//! together. Coordinates are in the collaborator's image space and are
//! rescaled into page points using the `image_size` it reports.

use std::collections::BTreeMap;

use image::{DynamicImage, GenericImageView};

use crate::error::Result;
use crate::geometry::Polygon;
use crate::model::BlockType;

/// What a collaborator sees of one page.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub index: u32,

    /// Page size in points
    pub size: (f32, f32),

    pub image: Option<&'a DynamicImage>,
}

impl PageView<'_> {
    /// Pixel size of the page image, or the point size when there is none.
    pub fn image_size(&self) -> (f32, f32) {
        match self.image {
            Some(image) => {
                let (w, h) = image.dimensions();
                (w as f32, h as f32)
            }
            None => self.size,
        }
    }
}

/// One region found by the layout detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedRegion {
    pub polygon: Polygon,
    pub label: BlockType,
    pub scores: BTreeMap<BlockType, f32>,
}

/// Layout detector output for one page, regions in reading order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutPrediction {
    pub image_size: (f32, f32),
    pub regions: Vec<DetectedRegion>,
}

/// One text-line or inline-math box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedLine {
    pub polygon: Polygon,
    pub math: bool,
}

/// Line detector output for one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineDetection {
    pub image_size: (f32, f32),
    pub lines: Vec<DetectedLine>,
}

/// Verdict of the OCR-quality classifier on a page's embedded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextQuality {
    #[default]
    Good,
    Bad,
}

/// Boxes to recognize on one page, in page points.
#[derive(Debug, Clone)]
pub struct RecognitionBatch<'a> {
    pub page: PageView<'a>,
    pub boxes: Vec<Polygon>,
}

/// A recognized character with its box in page points.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedChar {
    pub text: String,
    pub polygon: Polygon,
}

/// Recognizer output for one box.
///
/// `markup` uses paired `<math>`, `<i>`, and `<b>` tags. `chars`, when
/// present, is aligned with the tag-stripped, entity-decoded text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognizedLine {
    pub markup: String,
    pub chars: Option<Vec<RecognizedChar>>,
}

/// Detects layout regions.
pub trait LayoutDetector: Send + Sync {
    /// Returns one prediction per page, in page order.
    fn detect(&self, pages: &[PageView<'_>]) -> Result<Vec<LayoutPrediction>>;
}

/// Detects text lines and inline-math boxes.
pub trait LineDetector: Send + Sync {
    /// Returns one detection per page, in page order.
    fn detect_lines(&self, pages: &[PageView<'_>]) -> Result<Vec<LineDetection>>;
}

/// Judges whether embedded text is usable.
pub trait OcrQualityClassifier: Send + Sync {
    /// Classifies one text per page.
    fn classify(&self, texts: &[String]) -> Result<Vec<TextQuality>>;
}

/// Recognizes text inside boxes.
pub trait Recognizer: Send + Sync {
    /// Returns, per batch, one line per box.
    fn recognize(&self, batches: &[RecognitionBatch<'_>]) -> Result<Vec<Vec<RecognizedLine>>>;
}

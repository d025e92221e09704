//! # docweave
//!
//! Assembles a hierarchical document from mixed-confidence page inputs and
//! renders it to HTML, Markdown, JSON, and an OCR-JSON transcript.
//!
//! Each page may carry vector text with embedded fonts, a rendered image,
//! and the output of external models: a layout detector, a line detector,
//! an OCR quality classifier, and a text recognizer. The converter decides
//! per page whether the embedded text can be trusted, folds inline math
//! into its lines, and hangs every line under one layout region.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docweave::{convert, ConvertOptions, OutputFormat, PageInput};
//! use docweave::geometry::Polygon;
//! use docweave::model::{ProviderOutput, ProviderSpan, SourceMethod};
//!
//! fn main() -> docweave::Result<()> {
//!     let polygon = Polygon::from_bbox([72.0, 72.0, 540.0, 84.0])?;
//!     let line = ProviderOutput::new(
//!         polygon,
//!         vec![ProviderSpan::new("Hello, world.", polygon)],
//!         SourceMethod::Vector,
//!     );
//!     let page = PageInput::new(612.0, 792.0).with_provider_lines(vec![line]);
//!
//!     let options = ConvertOptions::new().with_format(OutputFormat::Markdown);
//!     let result = convert(vec![page], &options)?;
//!     println!("{}", result.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Per-page trust decision**: layout coverage and an optional quality
//!   classifier choose between embedded text and OCR
//! - **Inline math**: math boxes are cut out of text lines and recognized
//!   separately
//! - **Arena block tree**: stable `/page/{p}/{Type}/{n}` ids, no pointers
//! - **Multiple output formats**: HTML, Markdown, JSON, OCR-JSON
//! - **Parallel processing**: uses Rayon for per-page work
//! - **Enrichment hook**: bounded worker pool with retry and backoff

pub mod assembly;
pub mod collaborator;
pub mod convert;
pub mod enrich;
pub mod error;
pub mod geometry;
pub mod model;
pub mod reconcile;
pub mod render;

// Re-export commonly used types
pub use collaborator::{
    LayoutDetector, LineDetector, OcrQualityClassifier, PageView, Recognizer, TextQuality,
};
pub use convert::{
    ConvertOptions, ConvertResult, Converter, OutputFormat, PageInput, RendererRegistry,
};
pub use enrich::{EnrichOptions, EnrichStats, Enricher, EnrichmentRunner};
pub use error::{Error, Result};
pub use geometry::Polygon;
pub use model::{Block, BlockId, BlockType, Document, Metadata, Page, SourceMethod};
pub use reconcile::ReconcileOptions;
pub use render::{
    DocumentRenderer, JsonFormat, PageSelection, RenderOptions, RenderResult,
};

/// Assemble pages without external models and render them.
///
/// Every page gets a single fallback region and keeps its vector text.
/// Use [`Converter`] to plug in layout, line detection, and recognition.
pub fn convert(pages: Vec<PageInput>, options: &ConvertOptions) -> Result<ConvertResult> {
    Converter::new(options.clone()).convert(pages)
}

/// Render a document to Markdown with default options.
///
/// # Example
///
/// ```no_run
/// use docweave::{to_markdown, Document};
///
/// let markdown = to_markdown(&Document::new()).unwrap();
/// assert!(markdown.is_empty());
/// ```
pub fn to_markdown(doc: &Document) -> Result<String> {
    render::to_markdown(doc, &RenderOptions::default())
}

/// Render a document to a standalone HTML page with default options.
pub fn to_html(doc: &Document) -> Result<String> {
    render::to_html(doc, &RenderOptions::default())
}

/// Render a document to the JSON block tree.
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    render::to_json(doc, &RenderOptions::new().with_json_format(format))
}

/// Render a document to an OCR-JSON transcript.
pub fn to_ocr_json(doc: &Document, format: JsonFormat) -> Result<String> {
    render::to_ocr_json(doc, &RenderOptions::new().with_json_format(format))
}

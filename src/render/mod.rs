//! Rendering module for projecting a document tree into output formats.

mod html;
mod json;
mod markdown;
mod ocr_json;
mod options;
mod resolve;
mod result;

pub use html::{to_html, HtmlRenderer};
pub use json::{to_json, JsonChar, JsonDocument, JsonFormat, JsonNode, JsonRenderer};
pub use markdown::{page_delimiter, to_markdown, MarkdownRenderer};
pub use ocr_json::{to_ocr_json, OcrJsonLine, OcrJsonPage, OcrJsonRenderer};
pub use options::{PageSelection, RenderOptions, PAGE_SEPARATOR_WIDTH};
pub use resolve::{crop_png, data_uri, ContentResolver};
pub use result::{ExtractionStats, RenderResult};

use crate::error::Result;
use crate::model::Document;

/// A renderer that turns a finished document into one output format.
pub trait DocumentRenderer: Send + Sync {
    /// Short name used for registry lookups.
    fn name(&self) -> &str;

    /// MIME type of the rendered content.
    fn mime_type(&self) -> &str;

    fn render(&self, doc: &Document, options: &RenderOptions) -> Result<RenderResult>;
}

/// [`DocumentRenderer`] for Markdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownFormat;

impl DocumentRenderer for MarkdownFormat {
    fn name(&self) -> &str {
        "markdown"
    }

    fn mime_type(&self) -> &str {
        "text/markdown"
    }

    fn render(&self, doc: &Document, options: &RenderOptions) -> Result<RenderResult> {
        MarkdownRenderer::new(options.clone()).render(doc)
    }
}

/// [`DocumentRenderer`] for HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlFormat;

impl DocumentRenderer for HtmlFormat {
    fn name(&self) -> &str {
        "html"
    }

    fn mime_type(&self) -> &str {
        "text/html"
    }

    fn render(&self, doc: &Document, options: &RenderOptions) -> Result<RenderResult> {
        HtmlRenderer::new(options.clone()).render(doc)
    }
}

/// [`DocumentRenderer`] for the JSON block tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTreeFormat;

impl DocumentRenderer for JsonTreeFormat {
    fn name(&self) -> &str {
        "json"
    }

    fn mime_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, doc: &Document, options: &RenderOptions) -> Result<RenderResult> {
        JsonRenderer::new(options.clone()).render(doc)
    }
}

/// [`DocumentRenderer`] for the OCR-JSON transcript.
#[derive(Debug, Default, Clone, Copy)]
pub struct OcrJsonFormat;

impl DocumentRenderer for OcrJsonFormat {
    fn name(&self) -> &str {
        "ocr_json"
    }

    fn mime_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, doc: &Document, options: &RenderOptions) -> Result<RenderResult> {
        OcrJsonRenderer::new(options.clone()).render(doc)
    }
}

//! Conversion entry points: the assembly pipeline plus a registry of
//! renderers that projects its result into an output format.
//!
//! # Example
//!
//! ```no_run
//! use docweave::convert::{ConvertOptions, Converter, OutputFormat, PageInput};
//!
//! fn main() -> docweave::Result<()> {
//!     let converter = Converter::new(ConvertOptions::new().with_format(OutputFormat::Html));
//!     let result = converter.convert(vec![PageInput::new(612.0, 792.0)])?;
//!     println!("{}", result.content);
//!     Ok(())
//! }
//! ```

mod pipeline;

pub use pipeline::{Converter, PageInput};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{Document, Metadata};
use crate::reconcile::ReconcileOptions;
use crate::render::{
    DocumentRenderer, ExtractionStats, HtmlFormat, JsonTreeFormat, MarkdownFormat, OcrJsonFormat,
    RenderOptions,
};

/// Options for document conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Line reconciliation thresholds
    pub reconcile: ReconcileOptions,

    /// Rendering options
    pub render: RenderOptions,

    /// Output format
    pub output_format: OutputFormat,

    /// Reconcile and assemble pages in parallel
    pub parallel: bool,

    /// Flag paragraphs that continue into the next region
    pub detect_continuations: bool,

    /// Assign heading levels from font sizes
    pub infer_heading_levels: bool,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reconciliation options.
    pub fn with_reconcile_options(mut self, options: ReconcileOptions) -> Self {
        self.reconcile = options;
        self
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Set output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_continuations(mut self, detect: bool) -> Self {
        self.detect_continuations = detect;
        self
    }

    pub fn with_heading_inference(mut self, infer: bool) -> Self {
        self.infer_heading_levels = infer;
        self
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            reconcile: ReconcileOptions::default(),
            render: RenderOptions::default(),
            output_format: OutputFormat::default(),
            parallel: true,
            detect_continuations: true,
            infer_heading_levels: true,
        }
    }
}

/// Output format for conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Markdown format
    #[default]
    Markdown,

    /// Standalone HTML page
    Html,

    /// JSON block tree
    Json,

    /// Flat page, line, and character transcript
    OcrJson,
}

impl OutputFormat {
    /// Registry name of the renderer for this format.
    pub fn renderer_name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::OcrJson => "ocr_json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.renderer_name())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            "ocr_json" | "ocr-json" | "ocrjson" => Ok(OutputFormat::OcrJson),
            other => Err(Error::Other(format!("Unknown output format: {}", other))),
        }
    }
}

/// Result of document conversion.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// Rendered content
    pub content: String,

    /// Extracted image assets by file name
    pub images: BTreeMap<String, Vec<u8>>,

    /// Document metadata
    pub metadata: Metadata,

    /// Extraction statistics
    pub stats: ExtractionStats,

    /// MIME type of the output
    pub mime_type: String,
}

/// Registry of renderers, looked up by name.
pub struct RendererRegistry {
    by_name: HashMap<String, Arc<dyn DocumentRenderer>>,
}

impl RendererRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Create a registry with the Markdown, HTML, JSON and OCR-JSON renderers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MarkdownFormat));
        registry.register(Arc::new(HtmlFormat));
        registry.register(Arc::new(JsonTreeFormat));
        registry.register(Arc::new(OcrJsonFormat));
        registry
    }

    /// Register a renderer under its name, replacing any previous one.
    pub fn register(&mut self, renderer: Arc<dyn DocumentRenderer>) {
        self.by_name
            .insert(renderer.name().to_lowercase(), renderer);
    }

    /// Get a renderer by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DocumentRenderer>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Check if a renderer is registered.
    pub fn supports(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    /// Names of all registered renderers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Render `doc` with the named renderer.
    pub fn render(&self, name: &str, doc: &Document, options: &RenderOptions) -> Result<ConvertResult> {
        let renderer = self
            .get(name)
            .ok_or_else(|| Error::Other(format!("No renderer named: {}", name)))?;

        let result = renderer.render(doc, options)?;
        Ok(ConvertResult {
            content: result.content,
            images: result.images,
            metadata: result.metadata,
            stats: result.stats,
            mime_type: renderer.mime_type().to_string(),
        })
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

//! Block-level types: addresses, type tags, and per-type payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::Polygon;

/// Closed set of node kinds in the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockType {
    Page,
    Text,
    TextInlineMath,
    SectionHeader,
    ListGroup,
    ListItem,
    Caption,
    Footnote,
    PageHeader,
    PageFooter,
    Equation,
    Code,
    Table,
    TableGroup,
    Form,
    Figure,
    FigureGroup,
    Picture,
    PictureGroup,
    Handwriting,
    TableOfContents,
    ComplexRegion,
    Line,
    Span,
    Char,
}

impl BlockType {
    /// Every block type, in declaration order.
    pub const ALL: [BlockType; 25] = [
        BlockType::Page,
        BlockType::Text,
        BlockType::TextInlineMath,
        BlockType::SectionHeader,
        BlockType::ListGroup,
        BlockType::ListItem,
        BlockType::Caption,
        BlockType::Footnote,
        BlockType::PageHeader,
        BlockType::PageFooter,
        BlockType::Equation,
        BlockType::Code,
        BlockType::Table,
        BlockType::TableGroup,
        BlockType::Form,
        BlockType::Figure,
        BlockType::FigureGroup,
        BlockType::Picture,
        BlockType::PictureGroup,
        BlockType::Handwriting,
        BlockType::TableOfContents,
        BlockType::ComplexRegion,
        BlockType::Line,
        BlockType::Span,
        BlockType::Char,
    ];

    /// Name used in block paths and `block-type` attributes.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BlockType::Page => "Page",
            BlockType::Text => "Text",
            BlockType::TextInlineMath => "TextInlineMath",
            BlockType::SectionHeader => "SectionHeader",
            BlockType::ListGroup => "ListGroup",
            BlockType::ListItem => "ListItem",
            BlockType::Caption => "Caption",
            BlockType::Footnote => "Footnote",
            BlockType::PageHeader => "PageHeader",
            BlockType::PageFooter => "PageFooter",
            BlockType::Equation => "Equation",
            BlockType::Code => "Code",
            BlockType::Table => "Table",
            BlockType::TableGroup => "TableGroup",
            BlockType::Form => "Form",
            BlockType::Figure => "Figure",
            BlockType::FigureGroup => "FigureGroup",
            BlockType::Picture => "Picture",
            BlockType::PictureGroup => "PictureGroup",
            BlockType::Handwriting => "Handwriting",
            BlockType::TableOfContents => "TableOfContents",
            BlockType::ComplexRegion => "ComplexRegion",
            BlockType::Line => "Line",
            BlockType::Span => "Span",
            BlockType::Char => "Char",
        }
    }

    /// Top-level layout regions (everything except page and text-structure nodes).
    pub const fn is_region(&self) -> bool {
        !matches!(
            self,
            BlockType::Page | BlockType::Line | BlockType::Span | BlockType::Char
        )
    }

    /// Regions rendered as a crop of the page image.
    pub const fn is_image(&self) -> bool {
        matches!(self, BlockType::Figure | BlockType::Picture)
    }

    /// Regions whose content flows as running text.
    pub const fn is_text_flow(&self) -> bool {
        matches!(self, BlockType::Text | BlockType::TextInlineMath)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Other(format!("unknown block type: '{}'", s)))
    }
}

/// Value-type address of a block: `(page, type, ordinal)`.
///
/// The ordinal indexes the page's block arena. Page nodes use ordinal 0
/// with [`BlockType::Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub page: u32,
    pub block_type: BlockType,
    pub ordinal: u32,
}

impl BlockId {
    pub fn new(page: u32, block_type: BlockType, ordinal: u32) -> Self {
        Self {
            page,
            block_type,
            ordinal,
        }
    }

    /// Address of the page node itself.
    pub fn page(page: u32) -> Self {
        Self::new(page, BlockType::Page, 0)
    }

    pub fn is_page(&self) -> bool {
        self.block_type == BlockType::Page
    }

    /// Asset-friendly form of the path, e.g. `_page_0_Picture_3`.
    pub fn to_file_stem(&self) -> String {
        self.to_string().replace('/', "_")
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_page() {
            write!(f, "/page/{}", self.page)
        } else {
            write!(f, "/page/{}/{}/{}", self.page, self.block_type, self.ordinal)
        }
    }
}

impl FromStr for BlockId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Address(format!("malformed block path: '{}'", s));
        let parts: Vec<&str> = s.trim_start_matches('/').split('/').collect();
        match parts.as_slice() {
            ["page", page] => Ok(BlockId::page(page.parse().map_err(|_| invalid())?)),
            ["page", page, block_type, ordinal] => Ok(BlockId::new(
                page.parse().map_err(|_| invalid())?,
                block_type.parse().map_err(|_| invalid())?,
                ordinal.parse().map_err(|_| invalid())?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for BlockId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a block's evidence came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMethod {
    /// Text embedded in the source file
    #[default]
    Vector,
    /// Text recognized from the page image
    Ocr,
    /// Produced by a geometric rule or a layout model
    Heuristic,
}

impl fmt::Display for SourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMethod::Vector => write!(f, "vector"),
            SourceMethod::Ocr => write!(f, "ocr"),
            SourceMethod::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Inline format flags carried by a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanFormat {
    pub bold: bool,
    pub italic: bool,
    pub math: bool,
    pub superscript: bool,
    pub subscript: bool,
}

impl SpanFormat {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn math() -> Self {
        Self {
            math: true,
            ..Default::default()
        }
    }

    /// Union of two format sets.
    pub fn union(&self, other: &SpanFormat) -> SpanFormat {
        SpanFormat {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            math: self.math || other.math,
            superscript: self.superscript || other.superscript,
            subscript: self.subscript || other.subscript,
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == SpanFormat::default()
    }
}

/// Font metadata reported by a text provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub name: Option<String>,
    pub size: Option<f32>,
    pub weight: Option<f32>,
}

/// Payload of a layout region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionContent {
    /// Heading level (1-6) for section headers
    pub heading_level: Option<u8>,

    /// The region's text runs on into the next text region
    pub has_continuation: bool,

    /// Layout model confidence per label
    pub scores: BTreeMap<BlockType, f32>,

    /// Replacement markup supplied by enrichment; rendered verbatim
    pub html: Option<String>,
}

/// Payload of a span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanContent {
    pub text: String,
    pub font: FontInfo,
    pub format: SpanFormat,
    pub url: Option<String>,
}

/// Payload of a single character box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharContent {
    pub text: String,
}

/// Type-specific payload of a [`Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockContent {
    Region(RegionContent),
    Line,
    Span(SpanContent),
    Char(CharContent),
}

impl BlockContent {
    /// Default payload for a freshly allocated block of `block_type`.
    pub fn for_type(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Line => BlockContent::Line,
            BlockType::Span => BlockContent::Span(SpanContent::default()),
            BlockType::Char => BlockContent::Char(CharContent::default()),
            _ => BlockContent::Region(RegionContent::default()),
        }
    }
}

/// The universal node of the document tree.
///
/// Children are owned by id only; the child blocks live in the page arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub polygon: Polygon,
    pub structure: Vec<BlockId>,
    pub ignore_for_output: bool,
    pub source: SourceMethod,
    pub content: BlockContent,
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        self.id.block_type
    }

    pub fn region(&self) -> Option<&RegionContent> {
        match &self.content {
            BlockContent::Region(r) => Some(r),
            _ => None,
        }
    }

    pub fn region_mut(&mut self) -> Option<&mut RegionContent> {
        match &mut self.content {
            BlockContent::Region(r) => Some(r),
            _ => None,
        }
    }

    pub fn span(&self) -> Option<&SpanContent> {
        match &self.content {
            BlockContent::Span(s) => Some(s),
            _ => None,
        }
    }

    pub fn span_mut(&mut self) -> Option<&mut SpanContent> {
        match &mut self.content {
            BlockContent::Span(s) => Some(s),
            _ => None,
        }
    }

    pub fn char_text(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Char(c) => Some(&c.text),
            _ => None,
        }
    }
}

//! Document model: an arena-backed block tree addressed by [`BlockId`].
//!
//! Every page owns a flat store of blocks. Parents list their children by
//! id in `structure`, so the tree carries no pointers between nodes and
//! blocks are never renumbered once allocated.

mod block;
mod document;
mod output;
mod page;
mod provider;

pub use block::{
    Block, BlockContent, BlockId, BlockType, CharContent, FontInfo, RegionContent, SourceMethod,
    SpanContent, SpanFormat,
};
pub use document::{Document, Metadata, PageStats, TocEntry};
pub use output::{content_ref, DocumentOutput, OutputNode, SectionHierarchy, DEFAULT_HEADING_LEVEL};
pub use page::{BlockState, Page};
pub use provider::{ProviderChar, ProviderOutput, ProviderSpan};

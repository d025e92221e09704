//! JSON rendering: the block tree with resolved markup on every node.

use std::collections::BTreeMap;

use serde::Serialize;

use super::resolve::{data_uri, ContentResolver};
use super::{ExtractionStats, RenderOptions, RenderResult};
use crate::error::{Error, Result};
use crate::geometry::Polygon;
use crate::model::{BlockId, BlockType, Document, Metadata, OutputNode, Page, SectionHierarchy};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize `value` in the requested layout.
pub(crate) fn serialize<T: Serialize>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Top-level JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDocument {
    pub metadata: Metadata,

    /// One node per rendered page
    pub children: Vec<JsonNode>,
}

/// One block of the tree.
#[derive(Debug, Clone, Serialize)]
pub struct JsonNode {
    pub id: BlockId,
    pub block_type: BlockType,

    /// Fully resolved markup
    pub html: String,

    pub polygon: Polygon,
    pub bbox: [f32; 4],
    pub section_hierarchy: SectionHierarchy,

    /// Image crops for this block as data URIs, keyed by asset name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<JsonNode>>,

    /// Character records of a line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chars: Option<Vec<JsonChar>>,
}

/// A character with its raw polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonChar {
    pub text: String,
    pub polygon: Polygon,
    pub bbox: [f32; 4],
}

impl JsonChar {
    /// Character records under `line`, in structure order.
    pub(crate) fn collect(page: &Page, line: BlockId) -> Vec<JsonChar> {
        page.contained_blocks(line, &[BlockType::Char])
            .into_iter()
            .filter_map(|id| page.get_block(id))
            .map(|block| JsonChar {
                text: block.char_text().unwrap_or_default().to_string(),
                polygon: block.polygon,
                bbox: block.polygon.bbox(),
            })
            .collect()
    }
}

/// Convert a document to JSON.
pub fn to_json(doc: &Document, options: &RenderOptions) -> Result<String> {
    Ok(JsonRenderer::new(options.clone()).render(doc)?.content)
}

/// JSON renderer.
pub struct JsonRenderer {
    options: RenderOptions,
}

impl JsonRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Build the serializable tree without encoding it.
    pub fn build(&self, doc: &Document) -> (JsonDocument, ExtractionStats, BTreeMap<String, Vec<u8>>) {
        let output = doc.render();
        let mut resolver = ContentResolver::new(doc, &self.options);
        let mut stats = ExtractionStats::new();
        let mut children = Vec::new();

        for page_node in output.pages.iter().filter(|p| self.options.includes_page(p.id.page)) {
            let Some(page) = doc.get_page(page_node.id.page) else {
                continue;
            };
            stats.tally_page(page_node);
            stats.count_text(&page.raw_text(page.id()));

            let regions = page_node
                .children
                .iter()
                .map(|child| self.node(page, child, &mut resolver))
                .collect();
            children.push(JsonNode {
                id: page_node.id,
                block_type: BlockType::Page,
                html: resolver.resolve(page_node),
                polygon: page_node.polygon,
                bbox: page_node.polygon.bbox(),
                section_hierarchy: page_node.section_hierarchy.clone(),
                images: BTreeMap::new(),
                children: Some(regions),
                chars: None,
            });
        }

        let document = JsonDocument {
            metadata: doc.metadata.clone(),
            children,
        };
        (document, stats, resolver.into_images())
    }

    /// Render the document to a JSON string.
    pub fn render(&self, doc: &Document) -> Result<RenderResult> {
        let (document, stats, images) = self.build(doc);
        let content = serialize(&document, self.options.json_format)?;
        Ok(RenderResult::new(content, images, doc.metadata.clone(), stats))
    }

    fn node(&self, page: &Page, node: &OutputNode, resolver: &mut ContentResolver<'_>) -> JsonNode {
        let html = resolver.resolve_region(node);

        let mut images = BTreeMap::new();
        if node.block_type().is_image() {
            let name = ContentResolver::image_name(node.id);
            if let Some(png) = resolver.images().get(&name) {
                images.insert(name, data_uri(png));
            }
        }

        let (children, chars) = if node.block_type() == BlockType::Line {
            (None, Some(JsonChar::collect(page, node.id)))
        } else {
            let children: Vec<JsonNode> = node
                .children
                .iter()
                .map(|child| self.node(page, child, resolver))
                .collect();
            ((!children.is_empty()).then_some(children), None)
        };

        JsonNode {
            id: node.id,
            block_type: node.block_type(),
            html,
            polygon: node.polygon,
            bbox: node.polygon.bbox(),
            section_hierarchy: node.section_hierarchy.clone(),
            images,
            children,
            chars,
        }
    }
}

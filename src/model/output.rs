//! Render traversal: projects the block tree into [`OutputNode`]s whose
//! content refers to children through content-ref markers.

use std::collections::BTreeMap;

use html_escape::{encode_single_quoted_attribute, encode_text};
use serde::Serialize;

use super::block::{Block, BlockContent, BlockId, BlockType, SpanContent};
use super::document::Document;
use super::page::Page;
use crate::geometry::Polygon;

/// Heading level to the id of the most recent header at that level.
pub type SectionHierarchy = BTreeMap<u8, BlockId>;

/// Heading level assumed for section headers without an inferred level.
pub const DEFAULT_HEADING_LEVEL: u8 = 2;

/// Placeholder that stands for a child's rendered content.
pub fn content_ref(id: BlockId) -> String {
    format!("<content-ref src='{}'></content-ref>", id)
}

/// Rendered form of one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputNode {
    pub id: BlockId,
    pub polygon: Polygon,

    /// Own markup, with children present only as content-ref markers
    pub html: String,

    pub children: Vec<OutputNode>,

    /// Headers in effect at this node
    pub section_hierarchy: SectionHierarchy,
}

impl OutputNode {
    pub fn block_type(&self) -> BlockType {
        self.id.block_type
    }

    /// Direct child with the given id.
    pub fn child(&self, id: BlockId) -> Option<&OutputNode> {
        self.children.iter().find(|child| child.id == id)
    }

    /// Depth-first search for nodes of the given type.
    pub fn descendants_of_type(&self, block_type: BlockType) -> Vec<&OutputNode> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.block_type() == block_type {
                found.push(child);
            }
            found.extend(child.descendants_of_type(block_type));
        }
        found
    }
}

/// Rendered form of a whole document: one node per page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutput {
    pub pages: Vec<OutputNode>,
}

impl Document {
    /// Render the tree. The section hierarchy is threaded through pages in
    /// order and snapshotted at every node.
    pub fn render(&self) -> DocumentOutput {
        let mut hierarchy = SectionHierarchy::new();
        let pages = self
            .pages
            .iter()
            .map(|page| render_page(page, &mut hierarchy))
            .collect();
        DocumentOutput { pages }
    }
}

fn render_page(page: &Page, hierarchy: &mut SectionHierarchy) -> OutputNode {
    let section_hierarchy = hierarchy.clone();
    let children = page
        .structure
        .iter()
        .filter_map(|id| render_block(page, *id, hierarchy))
        .collect();

    OutputNode {
        id: page.id(),
        polygon: page.polygon,
        html: page.structure.iter().map(|id| content_ref(*id)).collect(),
        children,
        section_hierarchy,
    }
}

fn render_block(page: &Page, id: BlockId, hierarchy: &mut SectionHierarchy) -> Option<OutputNode> {
    let Some(block) = page.get_block(id) else {
        log::warn!("Skipping unresolved block {} on page {}", id, page.index);
        return None;
    };

    if block.block_type() == BlockType::SectionHeader && !block.ignore_for_output {
        let level = block
            .region()
            .and_then(|r| r.heading_level)
            .unwrap_or(DEFAULT_HEADING_LEVEL);
        hierarchy.retain(|existing, _| *existing < level);
        hierarchy.insert(level, id);
    }

    let section_hierarchy = hierarchy.clone();
    let children = block
        .structure
        .iter()
        .filter_map(|child| render_block(page, *child, hierarchy))
        .collect();

    Some(OutputNode {
        id,
        polygon: block.polygon,
        html: block.assemble_content(),
        children,
        section_hierarchy,
    })
}

impl Block {
    /// This block's own contribution: leaf markup for spans and chars, one
    /// content-ref per structure entry for everything else.
    pub fn assemble_content(&self) -> String {
        if self.ignore_for_output {
            return String::new();
        }
        if let Some(html) = self.region().and_then(|r| r.html.as_ref()) {
            return html.clone();
        }

        let refs: String = self.structure.iter().map(|id| content_ref(*id)).collect();
        let block_type = self.block_type();

        match block_type {
            BlockType::Page => refs,
            BlockType::Span => match &self.content {
                BlockContent::Span(span) => span_markup(span),
                _ => String::new(),
            },
            BlockType::Char => encode_text(self.char_text().unwrap_or_default()).into_owned(),
            BlockType::Line => format!("{}\n", refs),
            BlockType::SectionHeader => {
                let level = self
                    .region()
                    .and_then(|r| r.heading_level)
                    .unwrap_or(DEFAULT_HEADING_LEVEL)
                    .clamp(1, 6);
                format!("<h{level}>{refs}</h{level}>")
            }
            BlockType::ListGroup => format!("<ul>{}</ul>", refs),
            BlockType::ListItem => format!("<li>{}</li>", refs),
            BlockType::Code => format!("<pre>{}</pre>", refs),
            BlockType::Equation => format!(
                "<p block-type='Equation'><math display='block'>{}</math></p>",
                refs
            ),
            BlockType::TableGroup | BlockType::FigureGroup | BlockType::PictureGroup => {
                format!("<div block-type='{}'>{}</div>", block_type, refs)
            }
            BlockType::Figure | BlockType::Picture => {
                format!("<img block-type='{}' src='{}'/>", block_type, self.id)
            }
            BlockType::Text
            | BlockType::TextInlineMath
            | BlockType::Caption
            | BlockType::Footnote
            | BlockType::PageHeader
            | BlockType::PageFooter
            | BlockType::Table
            | BlockType::Form
            | BlockType::Handwriting
            | BlockType::TableOfContents
            | BlockType::ComplexRegion => {
                let continuation = self
                    .region()
                    .filter(|r| r.has_continuation)
                    .map(|_| " class='has-continuation'")
                    .unwrap_or_default();
                format!("<p block-type='{}'{}>{}</p>", block_type, continuation, refs)
            }
        }
    }
}

/// Escaped span text wrapped in its format tags. Nesting from outermost:
/// superscript, subscript, hyperlink, italic, bold, math.
fn span_markup(span: &SpanContent) -> String {
    if span.text.is_empty() && !span.format.math {
        return String::new();
    }

    let format = &span.format;
    let mut text = encode_text(&span.text).into_owned();
    if format.math {
        text = format!("<math display='inline'>{}</math>", text);
    }
    if format.bold {
        text = format!("<b>{}</b>", text);
    }
    if format.italic {
        text = format!("<i>{}</i>", text);
    }
    if let Some(url) = &span.url {
        text = format!("<a href='{}'>{}</a>", encode_single_quoted_attribute(url), text);
    }
    if format.subscript {
        text = format!("<sub>{}</sub>", text);
    }
    if format.superscript {
        text = format!("<sup>{}</sup>", text);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::block::{SourceMethod, SpanFormat};

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Polygon {
        Polygon::from_bbox([x0, y0, x1, y1]).unwrap()
    }

    fn add_text_line(page: &mut Page, region: BlockId, text: &str, format: SpanFormat) -> BlockId {
        let polygon = page.get_block(region).unwrap().polygon;
        let line = page.allocate_block(BlockType::Line, polygon).unwrap();
        let span = page
            .allocate(
                BlockType::Span,
                polygon,
                BlockContent::Span(SpanContent {
                    text: text.to_string(),
                    format,
                    ..Default::default()
                }),
                SourceMethod::Vector,
            )
            .unwrap();
        page.add_structure(line, span).unwrap();
        page.add_structure(region, line).unwrap();
        line
    }

    fn header(page: &mut Page, level: u8, y: f32) -> BlockId {
        let id = page
            .add_block(BlockType::SectionHeader, rect(0.0, y, 100.0, y + 10.0))
            .unwrap();
        page.get_block_mut(id).unwrap().region_mut().unwrap().heading_level = Some(level);
        id
    }

    #[test]
    fn test_container_emits_refs() {
        let mut page = Page::new(0, 100.0, 100.0).unwrap();
        let region = page.add_block(BlockType::Text, rect(0.0, 0.0, 100.0, 20.0)).unwrap();
        let line = add_text_line(&mut page, region, "hi", SpanFormat::plain());

        let html = page.get_block(region).unwrap().assemble_content();
        assert_eq!(html, format!("<p block-type='Text'>{}</p>", content_ref(line)));
        assert!(!html.contains("hi"));
    }

    #[test]
    fn test_span_markup_nesting() {
        let span = SpanContent {
            text: "a<b".to_string(),
            format: SpanFormat {
                bold: true,
                italic: true,
                superscript: true,
                ..Default::default()
            },
            url: Some("http://x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            span_markup(&span),
            "<sup><a href='http://x'><i><b>a&lt;b</b></i></a></sup>"
        );
    }

    #[test]
    fn test_ignored_block_renders_empty() {
        let mut page = Page::new(0, 100.0, 100.0).unwrap();
        let region = page.add_block(BlockType::PageHeader, rect(0.0, 0.0, 100.0, 10.0)).unwrap();
        add_text_line(&mut page, region, "running head", SpanFormat::plain());
        page.get_block_mut(region).unwrap().ignore_for_output = true;
        assert_eq!(page.get_block(region).unwrap().assemble_content(), "");
    }

    #[test]
    fn test_section_hierarchy_snapshots() {
        let mut doc = Document::new();
        doc.add_page(Page::new(0, 100.0, 100.0).unwrap()).unwrap();
        let page = doc.get_page_mut(0).unwrap();
        let h1 = header(page, 1, 0.0);
        let h2 = header(page, 2, 20.0);
        let text = page.add_block(BlockType::Text, rect(0.0, 40.0, 100.0, 50.0)).unwrap();
        let h2b = header(page, 2, 60.0);

        let output = doc.render();
        let nodes = &output.pages[0].children;
        assert_eq!(nodes[0].section_hierarchy.get(&1), Some(&h1));
        assert_eq!(nodes[2].id, text);
        assert_eq!(nodes[2].section_hierarchy.get(&2), Some(&h2));
        assert_eq!(nodes[3].section_hierarchy.get(&1), Some(&h1));
        assert_eq!(nodes[3].section_hierarchy.get(&2), Some(&h2b));
    }

    #[test]
    fn test_new_top_level_header_clears_deeper_levels() {
        let mut doc = Document::new();
        doc.add_page(Page::new(0, 100.0, 100.0).unwrap()).unwrap();
        let page = doc.get_page_mut(0).unwrap();
        header(page, 1, 0.0);
        header(page, 3, 20.0);
        let second = header(page, 1, 40.0);

        let output = doc.render();
        let last = &output.pages[0].children[2].section_hierarchy;
        assert_eq!(last.len(), 1);
        assert_eq!(last.get(&1), Some(&second));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut doc = Document::new();
        doc.add_page(Page::new(0, 100.0, 100.0).unwrap()).unwrap();
        let page = doc.get_page_mut(0).unwrap();
        let region = page.add_block(BlockType::Text, rect(0.0, 0.0, 100.0, 20.0)).unwrap();
        add_text_line(page, region, "x", SpanFormat::math());

        assert_eq!(doc.render(), doc.render());
    }

    #[test]
    fn test_replaced_block_unreachable() {
        let mut doc = Document::new();
        doc.add_page(Page::new(0, 100.0, 100.0).unwrap()).unwrap();
        let page = doc.get_page_mut(0).unwrap();
        let old = page.add_block(BlockType::Text, rect(0.0, 0.0, 100.0, 20.0)).unwrap();
        let new = page.allocate_block(BlockType::Table, rect(0.0, 0.0, 100.0, 20.0)).unwrap();
        let page_id = page.id();
        page.replace_block(page_id, old, new).unwrap();

        let output = doc.render();
        assert!(output.pages[0].child(old).is_none());
        assert!(output.pages[0].child(new).is_some());
        assert!(!output.pages[0].html.contains(&old.to_string()));
    }
}

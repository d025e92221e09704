//! OCR-JSON rendering: a flat page → line → character transcript.

use serde::Serialize;

use super::json::{serialize, JsonChar};
use super::{ContentResolver, ExtractionStats, RenderOptions, RenderResult};
use crate::error::Result;
use crate::geometry::Polygon;
use crate::model::{BlockId, BlockType, Document, SourceMethod};

#[derive(Debug, Clone, Serialize)]
pub struct OcrJsonPage {
    pub page: u32,
    pub polygon: Polygon,
    pub bbox: [f32; 4],
    pub text_extraction_method: SourceMethod,
    pub lines: Vec<OcrJsonLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrJsonLine {
    pub id: BlockId,

    /// The line's span markup
    pub html: String,

    pub polygon: Polygon,
    pub bbox: [f32; 4],
    pub source: SourceMethod,
    pub chars: Vec<JsonChar>,
}

/// Convert a document to an OCR-JSON transcript.
pub fn to_ocr_json(doc: &Document, options: &RenderOptions) -> Result<String> {
    Ok(OcrJsonRenderer::new(options.clone()).render(doc)?.content)
}

pub struct OcrJsonRenderer {
    options: RenderOptions,
}

impl OcrJsonRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Lines of every selected page in reading order.
    pub fn build(&self, doc: &Document) -> (Vec<OcrJsonPage>, ExtractionStats) {
        let output = doc.render();
        let mut resolver = ContentResolver::new(doc, &self.options);
        let mut stats = ExtractionStats::new();
        let mut pages = Vec::new();

        for page_node in output.pages.iter().filter(|p| self.options.includes_page(p.id.page)) {
            let Some(page) = doc.get_page(page_node.id.page) else {
                continue;
            };
            stats.tally_page(page_node);

            let lines = page_node
                .descendants_of_type(BlockType::Line)
                .into_iter()
                .map(|line| {
                    let source = page
                        .get_block(line.id)
                        .map(|block| block.source)
                        .unwrap_or_default();
                    let html = resolver.resolve(line).trim_end_matches('\n').to_string();
                    stats.count_text(&page.raw_text(line.id));
                    OcrJsonLine {
                        id: line.id,
                        html,
                        polygon: line.polygon,
                        bbox: line.polygon.bbox(),
                        source,
                        chars: JsonChar::collect(page, line.id),
                    }
                })
                .collect();

            pages.push(OcrJsonPage {
                page: page.index,
                polygon: page.polygon,
                bbox: page.polygon.bbox(),
                text_extraction_method: page.text_extraction_method,
                lines,
            });
        }
        (pages, stats)
    }

    pub fn render(&self, doc: &Document) -> Result<RenderResult> {
        let (pages, stats) = self.build(doc);
        let content = serialize(&pages, self.options.json_format)?;
        Ok(RenderResult::new(
            content,
            Default::default(),
            doc.metadata.clone(),
            stats,
        ))
    }
}

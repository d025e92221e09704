//! HTML rendering.

use html_escape::encode_text;
use scraper::Html;

use super::{ContentResolver, ExtractionStats, RenderOptions, RenderResult};
use crate::error::Result;
use crate::model::Document;

/// Convert a document to a standalone HTML page.
pub fn to_html(doc: &Document, options: &RenderOptions) -> Result<String> {
    Ok(HtmlRenderer::new(options.clone()).render(doc)?.content)
}

/// HTML renderer.
pub struct HtmlRenderer {
    options: RenderOptions,
}

impl HtmlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render the document body, one resolved page after another.
    pub fn render(&self, doc: &Document) -> Result<RenderResult> {
        let output = doc.render();
        let mut resolver = ContentResolver::new(doc, &self.options);
        let mut stats = ExtractionStats::new();
        let mut body = String::new();

        for page in output.pages.iter().filter(|p| self.options.includes_page(p.id.page)) {
            stats.tally_page(page);
            let html = resolver.resolve(page);
            if self.options.paginate {
                body.push_str(&format!(
                    "<div class='page' data-page-id='{}'>{}</div>\n",
                    page.id.page, html
                ));
            } else {
                body.push_str(&html);
            }
        }
        stats.count_text(&visible_text(&body));

        let title = doc
            .metadata
            .title
            .as_deref()
            .map(|t| format!("<title>{}</title>", encode_text(t)))
            .unwrap_or_default();
        let content = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/>{}</head><body>\n{}</body></html>\n",
            title, body
        );

        Ok(RenderResult::new(
            content,
            resolver.into_images(),
            doc.metadata.clone(),
            stats,
        ))
    }
}

/// Text nodes of an HTML fragment, separated so adjacent elements do not
/// merge into one word.
fn visible_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

//! Markdown rendering.

use std::borrow::Cow;

use regex::Regex;
use scraper::{ElementRef, Html};

use super::{ContentResolver, ExtractionStats, RenderOptions, RenderResult, PAGE_SEPARATOR_WIDTH};
use crate::error::Result;
use crate::model::{BlockType, Document, OutputNode};

/// Characters that mark a word broken across lines.
const HYPHENS: [char; 4] = ['-', '\u{2010}', '\u{ad}', '\u{ac}'];

/// Convert a document to Markdown.
pub fn to_markdown(doc: &Document, options: &RenderOptions) -> Result<String> {
    Ok(MarkdownRenderer::new(options.clone()).render(doc)?.content)
}

/// Markdown page delimiter for the page at 0-based `index`.
pub fn page_delimiter(index: u32) -> String {
    format!("\n\n{{{}}}{}\n\n", index, "-".repeat(PAGE_SEPARATOR_WIDTH))
}

/// One rendered region waiting to be joined with its neighbors.
struct MarkdownBlock {
    markdown: String,
    raw_text: String,
    continues: bool,
}

/// Markdown renderer.
pub struct MarkdownRenderer {
    options: RenderOptions,
    hyphen_end: Regex,
    line_hyphen: Regex,
    blank_lines: Regex,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            hyphen_end: Regex::new(r"[\p{Ll}\d][-\x{2010}\x{ad}\x{ac}]\s*$")
                .expect("hyphen pattern is valid"),
            line_hyphen: Regex::new(
                r"([\p{Ll}\d])[-\x{2010}\x{ad}\x{ac}][ \t]*((?:</[^>]+>)*)[ \t]*\n((?:\s*<[a-zA-Z][^>]*>)*)[ \t]*(\p{Ll})",
            )
            .expect("line hyphen pattern is valid"),
            blank_lines: Regex::new(r"\n{3,}").expect("blank line pattern is valid"),
        }
    }

    /// Render a document to Markdown with extraction statistics.
    pub fn render(&self, doc: &Document) -> Result<RenderResult> {
        let output = doc.render();
        let mut resolver = ContentResolver::new(doc, &self.options);
        let mut stats = ExtractionStats::new();
        let mut body = String::new();
        let mut previous: Option<MarkdownBlock> = None;
        // Delimiters held back until the successor of a continued block is known.
        let mut boundary: Option<String> = None;

        for page in output.pages.iter().filter(|p| self.options.includes_page(p.id.page)) {
            stats.tally_page(page);
            if self.options.paginate {
                let delimiter = page_delimiter(page.id.page);
                match previous.take() {
                    Some(prev) if prev.continues => {
                        boundary.get_or_insert_with(String::new).push_str(&delimiter);
                        previous = Some(prev);
                    }
                    prev => {
                        if let Some(prev) = prev {
                            body.push_str(&prev.markdown);
                        }
                        body.push_str(&delimiter);
                    }
                }
            }

            for region in &page.children {
                let Some(block) = self.render_region(doc, region, &mut resolver) else {
                    continue;
                };
                match (previous.take(), boundary.take()) {
                    (None, _) => {
                        if !body.is_empty() && !body.ends_with("\n\n") {
                            body.push_str("\n\n");
                        }
                        previous = Some(block);
                    }
                    (Some(mut prev), Some(delimiters)) => {
                        if self.drops_hyphen(&prev, &block) {
                            strip_hyphen(&mut prev.markdown);
                        }
                        body.push_str(&prev.markdown);
                        body.push_str(&delimiters);
                        previous = Some(block);
                    }
                    (Some(prev), None) => previous = Some(self.join(&mut body, prev, block)),
                }
            }
        }
        if let Some(block) = previous {
            body.push_str(&block.markdown);
        }
        if let Some(delimiters) = boundary {
            body.push_str(&delimiters);
        }

        let body = self.blank_lines.replace_all(&body, "\n\n");
        let body = if self.options.paginate {
            body.trim_end()
        } else {
            body.trim()
        };
        let mut content = String::new();
        if self.options.include_frontmatter {
            content.push_str(&doc.metadata.to_yaml_frontmatter());
            content.push('\n');
            content.push_str(body.trim_start_matches('\n'));
        } else {
            content.push_str(body);
        }
        stats.count_text(&content);

        Ok(RenderResult::new(
            content,
            resolver.into_images(),
            doc.metadata.clone(),
            stats,
        ))
    }

    /// Whether `prev` ends in a broken word that `next` completes.
    fn drops_hyphen(&self, prev: &MarkdownBlock, next: &MarkdownBlock) -> bool {
        prev.continues && self.hyphen_end.is_match(&prev.markdown) && starts_lowercase(&next.raw_text)
    }

    /// Emit `prev` into `body` and return the block that is now pending.
    ///
    /// A continued paragraph is glued to its successor; a trailing
    /// `lowercase-` hyphen is dropped when the successor's raw text starts
    /// in lowercase.
    fn join(&self, body: &mut String, prev: MarkdownBlock, next: MarkdownBlock) -> MarkdownBlock {
        if !prev.continues {
            body.push_str(&prev.markdown);
            body.push_str("\n\n");
            return next;
        }

        let drop_hyphen = self.drops_hyphen(&prev, &next);
        let mut merged = prev.markdown;
        if drop_hyphen {
            strip_hyphen(&mut merged);
        } else if !merged.ends_with(HYPHENS) {
            merged.push(' ');
        }
        merged.push_str(&next.markdown);

        MarkdownBlock {
            markdown: merged,
            raw_text: prev.raw_text,
            continues: next.continues,
        }
    }

    fn render_region(
        &self,
        doc: &Document,
        region: &OutputNode,
        resolver: &mut ContentResolver<'_>,
    ) -> Option<MarkdownBlock> {
        let html = resolver.resolve_region(region);
        let html = match region.block_type() {
            BlockType::Code | BlockType::Equation => Cow::Borrowed(html.as_str()),
            _ => self.join_hyphenated_lines(&html),
        };
        let markdown = self.html_to_markdown(&html);
        if markdown.is_empty() {
            return None;
        }

        let page = doc.get_page(region.id.page)?;
        let continues = page
            .get_block(region.id)
            .and_then(|block| block.region())
            .is_some_and(|r| r.has_continuation);
        Some(MarkdownBlock {
            markdown,
            raw_text: page.raw_text(region.id),
            continues,
        })
    }

    /// Rejoin words hyphenated at a line break when the next line starts
    /// in lowercase. Markup between the two lines is kept.
    pub fn join_hyphenated_lines<'a>(&self, html: &'a str) -> Cow<'a, str> {
        self.line_hyphen.replace_all(html, "$1$2$3$4")
    }

    /// Convert a resolved HTML fragment to trimmed Markdown.
    pub fn html_to_markdown(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let markdown = self.convert_children(fragment.root_element(), false);
        self.blank_lines
            .replace_all(&markdown, "\n\n")
            .trim()
            .to_string()
    }

    /// Convert the children of `element`, merging runs of identical
    /// bold, italic, and inline math siblings.
    fn convert_children(&self, element: ElementRef<'_>, raw: bool) -> String {
        let mut out = String::new();
        let mut children = element.children().peekable();
        while let Some(child) = children.next() {
            if let Some(text) = child.value().as_text() {
                out.push_str(&self.convert_text(text, raw));
                continue;
            }
            let Some(child) = ElementRef::wrap(child) else {
                continue;
            };
            if !is_inline_run(child) {
                out.push_str(&self.convert(child, raw));
                continue;
            }

            let mut run = vec![child];
            while let Some(next) = children.peek().and_then(|node| ElementRef::wrap(*node)) {
                if !same_element(child, next) {
                    break;
                }
                run.push(next);
                children.next();
            }
            out.push_str(&self.convert_run(&run, raw));
        }
        out
    }

    fn convert_text(&self, text: &str, raw: bool) -> String {
        if raw {
            return text.to_string();
        }
        let collapsed = collapse_whitespace(text);
        if self.options.escape_special_chars {
            escape_markdown(&collapsed)
        } else {
            collapsed
        }
    }

    /// Convert adjacent `b`, `i`, or inline `math` elements as one run.
    fn convert_run(&self, run: &[ElementRef<'_>], raw: bool) -> String {
        let Some(first) = run.first() else {
            return String::new();
        };
        let name = first.value().name();
        let raw = raw || name == "math";
        let inner: String = run
            .iter()
            .map(|element| self.convert_children(*element, raw))
            .collect();

        match name {
            "b" | "strong" => wrap_inline("**", &inner),
            "i" | "em" => wrap_inline("*", &inner),
            _ => {
                let tex = inner.trim();
                if tex.is_empty() {
                    String::new()
                } else if first.value().attr("display") == Some("block") {
                    format!("\n\n$$\n{}\n$$\n\n", tex)
                } else {
                    format!("${}$", tex)
                }
            }
        }
    }

    fn convert(&self, element: ElementRef<'_>, raw: bool) -> String {
        let tag = element.value().name();
        match tag {
            "p" | "div" => format!("\n\n{}\n\n", self.convert_children(element, raw).trim()),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let text = self.convert_children(element, raw);
                format!("\n\n{} {}\n\n", "#".repeat(level), text.trim())
            }
            "ul" | "ol" => {
                let items: Vec<String> = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .map(|child| self.convert(child, raw))
                    .filter(|item| !item.is_empty())
                    .collect();
                format!("\n\n{}\n\n", items.join("\n"))
            }
            "li" => format!("- {}", self.convert_children(element, raw).trim()),
            "pre" => {
                let code: String = element.text().collect();
                format!("\n\n```\n{}\n```\n\n", code.trim_end())
            }
            "b" | "strong" | "i" | "em" | "math" => self.convert_run(&[element], raw),
            "sup" | "sub" => format!("<{tag}>{}</{tag}>", self.convert_children(element, raw)),
            "a" => {
                let text = self.convert_children(element, raw);
                match element.value().attr("href") {
                    Some(href) => format!("[{}]({})", text.trim(), href),
                    None => text,
                }
            }
            "img" => format!(
                "![{}]({})",
                element.value().attr("alt").unwrap_or_default(),
                element.value().attr("src").unwrap_or_default()
            ),
            "br" => "\n".to_string(),
            _ => self.convert_children(element, raw),
        }
    }
}

fn is_inline_run(element: ElementRef<'_>) -> bool {
    match element.value().name() {
        "b" | "i" | "em" | "strong" => true,
        "math" => element.value().attr("display") != Some("block"),
        _ => false,
    }
}

fn same_element(a: ElementRef<'_>, b: ElementRef<'_>) -> bool {
    a.value().name() == b.value().name() && a.value().attrs().eq(b.value().attrs())
}

fn starts_lowercase(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(char::is_lowercase)
}

fn strip_hyphen(markdown: &mut String) {
    let len = markdown.trim_end().len();
    markdown.truncate(len);
    markdown.pop();
}

/// Wrap inline text in a marker, keeping surrounding whitespace outside.
fn wrap_inline(marker: &str, inner: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_string();
    }
    let leading = &inner[..inner.len() - inner.trim_start().len()];
    let trailing = &inner[inner.trim_end().len()..];
    format!("{leading}{marker}{trimmed}{marker}{trailing}")
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                result.push(' ');
            }
            in_space = true;
        } else {
            result.push(c);
            in_space = false;
        }
    }
    result
}

/// Escape special Markdown characters.
/// Only escape characters that could be misinterpreted as Markdown syntax.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' | '$' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new(RenderOptions::new())
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Hello *world*"), "Hello \\*world\\*");
        assert_eq!(escape_markdown("[link]"), "\\[link\\]");
        assert_eq!(escape_markdown("cost $5"), "cost \\$5");
    }

    #[test]
    fn test_paragraph_lines_joined() {
        let md = renderer().html_to_markdown("<p block-type='Text'>first line\nsecond line\n</p>");
        assert_eq!(md, "first line second line");
    }

    #[test]
    fn test_heading() {
        assert_eq!(renderer().html_to_markdown("<h2>Results\n</h2>"), "## Results");
    }

    #[test]
    fn test_inline_formats() {
        let md = renderer().html_to_markdown(
            "<p>a <b>bold </b><i>it</i> <math display='inline'>x^2</math></p>",
        );
        assert_eq!(md, "a **bold** *it* $x^2$");
    }

    #[test]
    fn test_adjacent_runs_coalesced() {
        let md = renderer().html_to_markdown("<p><b>one </b><b>two</b> <i>a</i><i>b</i></p>");
        assert_eq!(md, "**one two** *ab*");
    }

    #[test]
    fn test_block_math() {
        let md = renderer()
            .html_to_markdown("<p block-type='Equation'><math display='block'>E = mc^2\n</math></p>");
        assert_eq!(md, "$$\nE = mc^2\n$$");
    }

    #[test]
    fn test_math_not_escaped() {
        let md = renderer().html_to_markdown("<math display='inline'>a_1 &lt; b</math>");
        assert_eq!(md, "$a_1 < b$");
    }

    #[test]
    fn test_list_and_code() {
        let md = renderer().html_to_markdown("<ul><li>one\n</li><li>two\n</li></ul>");
        assert_eq!(md, "- one\n- two");
        let md = renderer().html_to_markdown("<pre>fn main() {}\n  x\n</pre>");
        assert_eq!(md, "```\nfn main() {}\n  x\n```");
    }

    #[test]
    fn test_image_and_link() {
        let md = renderer()
            .html_to_markdown("<p><a href='http://x.org'>site</a> <img src='a.png' alt=''/></p>");
        assert_eq!(md, "[site](http://x.org) ![](a.png)");
    }

    #[test]
    fn test_page_delimiter() {
        let delimiter = page_delimiter(3);
        assert!(delimiter.starts_with("\n\n{3}"));
        assert!(delimiter.ends_with(&format!("{}\n\n", "-".repeat(48))));
    }

    #[test]
    fn test_join_drops_hyphen_for_lowercase() {
        let renderer = renderer();
        let mut body = String::new();
        let prev = MarkdownBlock {
            markdown: "the exam-".to_string(),
            raw_text: "the exam-\n".to_string(),
            continues: true,
        };
        let next = MarkdownBlock {
            markdown: "ple ends".to_string(),
            raw_text: "ple ends\n".to_string(),
            continues: false,
        };
        let joined = renderer.join(&mut body, prev, next);
        assert_eq!(joined.markdown, "the example ends");
        assert!(body.is_empty());
    }

    #[test]
    fn test_join_keeps_hyphen_after_uppercase() {
        let renderer = renderer();
        let mut body = String::new();
        let prev = MarkdownBlock {
            markdown: "UPPER-".to_string(),
            raw_text: "UPPER-\n".to_string(),
            continues: true,
        };
        let next = MarkdownBlock {
            markdown: "continues".to_string(),
            raw_text: "continues\n".to_string(),
            continues: false,
        };
        assert_eq!(renderer.join(&mut body, prev, next).markdown, "UPPER-continues");
    }

    #[test]
    fn test_hyphenated_lines_rejoined() {
        let renderer = renderer();
        let html = "<p block-type='Text'>the exam-\nple ends.\n</p>";
        let md = renderer.html_to_markdown(&renderer.join_hyphenated_lines(html));
        assert_eq!(md, "the example ends.");
    }

    #[test]
    fn test_hyphenated_lines_across_markup() {
        let renderer = renderer();
        let html = "<p><b>infor-</b>\n<i>mation</i> here\n</p>";
        assert_eq!(
            renderer.join_hyphenated_lines(html),
            "<p><b>infor</b><i>mation</i> here\n</p>"
        );
        let soft = "<p>trans\u{ad}\nport\n</p>";
        assert_eq!(renderer.join_hyphenated_lines(soft), "<p>transport\n</p>");
    }

    #[test]
    fn test_hyphen_kept_before_capital_line() {
        let renderer = renderer();
        let html = "<p>Smith-\nJones\n</p>";
        assert_eq!(renderer.join_hyphenated_lines(html), html);
    }

    #[test]
    fn test_named_entities_decoded() {
        let md = renderer().html_to_markdown("<p>angle &thetasym; and &CounterClockwiseContourIntegral;</p>");
        assert_eq!(md, "angle \u{3d1} and \u{2233}");
    }
}

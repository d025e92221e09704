//! Integration tests for the renderers on hand-built documents.

use docweave::assembly::PageAssembler;
use docweave::geometry::Polygon;
use docweave::model::{
    BlockId, BlockType, Document, Page, ProviderChar, ProviderOutput, ProviderSpan, SourceMethod,
};
use docweave::render::{
    to_html, to_json, to_markdown, to_ocr_json, HtmlFormat, DocumentRenderer, MarkdownFormat,
    RenderOptions, PAGE_SEPARATOR_WIDTH,
};
use image::{DynamicImage, RgbImage};

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Polygon {
    Polygon::from_bbox([x0, y0, x1, y1]).unwrap()
}

fn line(text: &str, polygon: Polygon) -> ProviderOutput {
    ProviderOutput::new(
        polygon,
        vec![ProviderSpan::new(text, polygon)],
        SourceMethod::Vector,
    )
}

/// Add a region of `block_type` holding one line of `text`.
fn add_region(page: &mut Page, block_type: BlockType, y: f32, text: &str) -> BlockId {
    let region = page
        .add_block(block_type, rect(10.0, y, 90.0, y + 10.0))
        .unwrap();
    PageAssembler::new()
        .assemble(page, vec![line(text, rect(12.0, y + 1.0, 88.0, y + 9.0))])
        .unwrap();
    region
}

fn document(pages: Vec<Page>) -> Document {
    let mut doc = Document::new();
    for page in pages {
        doc.add_page(page).unwrap();
    }
    doc.refresh_metadata();
    doc
}

#[test]
fn test_markdown_pagination_delimiters() {
    let mut first = Page::new(0, 100.0, 100.0).unwrap();
    add_region(&mut first, BlockType::Text, 10.0, "First page.");
    let mut second = Page::new(1, 100.0, 100.0).unwrap();
    add_region(&mut second, BlockType::Text, 10.0, "Second page.");
    let doc = document(vec![first, second]);

    let options = RenderOptions::new().with_pagination(true);
    let markdown = to_markdown(&doc, &options).unwrap();
    let rule = "-".repeat(PAGE_SEPARATOR_WIDTH);

    assert!(markdown.starts_with(&format!("\n\n{{0}}{}\n\n", rule)));
    assert!(markdown.contains(&format!("First page.\n\n{{1}}{}\n\nSecond page.", rule)));
}

#[test]
fn test_markdown_joins_continued_paragraph_across_pages() {
    let mut first = Page::new(0, 100.0, 100.0).unwrap();
    let region = add_region(&mut first, BlockType::Text, 80.0, "the exam-");
    first
        .get_block_mut(region)
        .unwrap()
        .region_mut()
        .unwrap()
        .has_continuation = true;
    let mut second = Page::new(1, 100.0, 100.0).unwrap();
    add_region(&mut second, BlockType::Text, 10.0, "ple continues.");
    let doc = document(vec![first, second]);

    let markdown = to_markdown(&doc, &RenderOptions::new()).unwrap();
    assert_eq!(markdown, "the example continues.");
}

#[test]
fn test_markdown_rejoins_word_split_across_lines() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    let region = page
        .add_block(BlockType::Text, rect(10.0, 10.0, 90.0, 40.0))
        .unwrap();
    PageAssembler::new()
        .assemble(
            &mut page,
            vec![
                line("the exam-", rect(12.0, 11.0, 88.0, 19.0)),
                line("ple ends.", rect(12.0, 21.0, 88.0, 29.0)),
            ],
        )
        .unwrap();
    assert_eq!(page.children(region).len(), 2);
    let doc = document(vec![page]);

    assert_eq!(to_markdown(&doc, &RenderOptions::new()).unwrap(), "the example ends.");
}

#[test]
fn test_markdown_dehyphenates_across_page_delimiter() {
    let mut first = Page::new(0, 100.0, 100.0).unwrap();
    let region = add_region(&mut first, BlockType::Text, 80.0, "the exam-");
    first
        .get_block_mut(region)
        .unwrap()
        .region_mut()
        .unwrap()
        .has_continuation = true;
    let mut second = Page::new(1, 100.0, 100.0).unwrap();
    add_region(&mut second, BlockType::Text, 10.0, "ple continues.");
    let doc = document(vec![first, second]);

    let markdown = to_markdown(&doc, &RenderOptions::new().with_pagination(true)).unwrap();
    let rule = "-".repeat(PAGE_SEPARATOR_WIDTH);
    assert_eq!(
        markdown,
        format!("\n\n{{0}}{rule}\n\nthe exam\n\n{{1}}{rule}\n\nple continues.")
    );
}

#[test]
fn test_markdown_list_is_tight() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    let list = page
        .add_block(BlockType::ListGroup, rect(10.0, 10.0, 90.0, 40.0))
        .unwrap();
    let lines = PageAssembler::new()
        .insert_lines(
            &mut page,
            vec![
                line("one", rect(12.0, 11.0, 88.0, 19.0)),
                line("two", rect(12.0, 26.0, 88.0, 34.0)),
            ],
        )
        .unwrap();
    for (line_id, y) in lines.into_iter().zip([10.0, 25.0]) {
        let item = page
            .allocate_block(BlockType::ListItem, rect(10.0, y, 90.0, y + 10.0))
            .unwrap();
        page.add_structure(item, line_id).unwrap();
        page.add_structure(list, item).unwrap();
    }
    let doc = document(vec![page]);

    assert_eq!(to_markdown(&doc, &RenderOptions::new()).unwrap(), "- one\n- two");
}

#[test]
fn test_markdown_renders_hyperlinks() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    page.add_block(BlockType::Text, rect(10.0, 10.0, 90.0, 20.0))
        .unwrap();
    let polygon = rect(12.0, 11.0, 88.0, 19.0);
    let span = ProviderSpan::new("the site", polygon).with_url("https://example.org/a?b=1&c=2");
    PageAssembler::new()
        .assemble(
            &mut page,
            vec![ProviderOutput::new(polygon, vec![span], SourceMethod::Vector)],
        )
        .unwrap();
    let doc = document(vec![page]);

    assert!(to_html(&doc, &RenderOptions::new())
        .unwrap()
        .contains("<a href='https://example.org/a?b=1&amp;c=2'>the site</a>"));
    assert_eq!(
        to_markdown(&doc, &RenderOptions::new()).unwrap(),
        "[the site](https://example.org/a?b=1&c=2)"
    );
}

#[test]
fn test_markdown_keeps_hyphen_before_capital() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    let region = add_region(&mut page, BlockType::Text, 10.0, "see the Smith-");
    page.get_block_mut(region)
        .unwrap()
        .region_mut()
        .unwrap()
        .has_continuation = true;
    add_region(&mut page, BlockType::Text, 30.0, "Jones report.");
    let doc = document(vec![page]);

    let markdown = to_markdown(&doc, &RenderOptions::new()).unwrap();
    assert_eq!(markdown, "see the Smith-Jones report.");
}

#[test]
fn test_ignored_regions_are_not_rendered() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    let header = add_region(&mut page, BlockType::PageHeader, 0.0, "Running head");
    page.get_block_mut(header).unwrap().ignore_for_output = true;
    add_region(&mut page, BlockType::Text, 30.0, "Body.");
    let doc = document(vec![page]);

    assert_eq!(to_markdown(&doc, &RenderOptions::new()).unwrap(), "Body.");
    assert!(!to_html(&doc, &RenderOptions::new()).unwrap().contains("Running head"));
}

#[test]
fn test_html_document_structure() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    add_region(&mut page, BlockType::SectionHeader, 10.0, "Methods");
    add_region(&mut page, BlockType::Text, 30.0, "a < b");
    let doc = document(vec![page]);

    let html = to_html(&doc, &RenderOptions::new().with_pagination(true)).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<div class='page' data-page-id='0'>"));
    assert!(html.contains("<h2>Methods\n</h2>"));
    assert!(html.contains("<p block-type='Text'>a &lt; b\n</p>"));
    assert!(!html.contains("content-ref"));
}

#[test]
fn test_page_selection_limits_output() {
    let mut first = Page::new(0, 100.0, 100.0).unwrap();
    add_region(&mut first, BlockType::Text, 10.0, "Alpha.");
    let mut second = Page::new(1, 100.0, 100.0).unwrap();
    add_region(&mut second, BlockType::Text, 10.0, "Beta.");
    let doc = document(vec![first, second]);

    let options = RenderOptions::new().with_page_list(vec![2]);
    let result = MarkdownFormat.render(&doc, &options).unwrap();
    assert_eq!(result.content, "Beta.");
    assert_eq!(result.stats.page_count, 1);
}

#[test]
fn test_figure_extracted_as_asset() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(200, 200));
    let mut page = Page::new(0, 100.0, 100.0).unwrap().with_image(image);
    let figure = page
        .add_block(BlockType::Figure, rect(10.0, 10.0, 60.0, 60.0))
        .unwrap();
    let doc = document(vec![page]);

    let name = format!("{}.png", figure.to_file_stem());
    let result = MarkdownFormat.render(&doc, &RenderOptions::new()).unwrap();
    assert_eq!(result.content, format!("![]({})", name));
    assert!(result.images.contains_key(&name));
    assert_eq!(result.stats.image_count, 1);

    let inline = HtmlFormat
        .render(&doc, &RenderOptions::new().with_extract_images(false))
        .unwrap();
    assert!(inline.content.contains("src='data:image/png;base64,"));
    assert!(inline.images.is_empty());
}

#[test]
fn test_figure_without_page_image_is_empty() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    page.add_block(BlockType::Picture, rect(10.0, 10.0, 60.0, 60.0))
        .unwrap();
    let doc = document(vec![page]);

    let result = MarkdownFormat.render(&doc, &RenderOptions::new()).unwrap();
    assert!(result.content.is_empty());
    assert!(result.images.is_empty());
}

#[test]
fn test_json_carries_section_hierarchy() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    let header = add_region(&mut page, BlockType::SectionHeader, 10.0, "Scope");
    add_region(&mut page, BlockType::Text, 30.0, "Text.");
    let doc = document(vec![page]);

    let json = to_json(&doc, &RenderOptions::new()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let text = &value["children"][0]["children"][1];
    assert_eq!(text["section_hierarchy"]["2"], header.to_string());
    assert_eq!(value["metadata"]["page_count"], 1);
}

#[test]
fn test_ocr_json_lists_chars_per_line() {
    let mut page = Page::new(0, 100.0, 100.0).unwrap();
    page.add_block(BlockType::Text, rect(10.0, 10.0, 90.0, 20.0))
        .unwrap();
    let polygon = rect(12.0, 11.0, 20.0, 19.0);
    let span = ProviderSpan::new("ab", polygon).with_chars(vec![
        ProviderChar {
            text: "a".to_string(),
            polygon: rect(12.0, 11.0, 16.0, 19.0),
        },
        ProviderChar {
            text: "b".to_string(),
            polygon: rect(16.0, 11.0, 20.0, 19.0),
        },
    ]);
    PageAssembler::new()
        .assemble(
            &mut page,
            vec![ProviderOutput::new(polygon, vec![span], SourceMethod::Ocr)],
        )
        .unwrap();
    let doc = document(vec![page]);

    let json = to_ocr_json(&doc, &RenderOptions::new()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let line = &value[0]["lines"][0];
    assert_eq!(line["html"], "ab");
    assert_eq!(line["source"], "ocr");
    assert_eq!(line["chars"].as_array().unwrap().len(), 2);
    assert_eq!(line["chars"][1]["text"], "b");
    assert_eq!(line["chars"][1]["bbox"][0], 16.0);
}

//! Content-ref resolution shared by every renderer.

use std::collections::BTreeMap;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use html_escape::encode_single_quoted_attribute;
use image::{GenericImageView, ImageFormat};
use regex::Regex;

use super::RenderOptions;
use crate::error::{Error, Result};
use crate::geometry::Polygon;
use crate::model::{BlockId, Document, OutputNode, Page};

/// Replaces content-ref markers with the resolved markup of the referenced
/// child, depth-first. Image blocks become `<img>` tags backed by a crop of
/// the page image.
pub struct ContentResolver<'a> {
    document: &'a Document,
    options: &'a RenderOptions,
    ref_pattern: Regex,
    images: BTreeMap<String, Vec<u8>>,
}

impl<'a> ContentResolver<'a> {
    pub fn new(document: &'a Document, options: &'a RenderOptions) -> Self {
        Self {
            document,
            options,
            ref_pattern: Regex::new(r"<content-ref src='([^']*)'></content-ref>")
                .expect("content-ref pattern is valid"),
            images: BTreeMap::new(),
        }
    }

    /// Fully resolved markup for `node`.
    pub fn resolve(&mut self, node: &OutputNode) -> String {
        let markers: Vec<(usize, usize, String)> = self
            .ref_pattern
            .captures_iter(&node.html)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), caps[1].to_string()))
            })
            .collect();
        if markers.is_empty() {
            return node.html.clone();
        }

        let mut output = String::with_capacity(node.html.len());
        let mut cursor = 0;
        for (start, end, src) in markers {
            output.push_str(&node.html[cursor..start]);
            cursor = end;

            let child = src
                .parse::<BlockId>()
                .ok()
                .and_then(|id| node.child(id));
            match child {
                Some(child) => output.push_str(&self.resolve_region(child)),
                None => {
                    let err = Error::Render(format!("no rendered child for '{}' in {}", src, node.id));
                    log::warn!("Substituting empty content: {}", err);
                }
            }
        }
        output.push_str(&node.html[cursor..]);
        output
    }

    /// Resolved markup for `node`, cropping it from the page image when it is
    /// an image block that still renders as one.
    pub fn resolve_region(&mut self, node: &OutputNode) -> String {
        if self.renders_as_image(node) {
            self.image_html(node)
        } else {
            self.resolve(node)
        }
    }

    fn renders_as_image(&self, node: &OutputNode) -> bool {
        if !node.block_type().is_image() || node.html.is_empty() {
            return false;
        }
        self.document
            .get_block(node.id)
            .and_then(|block| block.region())
            .is_some_and(|region| region.html.is_none())
    }

    /// Asset file name for an image block.
    pub fn image_name(id: BlockId) -> String {
        format!("{}.png", id.to_file_stem())
    }

    fn image_html(&mut self, node: &OutputNode) -> String {
        let Some(page) = self.document.get_page(node.id.page) else {
            return String::new();
        };

        let png = match crop_png(page, &node.polygon) {
            Ok(Some(png)) => png,
            Ok(None) => {
                log::debug!("No page image to crop for {}", node.id);
                return String::new();
            }
            Err(e) => {
                log::warn!("Could not crop {}: {}", node.id, e);
                return String::new();
            }
        };

        let src = if self.options.extract_images {
            let name = Self::image_name(node.id);
            let src = format!("{}{}", self.options.image_path_prefix, name);
            self.images.insert(name, png);
            src
        } else {
            data_uri(&png)
        };
        format!("<img src='{}' alt=''/>", encode_single_quoted_attribute(&src))
    }

    /// Assets collected so far.
    pub fn images(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.images
    }

    pub fn into_images(self) -> BTreeMap<String, Vec<u8>> {
        self.images
    }
}

/// PNG crop of the page image under `polygon`, `None` without a page image.
pub fn crop_png(page: &Page, polygon: &Polygon) -> Result<Option<Vec<u8>>> {
    let Some(image) = &page.image else {
        return Ok(None);
    };

    let (width, height) = image.dimensions();
    let [x0, y0, x1, y1] = polygon
        .rescale(page.size(), (width as f32, height as f32))
        .bbox();
    let left = (x0.max(0.0).floor() as u32).min(width);
    let top = (y0.max(0.0).floor() as u32).min(height);
    let right = (x1.max(0.0).ceil() as u32).min(width);
    let bottom = (y1.max(0.0).ceil() as u32).min(height);
    if right <= left || bottom <= top {
        return Err(Error::Image(format!(
            "empty crop [{}, {}, {}, {}] of {}x{} image",
            x0, y0, x1, y1, width, height
        )));
    }

    let cropped = image.crop_imm(left, top, right - left, bottom - top);
    let mut buffer = Vec::new();
    cropped.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(Some(buffer))
}

/// Inline `data:` URI for PNG bytes.
pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn page_with_image() -> Page {
        let image = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        Page::new(0, 100.0, 50.0).unwrap().with_image(image)
    }

    #[test]
    fn test_crop_rescales_to_image_space() {
        let page = page_with_image();
        let polygon = Polygon::from_bbox([10.0, 10.0, 20.0, 30.0]).unwrap();
        let png = crop_png(&page, &polygon).unwrap().unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (20, 40));
    }

    #[test]
    fn test_crop_without_image() {
        let page = Page::new(0, 100.0, 50.0).unwrap();
        let polygon = Polygon::from_bbox([0.0, 0.0, 10.0, 10.0]).unwrap();
        assert!(crop_png(&page, &polygon).unwrap().is_none());
    }

    #[test]
    fn test_crop_outside_image_fails() {
        let page = page_with_image();
        let polygon = Polygon::from_bbox([150.0, 60.0, 160.0, 70.0]).unwrap();
        assert!(crop_png(&page, &polygon).is_err());
    }

    #[test]
    fn test_data_uri_prefix() {
        assert!(data_uri(&[1, 2, 3]).starts_with("data:image/png;base64,"));
        assert_eq!(data_uri(&[1, 2, 3]), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_image_name() {
        let id = BlockId::new(2, crate::model::BlockType::Figure, 7);
        assert_eq!(ContentResolver::image_name(id), "_page_2_Figure_7.png");
    }
}

//! Candidate lines exchanged between text sources and the assembler.

use serde::{Deserialize, Serialize};

use super::block::{FontInfo, SourceMethod, SpanFormat};
use crate::geometry::Polygon;

/// A single character box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderChar {
    pub text: String,
    pub polygon: Polygon,
}

/// A run of text sharing one format set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpan {
    pub text: String,
    pub polygon: Polygon,
    pub font: FontInfo,
    pub format: SpanFormat,
    pub url: Option<String>,

    /// Per-character boxes, when the source exposes them
    pub chars: Option<Vec<ProviderChar>>,
}

impl ProviderSpan {
    /// Plain span without font or character data.
    pub fn new(text: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            text: text.into(),
            polygon,
            font: FontInfo::default(),
            format: SpanFormat::default(),
            url: None,
            chars: None,
        }
    }

    pub fn with_format(mut self, format: SpanFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_chars(mut self, chars: Vec<ProviderChar>) -> Self {
        self.chars = Some(chars);
        self
    }

    pub fn with_font(mut self, font: FontInfo) -> Self {
        self.font = font;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Empty placeholder positioned at an inline-math box.
    pub fn math_placeholder(polygon: Polygon) -> Self {
        Self::new(String::new(), polygon).with_format(SpanFormat::math())
    }

    /// True for a math span whose text has not been recognized yet.
    pub fn is_math_placeholder(&self) -> bool {
        self.format.math && self.text.is_empty()
    }
}

/// One candidate line plus its spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    pub polygon: Polygon,
    pub spans: Vec<ProviderSpan>,
    pub source: SourceMethod,
}

impl ProviderOutput {
    pub fn new(polygon: Polygon, spans: Vec<ProviderSpan>, source: SourceMethod) -> Self {
        Self {
            polygon,
            spans,
            source,
        }
    }

    /// Concatenated span text.
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

//! Builds spans from recognizer markup.

use html_escape::decode_html_entities;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::collaborator::RecognizedLine;
use crate::geometry::Polygon;
use crate::model::{ProviderChar, ProviderSpan, SpanFormat};

/// Splits `<math>`, `<i>`, `<b>` markup into formatted spans.
///
/// Opening tags enter a state and closing tags leave it; a closer with no
/// matching opener is ignored. Each maximal run of text under one format set
/// becomes a span.
pub struct MarkupSpanBuilder {
    tag_pattern: Regex,
}

#[derive(Default)]
struct TagDepth {
    math: usize,
    italic: usize,
    bold: usize,
}

impl TagDepth {
    fn format(&self) -> SpanFormat {
        SpanFormat {
            math: self.math > 0,
            italic: self.italic > 0,
            bold: self.bold > 0,
            ..Default::default()
        }
    }

    fn counter(&mut self, tag: &str) -> Option<&mut usize> {
        match tag {
            "math" => Some(&mut self.math),
            "i" => Some(&mut self.italic),
            "b" => Some(&mut self.bold),
            _ => None,
        }
    }
}

struct Run {
    format: SpanFormat,
    text: String,
    first_char: usize,
    char_count: usize,
}

impl MarkupSpanBuilder {
    pub fn new() -> Self {
        Self {
            tag_pattern: Regex::new(r"(?i)<(/?)(math|i|b)(?:\s[^>]*)?>")
                .expect("inline markup tag pattern is valid"),
        }
    }

    /// Spans for one recognized line.
    pub fn build(&self, line: &RecognizedLine, line_polygon: Polygon) -> Vec<ProviderSpan> {
        let runs = self.runs(&line.markup);
        let total_chars: usize = runs.iter().map(|run| run.char_count).sum();

        let chars = match &line.chars {
            Some(chars) if chars.len() == total_chars => Some(chars.as_slice()),
            Some(chars) => {
                log::debug!(
                    "Ignoring {} recognized chars for {} text chars",
                    chars.len(),
                    total_chars
                );
                None
            }
            None => None,
        };

        runs.into_iter()
            .map(|run| {
                let text: String = run.text.nfc().collect();
                let run_chars: Option<Vec<ProviderChar>> = chars.map(|chars| {
                    chars[run.first_char..run.first_char + run.char_count]
                        .iter()
                        .map(|c| ProviderChar {
                            text: c.text.clone(),
                            polygon: c.polygon,
                        })
                        .collect()
                });
                let polygon = run_chars
                    .as_ref()
                    .and_then(|chars| {
                        let polygons: Vec<Polygon> = chars.iter().map(|c| c.polygon).collect();
                        Polygon::merge_all(&polygons)
                    })
                    .unwrap_or(line_polygon);

                let mut span = ProviderSpan::new(text, polygon).with_format(run.format);
                span.chars = run_chars;
                span
            })
            .collect()
    }

    /// Spans for a line that is math as a whole.
    pub fn build_math(&self, line: &RecognizedLine, line_polygon: Polygon) -> Vec<ProviderSpan> {
        let mut spans = self.build(line, line_polygon);
        for span in &mut spans {
            span.format.math = true;
        }
        spans
    }

    /// Tag-stripped, decoded, normalized text.
    pub fn plain_text(&self, markup: &str) -> String {
        self.runs(markup)
            .into_iter()
            .map(|run| run.text)
            .collect::<String>()
            .nfc()
            .collect()
    }

    fn runs(&self, markup: &str) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        let mut depth = TagDepth::default();
        let mut char_index = 0;
        let mut cursor = 0;

        let mut push_text = |raw: &str, format: SpanFormat, runs: &mut Vec<Run>| {
            let decoded = decode_html_entities(raw).into_owned();
            let count = decoded.chars().count();
            if count == 0 {
                return;
            }
            match runs.last_mut() {
                Some(last) if last.format == format => {
                    last.text.push_str(&decoded);
                    last.char_count += count;
                }
                _ => runs.push(Run {
                    format,
                    text: decoded,
                    first_char: char_index,
                    char_count: count,
                }),
            }
            char_index += count;
        };

        for captures in self.tag_pattern.captures_iter(markup) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            push_text(&markup[cursor..whole.start()], depth.format(), &mut runs);
            cursor = whole.end();

            let closing = !captures[1].is_empty();
            let tag = captures[2].to_ascii_lowercase();
            if let Some(counter) = depth.counter(&tag) {
                if closing {
                    *counter = counter.saturating_sub(1);
                } else {
                    *counter += 1;
                }
            }
        }
        push_text(&markup[cursor..], depth.format(), &mut runs);

        runs
    }
}

impl Default for MarkupSpanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Merging inline-math boxes into provider lines.

use std::collections::BTreeMap;

use crate::geometry::Polygon;
use crate::model::{ProviderChar, ProviderOutput, ProviderSpan};

use super::ReconcileOptions;

/// Location of an empty math span that still needs recognized text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MathSpanRef {
    pub line: usize,
    pub span: usize,
    pub polygon: Polygon,
}

/// Outcome of merging a page's math boxes into its provider lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MathMerge {
    /// Placeholders inserted into lines
    pub placeholders: Vec<MathSpanRef>,

    /// Math boxes that matched no line
    pub unmatched: Vec<Polygon>,
}

/// Index of the candidate containing the largest share of `math`.
///
/// Only horizontal candidates whose overlap share exceeds `threshold` are
/// considered. Ties keep the earliest candidate.
pub fn best_line_for_math(math: &Polygon, candidates: &[Polygon], threshold: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.is_horizontal() {
            continue;
        }
        let overlap = math.intersection_pct(candidate);
        if overlap <= threshold {
            continue;
        }
        if best.map_or(true, |(_, current)| overlap > current) {
            best = Some((index, overlap));
        }
    }
    best.map(|(index, _)| index)
}

/// Merge every math box into the provider line that holds most of it.
pub fn merge_inline_math(
    lines: &mut [ProviderOutput],
    math_boxes: &[Polygon],
    options: &ReconcileOptions,
) -> MathMerge {
    let line_polygons: Vec<Polygon> = lines.iter().map(|line| line.polygon).collect();

    let mut by_line: BTreeMap<usize, Vec<Polygon>> = BTreeMap::new();
    let mut unmatched = Vec::new();
    for math in math_boxes {
        match best_line_for_math(math, &line_polygons, options.inline_math_line_overlap) {
            Some(index) => by_line.entry(index).or_default().push(*math),
            None => unmatched.push(*math),
        }
    }

    let mut placeholders = Vec::new();
    for (index, boxes) in by_line {
        let line = &mut lines[index];
        for math in &boxes {
            let spans = std::mem::take(&mut line.spans);
            line.spans = excise_math(spans, math, options.inline_math_char_overlap);
        }

        line.spans
            .sort_by(|a, b| a.polygon.x_start().total_cmp(&b.polygon.x_start()));
        tag_math_neighbors(&mut line.spans);
        line.polygon = line.polygon.merge(&boxes);

        for (span_index, span) in line.spans.iter().enumerate() {
            if span.is_math_placeholder() {
                placeholders.push(MathSpanRef {
                    line: index,
                    span: span_index,
                    polygon: span.polygon,
                });
            }
        }
        log::debug!("Merged {} inline math box(es) into line {}", boxes.len(), index);
    }

    MathMerge {
        placeholders,
        unmatched,
    }
}

/// Remove the text under `math` from `spans` and add an empty math span.
///
/// Spans with character boxes lose only the characters covered by more than
/// `char_threshold`; the survivors are regrouped on either side of the math
/// box's center. Spans without characters are dropped whole when covered
/// by more than `char_threshold`.
pub fn excise_math(spans: Vec<ProviderSpan>, math: &Polygon, char_threshold: f32) -> Vec<ProviderSpan> {
    let mut result = Vec::with_capacity(spans.len() + 2);

    for span in spans {
        if span.is_math_placeholder() || span.polygon.intersection_area(math) <= 0.0 {
            result.push(span);
            continue;
        }

        match span.chars.as_deref() {
            Some(chars) if !chars.is_empty() => {
                let survivors: Vec<&ProviderChar> = chars
                    .iter()
                    .filter(|c| c.polygon.intersection_pct(math) <= char_threshold)
                    .collect();
                if survivors.len() == chars.len() {
                    result.push(span);
                    continue;
                }

                let center_x = math.center()[0];
                let (left, right): (Vec<&ProviderChar>, Vec<&ProviderChar>) = survivors
                    .into_iter()
                    .partition(|c| c.polygon.center()[0] < center_x);
                for side in [left, right] {
                    if let Some(rebuilt) = rebuild_span(&span, &side) {
                        result.push(rebuilt);
                    }
                }
            }
            _ => {
                if span.polygon.intersection_pct(math) <= char_threshold {
                    result.push(span);
                }
            }
        }
    }

    result.push(ProviderSpan::math_placeholder(*math));
    result
}

fn rebuild_span(template: &ProviderSpan, chars: &[&ProviderChar]) -> Option<ProviderSpan> {
    let polygons: Vec<Polygon> = chars.iter().map(|c| c.polygon).collect();
    let polygon = Polygon::merge_all(&polygons)?;
    Some(ProviderSpan {
        text: chars.iter().map(|c| c.text.as_str()).collect(),
        polygon,
        font: template.font.clone(),
        format: template.format,
        url: template.url.clone(),
        chars: Some(chars.iter().map(|c| (*c).clone()).collect()),
    })
}

/// Give an empty math span its neighbors' format set when both neighbors agree.
fn tag_math_neighbors(spans: &mut [ProviderSpan]) {
    for i in 1..spans.len().saturating_sub(1) {
        if !spans[i].is_math_placeholder() {
            continue;
        }
        let before = spans[i - 1].format;
        let after = spans[i + 1].format;
        if before == after {
            spans[i].format = spans[i].format.union(&before);
        }
    }
}

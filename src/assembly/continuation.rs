//! Flags text regions whose sentence runs on into the next text region.

use crate::model::{Block, BlockId, Document};

/// Whether `text` ends a sentence.
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map_or(true, |c| matches!(c, '.' | '!' | '?' | ':' | ';' | '。' | '！' | '？'))
}

fn starts_lowercase(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(char::is_lowercase)
}

/// Set `has_continuation` on text regions that stop mid-sentence when the
/// next text region starts in lowercase on a later page or in a new column.
///
/// Returns the number of flagged regions.
pub fn flag_continuations(document: &mut Document) -> usize {
    let mut flow: Vec<(BlockId, String)> = Vec::new();
    for page in &document.pages {
        for id in &page.structure {
            let Some(block) = page.get_block(*id) else {
                continue;
            };
            if !block.block_type().is_text_flow() || block.ignore_for_output {
                continue;
            }
            let text = page.raw_text(*id);
            if !text.trim().is_empty() {
                flow.push((*id, text));
            }
        }
    }

    let mut flagged = Vec::new();
    for pair in flow.windows(2) {
        let (current, current_text) = &pair[0];
        let (next, next_text) = &pair[1];
        if ends_sentence(current_text) || !starts_lowercase(next_text) {
            continue;
        }

        let breaks = next.page > current.page || {
            let (Some(a), Some(b)) = (document.get_block(*current), document.get_block(*next)) else {
                continue;
            };
            b.polygon.y_start() < a.polygon.y_start() || b.polygon.x_start() >= a.polygon.x_end()
        };
        if breaks {
            flagged.push(*current);
        }
    }

    for id in &flagged {
        if let Some(region) = document
            .get_page_mut(id.page)
            .and_then(|page| page.get_block_mut(*id))
            .and_then(Block::region_mut)
        {
            region.has_continuation = true;
        }
    }

    log::debug!("Flagged {} continued text region(s)", flagged.len());
    flagged.len()
}

//! Page-level types: the per-page block arena.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::block::{Block, BlockContent, BlockId, BlockType, SourceMethod};
use crate::error::{Error, Result};
use crate::geometry::Polygon;

/// Lifecycle of a block inside its page arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Allocated but not listed in any structure
    Unattached,
    /// Listed in a parent's structure
    Attached,
    /// Superseded through [`Page::replace_block`]
    Replaced,
}

/// A single page: its geometry, its reading-order structure, and the flat
/// arena owning every block on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page index (0-based)
    pub index: u32,

    /// Page width in points
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Full-page polygon
    pub polygon: Polygon,

    /// Top-level region ids in reading order
    pub structure: Vec<BlockId>,

    /// How the page's text was obtained
    pub text_extraction_method: SourceMethod,

    /// Backing raster, used for image crops
    #[serde(skip)]
    pub image: Option<DynamicImage>,

    blocks: Vec<Block>,
    replaced: Vec<BlockId>,
}

impl Page {
    /// Create an empty page of the given size in points.
    pub fn new(index: u32, width: f32, height: f32) -> Result<Self> {
        let polygon = Polygon::from_bbox([0.0, 0.0, width, height])?;
        Ok(Self {
            index,
            width,
            height,
            polygon,
            structure: Vec::new(),
            text_extraction_method: SourceMethod::Vector,
            image: None,
            blocks: Vec::new(),
            replaced: Vec::new(),
        })
    }

    /// Attach the page raster.
    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Address of this page node.
    pub fn id(&self) -> BlockId {
        BlockId::page(self.index)
    }

    /// Page dimensions as (width, height).
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Page area in square points.
    pub fn area(&self) -> f32 {
        self.polygon.area()
    }

    /// Allocate a block with default content without attaching it anywhere.
    pub fn allocate_block(&mut self, block_type: BlockType, polygon: Polygon) -> Result<BlockId> {
        self.allocate(
            block_type,
            polygon,
            BlockContent::for_type(block_type),
            SourceMethod::default(),
        )
    }

    /// Allocate the next ordinal in the arena. The block starts unattached.
    pub fn allocate(
        &mut self,
        block_type: BlockType,
        polygon: Polygon,
        content: BlockContent,
        source: SourceMethod,
    ) -> Result<BlockId> {
        if block_type == BlockType::Page {
            return Err(Error::Address(format!(
                "page {} cannot allocate a nested page block",
                self.index
            )));
        }

        let id = BlockId::new(self.index, block_type, self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            polygon,
            structure: Vec::new(),
            ignore_for_output: false,
            source,
            content,
        });
        Ok(id)
    }

    /// Allocate a block at page scope: it is appended to the page structure.
    pub fn add_block(&mut self, block_type: BlockType, polygon: Polygon) -> Result<BlockId> {
        let id = self.allocate_block(block_type, polygon)?;
        self.structure.push(id);
        Ok(id)
    }

    /// Look up a block by id. Ids from other pages never resolve.
    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        if id.page != self.index {
            return None;
        }
        self.blocks
            .get(id.ordinal as usize)
            .filter(|block| block.id == id)
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        if id.page != self.index {
            return None;
        }
        self.blocks
            .get_mut(id.ordinal as usize)
            .filter(|block| block.id == id)
    }

    /// Check whether `id` names this page or a block in its arena.
    pub fn contains(&self, id: BlockId) -> bool {
        id == self.id() || self.get_block(id).is_some()
    }

    /// All allocated blocks, attached or not, in allocation order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Number of allocated blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Structure list of a block, or of the page when `id` is the page id.
    pub fn children(&self, id: BlockId) -> &[BlockId] {
        if id == self.id() {
            return &self.structure;
        }
        self.get_block(id)
            .map(|block| block.structure.as_slice())
            .unwrap_or(&[])
    }

    /// Append `child` to `parent`'s structure.
    ///
    /// An unknown or cross-page id is logged and leaves the parent untouched.
    pub fn add_structure(&mut self, parent: BlockId, child: BlockId) -> Result<()> {
        if self.get_block(child).is_none() {
            let err = Error::Address(format!(
                "child {} does not resolve on page {}",
                child, self.index
            ));
            log::warn!("Dropping structure reference: {}", err);
            return Err(err);
        }

        if parent == self.id() {
            self.structure.push(child);
            return Ok(());
        }

        match self.get_block_mut(parent) {
            Some(block) => {
                block.structure.push(child);
                Ok(())
            }
            None => {
                let err = Error::Address(format!(
                    "parent {} does not resolve on page {}",
                    parent, self.index
                ));
                log::warn!("Dropping structure reference: {}", err);
                Err(err)
            }
        }
    }

    /// Rewrite the entry for `old` in `parent`'s structure to `new`.
    ///
    /// `old` stays allocated but is no longer reachable from the tree.
    pub fn replace_block(&mut self, parent: BlockId, old: BlockId, new: BlockId) -> Result<()> {
        if self.get_block(new).is_none() {
            return Err(Error::Address(format!(
                "replacement {} does not resolve on page {}",
                new, self.index
            )));
        }

        let index = self.index;
        let structure = if parent == self.id() {
            &mut self.structure
        } else {
            match self.get_block_mut(parent) {
                Some(block) => &mut block.structure,
                None => {
                    return Err(Error::Address(format!(
                        "parent {} does not resolve on page {}",
                        parent, index
                    )))
                }
            }
        };

        let slot = structure
            .iter_mut()
            .find(|entry| **entry == old)
            .ok_or_else(|| Error::Address(format!("{} is not a child of {}", old, parent)))?;
        *slot = new;
        self.replaced.push(old);
        Ok(())
    }

    /// Current lifecycle state of a block, `None` if it does not resolve.
    pub fn block_state(&self, id: BlockId) -> Option<BlockState> {
        self.get_block(id)?;
        if self.replaced.contains(&id) {
            return Some(BlockState::Replaced);
        }
        let attached = self.structure.contains(&id)
            || self.blocks.iter().any(|block| block.structure.contains(&id));
        Some(if attached {
            BlockState::Attached
        } else {
            BlockState::Unattached
        })
    }

    /// Depth-first list of blocks under `parent` whose type is in `types`
    /// (every type when `types` is empty).
    pub fn contained_blocks(&self, parent: BlockId, types: &[BlockType]) -> Vec<BlockId> {
        let mut found = Vec::new();
        let mut stack: Vec<BlockId> = self.children(parent).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if types.is_empty() || types.contains(&id.block_type) {
                found.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        found
    }

    /// Plain text under a block: span text, one line per `Line`.
    pub fn raw_text(&self, id: BlockId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: BlockId, out: &mut String) {
        if let Some(span) = self.get_block(id).and_then(Block::span) {
            out.push_str(&span.text);
            return;
        }
        for child in self.children(id) {
            if child.block_type == BlockType::Char {
                continue;
            }
            self.collect_text(*child, out);
        }
        if id.block_type == BlockType::Line && !out.ends_with('\n') {
            out.push('\n');
        }
    }
}

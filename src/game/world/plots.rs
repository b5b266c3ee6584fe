//! Per-block bookkeeping of reserved ground rectangles

use std::collections::HashMap;

use serde::Serialize;

/// Block cell coordinates `(ix, iz)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockKey {
    pub ix: usize,
    pub iz: usize,
}

impl BlockKey {
    pub fn new(ix: usize, iz: usize) -> Self {
        Self { ix, iz }
    }
}

/// Axis-aligned ground rectangle. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotRect {
    pub x0: f32,
    pub x1: f32,
    pub z0: f32,
    pub z1: f32,
}

impl PlotRect {
    /// Rectangle of size `w x d` centred at `(cx, cz)`
    pub fn centered(cx: f32, cz: f32, w: f32, d: f32) -> Self {
        Self {
            x0: cx - w * 0.5,
            x1: cx + w * 0.5,
            z0: cz - d * 0.5,
            z1: cz + d * 0.5,
        }
    }

    /// Touching edges count as overlap
    pub fn overlaps(&self, other: &PlotRect) -> bool {
        !(self.x1 < other.x0 || self.x0 > other.x1 || self.z1 < other.z0 || self.z0 > other.z1)
    }
}

/// Reserved rectangles per block. Rectangles within one block never overlap.
#[derive(Debug, Default, Clone)]
pub struct PlotRegistry {
    blocks: HashMap<BlockKey, Vec<PlotRect>>,
}

impl PlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `rect` in `key`. Returns false, leaving the registry unchanged,
    /// when it overlaps a rectangle already reserved in that block.
    pub fn reserve(&mut self, key: BlockKey, rect: PlotRect) -> bool {
        let entry = self.blocks.entry(key).or_default();
        if entry.iter().any(|other| rect.overlaps(other)) {
            return false;
        }
        entry.push(rect);
        true
    }

    /// Reserve a `w x d` area centred at `(cx, cz)`
    pub fn register_area(&mut self, key: BlockKey, cx: f32, cz: f32, w: f32, d: f32) -> bool {
        self.reserve(key, PlotRect::centered(cx, cz, w, d))
    }

    pub fn rects(&self, key: BlockKey) -> &[PlotRect] {
        self.blocks.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&BlockKey, &Vec<PlotRect>)> {
        self.blocks.iter()
    }

    pub fn total_rects(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }
}

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math;

/// Physical wiring order of the LED strip behind a pixel grid.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// LED index equals vertex index.
    HorizontalLines,
    /// Rows alternate direction: even rows left to right, odd rows right to left.
    HorizontalLinesZigZag,
    /// Column serpentine folded at the half width.
    VerticalLinesZigZagMirrored,
    /// Column serpentine repeated per stacked panel, columns visited right to left.
    VerticalPanelsZigZag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalParams {
    pub arc_length: f32,
    /// `<= 0` selects a flat panel.
    pub radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelCounts {
    pub horizontal: usize,
    /// Rows per panel.
    pub vertical: usize,
    pub panels: usize,
}

impl PixelCounts {
    pub fn grid(horizontal: usize, vertical: usize) -> Self {
        Self {
            horizontal,
            vertical,
            panels: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGeometry {
    pub physical: PhysicalParams,
    pub counts: PixelCounts,
}

impl PixelGeometry {
    pub fn rows(&self) -> usize {
        self.counts.vertical * self.counts.panels
    }

    pub fn total_pixels(&self) -> usize {
        self.counts.horizontal * self.rows()
    }

    /// Three channels (RGB) per pixel.
    pub fn channel_count(&self) -> usize {
        self.total_pixels() * 3
    }

    pub fn is_cylindrical(&self) -> bool {
        self.physical.radius > 0.0
    }
}

/// Maps a row-major vertex index to the LED position on the strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedIndexTable(Vec<usize>);

impl LedIndexTable {
    pub fn new(table: Vec<usize>) -> Self {
        Self(table)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn led_for_vertex(&self, vertex: usize) -> Option<usize> {
        self.0.get(vertex).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// True when every LED index in `[0, len)` appears exactly once.
    pub fn is_bijective(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        for &led in &self.0 {
            match seen.get_mut(led) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Interaction volume centred on the fixture origin. `height` is the full
/// tip-to-tip length including both hemispherical caps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub radius: f32,
    pub height: f32,
    pub axis: Vec3,
}

impl Capsule {
    pub fn contains(&self, point: Vec3, tolerance: f32) -> bool {
        let half = (self.height * 0.5 - self.radius).max(0.0);
        let axis = self.axis.normalize_or_zero();
        math::distance_to_segment(axis * -half, axis * half, point) <= self.radius + tolerance
    }
}

/// Output of the geometry builder.
#[derive(Debug, Clone)]
pub struct BuiltGeometry {
    pub geometry: PixelGeometry,
    pub vertices: Vec<PixelVertex>,
    pub led_table: LedIndexTable,
    pub bounds: Capsule,
}

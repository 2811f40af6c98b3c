use glam::Vec3;
use serde::{Deserialize, Serialize};

/// 8-bit RGBA pixel colour.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Linear blend toward `target`. `t` is clamped to [0, 1] and each
    /// channel truncates toward zero, so fading toward black never rounds up.
    pub fn lerp(self, target: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |from: u8, to: u8| (from as f32 + (to as f32 - from as f32) * t) as u8;
        Self {
            r: mix(self.r, target.r),
            g: mix(self.g, target.g),
            b: mix(self.b, target.b),
            a: mix(self.a, target.a),
        }
    }

    /// Per-channel saturating maximum; alpha is kept.
    pub fn max_blend(self, incoming: Self) -> Self {
        Self {
            r: self.r.max(incoming.r),
            g: self.g.max(incoming.g),
            b: self.b.max(incoming.b),
            a: self.a,
        }
    }

    pub fn to_rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// One interaction source for the current frame: a world-space line
/// segment (e.g. a blade from hilt to tip) and the colour it paints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Color32,
}

impl PaintSegment {
    pub fn new(start: Vec3, end: Vec3, color: Color32) -> Self {
        Self { start, end, color }
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Affine3A, Vec3};

use crate::fixtures::models::{BuiltGeometry, Capsule, LedIndexTable, PixelGeometry, PixelVertex};
use crate::math;
use crate::models::{Color32, PaintSegment};

/// Channel bytes written by the frame tick and read by the publish loop.
pub type SharedChannels = Arc<Mutex<Vec<u8>>>;

pub fn lock_channels(channels: &SharedChannels) -> MutexGuard<'_, Vec<u8>> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live fixture: geometry, paint state and the RGB channel buffer that
/// feeds its universe.
#[derive(Debug)]
pub struct FixtureInstance {
    name: String,
    geometry: PixelGeometry,
    vertices: Vec<PixelVertex>,
    led_table: LedIndexTable,
    bounds: Capsule,
    runtime_colors: Vec<Color32>,
    channels: SharedChannels,
    local_transform: Affine3A,
    world_transform: Affine3A,
    visible: bool,
}

impl FixtureInstance {
    pub fn new(name: impl Into<String>, built: BuiltGeometry) -> Self {
        let BuiltGeometry {
            geometry,
            vertices,
            led_table,
            bounds,
        } = built;
        let pixel_count = vertices.len();
        Self {
            name: name.into(),
            geometry,
            vertices,
            led_table,
            bounds,
            runtime_colors: vec![Color32::BLACK; pixel_count],
            channels: Arc::new(Mutex::new(vec![0; pixel_count * 3])),
            local_transform: Affine3A::IDENTITY,
            world_transform: Affine3A::IDENTITY,
            visible: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &PixelGeometry {
        &self.geometry
    }

    pub fn vertices(&self) -> &[PixelVertex] {
        &self.vertices
    }

    pub fn led_table(&self) -> &LedIndexTable {
        &self.led_table
    }

    pub fn bounds(&self) -> &Capsule {
        &self.bounds
    }

    pub fn colors(&self) -> &[Color32] {
        &self.runtime_colors
    }

    pub fn channel_count(&self) -> usize {
        self.runtime_colors.len() * 3
    }

    pub fn channels(&self) -> SharedChannels {
        Arc::clone(&self.channels)
    }

    pub fn channel_snapshot(&self) -> Vec<u8> {
        lock_channels(&self.channels).clone()
    }

    /// Fades every pixel toward black by `clamp01(decay_rate * dt)` and
    /// refreshes the channel buffer through the LED table.
    pub fn tick(&mut self, dt: f32, decay_rate: f32) {
        let t = (decay_rate * dt).clamp(0.0, 1.0);
        let mut channels = lock_channels(&self.channels);

        for (vertex, color) in self.runtime_colors.iter_mut().enumerate() {
            *color = color.lerp(Color32::BLACK, t);

            let Some(led) = self.led_table.led_for_vertex(vertex) else {
                continue;
            };
            if let Some(slot) = channels.get_mut(led * 3..led * 3 + 3) {
                slot.copy_from_slice(&color.to_rgb());
            }
        }
    }

    /// Max-blends `color` into every pixel within `radius` of the local
    /// segment. Only the colour state changes; channels follow on the next
    /// `tick`. Returns the number of pixels hit.
    pub fn paint(&mut self, start: Vec3, end: Vec3, radius: f32, color: Color32) -> usize {
        let mut hits = 0;
        for (vertex, current) in self.vertices.iter().zip(self.runtime_colors.iter_mut()) {
            if math::is_point_within_radius_of_segment(start, end, radius, vertex.position) {
                *current = current.max_blend(color);
                hits += 1;
            }
        }
        hits
    }

    pub fn paint_world(&mut self, segment: &PaintSegment, radius: f32) -> usize {
        let to_local = self.world_transform.inverse();
        let start = to_local.transform_point3(segment.start);
        let end = to_local.transform_point3(segment.end);
        self.paint(start, end, radius, segment.color)
    }

    pub fn local_transform(&self) -> Affine3A {
        self.local_transform
    }

    pub fn set_local_transform(&mut self, transform: Affine3A) {
        self.local_transform = transform;
    }

    pub fn world_transform(&self) -> Affine3A {
        self.world_transform
    }

    /// Recomputes the world transform below `parent` (room origin times scene root).
    pub fn update_world(&mut self, parent: Affine3A) {
        self.world_transform = parent * self.local_transform;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

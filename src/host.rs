use glam::{Affine3A, Quat, Vec3};

use crate::models::PaintSegment;

/// World pose of the tracked play space. Scenes hang below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomOrigin {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for RoomOrigin {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl RoomOrigin {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.position)
    }
}

/// Lifecycle and per-frame events coming from the host engine.
pub trait HostHooks {
    fn on_scene_activated(&mut self, room_origin: RoomOrigin);

    fn on_scene_deactivated(&mut self);

    fn on_room_origin_changed(&mut self, room_origin: RoomOrigin);

    /// `segment` is in world space and already known by the host to
    /// overlap `fixture_name`'s bounds. Returns the number of pixels painted.
    fn on_interaction_overlap(&mut self, fixture_name: &str, segment: &PaintSegment) -> usize;

    fn on_frame(&mut self, dt: f32);
}

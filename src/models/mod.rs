pub mod color;
pub mod scene;

pub use color::{Color32, PaintSegment};
pub use scene::{
    DmxTransform, FixtureDefinition, FixtureKind, GridDefinition, GridGeometry, LanternDefinition,
    LanternGeometry, OutputTarget, SceneDefinition, SceneDocument,
};

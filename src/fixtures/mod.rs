pub mod engine;
pub mod layout;
pub mod models;

pub use engine::{FixtureInstance, SharedChannels};
pub use layout::{build_geometry, build_grid, build_lantern, build_led_index_table};
pub use models::{BuiltGeometry, Capsule, LedIndexTable, PhysicalParams, PixelCounts, PixelGeometry, PixelLayout};

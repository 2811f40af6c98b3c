use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DmxError, DmxResult};
use crate::fixtures::models::PixelLayout;

const MIN_UNIVERSE: u16 = 1;
const MAX_UNIVERSE: u16 = e131::MAX_DATA_UNIVERSE;

fn default_start_channel() -> u16 {
    1
}

fn default_visible() -> bool {
    true
}

/// Position in meters plus a rotation about +Y in degrees.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct DmxTransform {
    pub x_pos_meters: f32,
    pub y_pos_meters: f32,
    pub z_pos_meters: f32,
    pub y_rotation_angle: f32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LanternGeometry {
    pub physical_radius_meters: f32,
    #[serde(rename = "PhysicalHightMeters", alias = "PhysicalHeightMeters")]
    pub physical_height_meters: f32,
    pub horizontal_panel_pixel_count: u32,
    pub vertical_panel_pixel_count: u32,
    pub panel_count: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GridGeometry {
    pub layout: PixelLayout,
    pub physical_arc_length_meters: f32,
    #[serde(default)]
    pub physical_radius_meters: f32,
    #[serde(rename = "PhysicalHightMeters", alias = "PhysicalHeightMeters")]
    pub physical_height_meters: f32,
    pub horizontal_pixel_count: u32,
    pub vertical_pixel_count: u32,
}

/// `LanternDefinitions[]` entry as stored on disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LanternDefinition {
    pub name: String,
    #[serde(rename = "DeviceIP", default)]
    pub device_ip: String,
    pub start_universe: u16,
    #[serde(default = "default_start_channel")]
    pub start_channel: u16,
    #[serde(default)]
    pub use_multicast: bool,
    pub transform: DmxTransform,
    #[serde(flatten)]
    pub geometry: LanternGeometry,
}

/// `GridDefinitions[]` entry as stored on disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GridDefinition {
    pub name: String,
    #[serde(rename = "DeviceIP", default)]
    pub device_ip: String,
    pub start_universe: u16,
    #[serde(default = "default_start_channel")]
    pub start_channel: u16,
    #[serde(default)]
    pub use_multicast: bool,
    pub transform: DmxTransform,
    #[serde(flatten)]
    pub geometry: GridGeometry,
}

/// Whole scene file. Used for writing; reading goes entry by entry
/// (see `scene::parser`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SceneDocument {
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub scene_transform: DmxTransform,
    #[serde(default)]
    pub lantern_definitions: Vec<LanternDefinition>,
    #[serde(default)]
    pub grid_definitions: Vec<GridDefinition>,
}

/// Where a fixture's universes are sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputTarget {
    Unicast(String),
    Multicast,
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicast(host) => write!(f, "{}", host),
            Self::Multicast => write!(f, "multicast"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FixtureKind {
    Lantern(LanternGeometry),
    Grid(GridGeometry),
}

impl FixtureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lantern(_) => "lantern",
            Self::Grid(_) => "grid",
        }
    }
}

/// Validated fixture entry. `name` is the identity key within a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct FixtureDefinition {
    pub name: String,
    pub kind: FixtureKind,
    pub transform: DmxTransform,
    pub target: OutputTarget,
    pub universe: u16,
    pub start_channel: u16,
}

impl FixtureDefinition {
    fn validated(
        name: String,
        kind: FixtureKind,
        transform: DmxTransform,
        device_ip: String,
        use_multicast: bool,
        universe: u16,
        start_channel: u16,
    ) -> DmxResult<Self> {
        if name.trim().is_empty() {
            return Err(DmxError::configuration("fixture name is empty"));
        }
        if !(MIN_UNIVERSE..=MAX_UNIVERSE).contains(&universe) {
            return Err(DmxError::configuration(format!(
                "fixture '{}': universe {} outside {}..={}",
                name, universe, MIN_UNIVERSE, MAX_UNIVERSE
            )));
        }
        let target = if use_multicast {
            OutputTarget::Multicast
        } else {
            let host = device_ip.trim();
            if host.is_empty() {
                return Err(DmxError::configuration(format!(
                    "fixture '{}': no DeviceIP and multicast disabled",
                    name
                )));
            }
            OutputTarget::Unicast(host.to_string())
        };
        Ok(Self {
            name,
            kind,
            transform,
            target,
            universe,
            start_channel,
        })
    }

    pub fn from_lantern(def: LanternDefinition) -> DmxResult<Self> {
        Self::validated(
            def.name,
            FixtureKind::Lantern(def.geometry),
            def.transform,
            def.device_ip,
            def.use_multicast,
            def.start_universe,
            def.start_channel,
        )
    }

    pub fn from_grid(def: GridDefinition) -> DmxResult<Self> {
        Self::validated(
            def.name,
            FixtureKind::Grid(def.geometry),
            def.transform,
            def.device_ip,
            def.use_multicast,
            def.start_universe,
            def.start_channel,
        )
    }

    fn device_ip(&self) -> (String, bool) {
        match &self.target {
            OutputTarget::Unicast(host) => (host.clone(), false),
            OutputTarget::Multicast => (String::new(), true),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneDefinition {
    pub is_visible: bool,
    pub scene_transform: DmxTransform,
    pub fixtures: Vec<FixtureDefinition>,
}

impl Default for SceneDefinition {
    fn default() -> Self {
        Self {
            is_visible: true,
            scene_transform: DmxTransform::default(),
            fixtures: Vec::new(),
        }
    }
}

impl SceneDefinition {
    pub fn fixture(&self, name: &str) -> Option<&FixtureDefinition> {
        self.fixtures.iter().find(|f| f.name == name)
    }

    pub fn to_document(&self) -> SceneDocument {
        let mut doc = SceneDocument {
            is_visible: self.is_visible,
            scene_transform: self.scene_transform,
            ..Default::default()
        };
        for fixture in &self.fixtures {
            let (device_ip, use_multicast) = fixture.device_ip();
            match fixture.kind {
                FixtureKind::Lantern(geometry) => doc.lantern_definitions.push(LanternDefinition {
                    name: fixture.name.clone(),
                    device_ip,
                    start_universe: fixture.universe,
                    start_channel: fixture.start_channel,
                    use_multicast,
                    transform: fixture.transform,
                    geometry,
                }),
                FixtureKind::Grid(geometry) => doc.grid_definitions.push(GridDefinition {
                    name: fixture.name.clone(),
                    device_ip,
                    start_universe: fixture.universe,
                    start_channel: fixture.start_channel,
                    use_multicast,
                    transform: fixture.transform,
                    geometry,
                }),
            }
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_json() -> serde_json::Value {
        serde_json::json!({
            "Name": "Wall",
            "DeviceIP": "10.0.0.12",
            "StartUniverse": 3,
            "Transform": { "XPosMeters": 1.0, "YRotationAngle": 90.0 },
            "Layout": "HorizontalLinesZigZag",
            "PhysicalArcLengthMeters": 0.5,
            "PhysicalHightMeters": 0.25,
            "HorizontalPixelCount": 8,
            "VerticalPixelCount": 4
        })
    }

    #[test]
    fn grid_definition_decodes_with_defaults() {
        let def: GridDefinition = serde_json::from_value(grid_json()).unwrap();
        assert_eq!(def.start_channel, 1);
        assert!(!def.use_multicast);
        assert_eq!(def.geometry.physical_radius_meters, 0.0);
        assert_eq!(def.geometry.layout, PixelLayout::HorizontalLinesZigZag);
        assert_eq!(def.transform.x_pos_meters, 1.0);
        assert_eq!(def.transform.z_pos_meters, 0.0);

        let fixture = FixtureDefinition::from_grid(def).unwrap();
        assert_eq!(fixture.target, OutputTarget::Unicast("10.0.0.12".into()));
        assert_eq!(fixture.universe, 3);
    }

    #[test]
    fn height_alias_is_accepted() {
        let mut v = grid_json();
        let obj = v.as_object_mut().unwrap();
        obj.remove("PhysicalHightMeters");
        obj.insert("PhysicalHeightMeters".into(), serde_json::json!(0.75));
        let def: GridDefinition = serde_json::from_value(v).unwrap();
        assert_eq!(def.geometry.physical_height_meters, 0.75);
    }

    #[test]
    fn invalid_targets_are_rejected() {
        let mut def: GridDefinition = serde_json::from_value(grid_json()).unwrap();
        def.start_universe = 0;
        assert!(FixtureDefinition::from_grid(def.clone())
            .unwrap_err()
            .is_configuration());

        def.start_universe = 64000;
        assert!(FixtureDefinition::from_grid(def.clone()).is_err());

        def.start_universe = 1;
        def.device_ip = "  ".into();
        assert!(FixtureDefinition::from_grid(def.clone()).is_err());

        def.use_multicast = true;
        let fixture = FixtureDefinition::from_grid(def).unwrap();
        assert_eq!(fixture.target, OutputTarget::Multicast);
    }

    #[test]
    fn document_round_trips_through_definition() {
        let def: GridDefinition = serde_json::from_value(grid_json()).unwrap();
        let scene = SceneDefinition {
            is_visible: false,
            scene_transform: DmxTransform {
                y_pos_meters: 2.0,
                ..Default::default()
            },
            fixtures: vec![FixtureDefinition::from_grid(def.clone()).unwrap()],
        };
        let doc = scene.to_document();
        assert!(!doc.is_visible);
        assert!(doc.lantern_definitions.is_empty());
        assert_eq!(doc.grid_definitions, vec![def]);
    }
}

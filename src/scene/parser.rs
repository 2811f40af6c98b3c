use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DmxError, DmxResult};
use crate::models::{
    DmxTransform, FixtureDefinition, GridDefinition, LanternDefinition, SceneDefinition,
};

/// Parses a scene document. Fixture entries are decoded one at a time: a
/// bad entry is logged and skipped, the rest of the scene still loads.
pub fn parse_scene(text: &str) -> DmxResult<SceneDefinition> {
    let doc: Value = serde_json::from_str(text)
        .map_err(|e| DmxError::configuration(format!("malformed scene document: {}", e)))?;
    let Value::Object(doc) = doc else {
        return Err(DmxError::configuration("scene document is not an object"));
    };

    let is_visible = field_or_default(doc.get("IsVisible"), "IsVisible", true);
    let scene_transform =
        field_or_default(doc.get("SceneTransform"), "SceneTransform", DmxTransform::default());

    let mut fixtures = Vec::new();
    let mut names = HashSet::new();

    let lanterns = entries::<LanternDefinition>(doc.get("LanternDefinitions"), "LanternDefinitions");
    let grids = entries::<GridDefinition>(doc.get("GridDefinitions"), "GridDefinitions");
    let validated = lanterns
        .into_iter()
        .map(|(i, def)| (i, "lantern", FixtureDefinition::from_lantern(def)))
        .chain(
            grids
                .into_iter()
                .map(|(i, def)| (i, "grid", FixtureDefinition::from_grid(def))),
        );

    for (index, kind, result) in validated {
        match result {
            Ok(fixture) => {
                if names.insert(fixture.name.clone()) {
                    fixtures.push(fixture);
                } else {
                    log::warn!(
                        "[scene] Skipping {} #{}: duplicate name '{}'",
                        kind,
                        index,
                        fixture.name
                    );
                }
            }
            Err(e) => log::warn!("[scene] Skipping {} #{}: {}", kind, index, e),
        }
    }

    Ok(SceneDefinition {
        is_visible,
        scene_transform,
        fixtures,
    })
}

fn field_or_default<T: DeserializeOwned>(value: Option<&Value>, key: &str, default: T) -> T {
    match value {
        None | Some(Value::Null) => default,
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            log::warn!("[scene] Invalid {}: {}", key, e);
            default
        }),
    }
}

fn entries<T: DeserializeOwned>(value: Option<&Value>, key: &str) -> Vec<(usize, T)> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            log::warn!("[scene] {} is not a list", key);
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
            Ok(def) => Some((index, def)),
            Err(e) => {
                log::warn!("[scene] Skipping {} #{}: {}", key, index, e);
                None
            }
        })
        .collect()
}

pub fn load_scene_file(path: impl AsRef<Path>) -> DmxResult<SceneDefinition> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(DmxError::configuration("no scene file configured"));
    }
    if !path.is_file() {
        return Err(DmxError::configuration(format!(
            "scene file {} not found",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    parse_scene(&text)
}

pub fn save_scene_file(path: impl AsRef<Path>, scene: &SceneDefinition) -> DmxResult<()> {
    let text = serde_json::to_string_pretty(&scene.to_document())
        .map_err(|e| DmxError::configuration(format!("failed to encode scene: {}", e)))?;
    std::fs::write(path, text)?;
    Ok(())
}

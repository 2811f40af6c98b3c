use std::collections::BTreeSet;
use std::sync::Arc;

use dmx_paint::fixtures::PixelLayout;
use dmx_paint::models::{
    DmxTransform, FixtureDefinition, FixtureKind, GridGeometry, LanternGeometry, OutputTarget,
    SceneDefinition,
};
use dmx_paint::output::{DmxOutput, RecordingTransport};
use dmx_paint::scene::{load_scene_file, save_scene_file, SceneInstance};
use dmx_paint::settings::OutputSettings;
use dmx_paint::RoomOrigin;

const NAMES: [&str; 5] = ["north", "south", "east", "west", "ceiling"];

fn definition(name: &str, universe: u16) -> FixtureDefinition {
    let kind = if name == "ceiling" {
        FixtureKind::Lantern(LanternGeometry {
            physical_radius_meters: 0.1,
            physical_height_meters: 0.4,
            horizontal_panel_pixel_count: 4,
            vertical_panel_pixel_count: 3,
            panel_count: 2,
        })
    } else {
        FixtureKind::Grid(GridGeometry {
            layout: PixelLayout::VerticalLinesZigZagMirrored,
            physical_arc_length_meters: 0.5,
            physical_radius_meters: 0.0,
            physical_height_meters: 0.5,
            horizontal_pixel_count: 4,
            vertical_pixel_count: 4,
        })
    };
    FixtureDefinition {
        name: name.to_string(),
        kind,
        transform: DmxTransform::default(),
        target: OutputTarget::Unicast("10.1.1.1".into()),
        universe,
        start_channel: 1,
    }
}

fn scene_from_mask(mask: u32) -> SceneDefinition {
    SceneDefinition {
        fixtures: NAMES
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(i, name)| definition(name, 1 + i as u16))
            .collect(),
        ..Default::default()
    }
}

fn names(scene: &SceneDefinition) -> BTreeSet<String> {
    scene.fixtures.iter().map(|f| f.name.clone()).collect()
}

fn output() -> Arc<DmxOutput> {
    Arc::new(DmxOutput::new(
        Arc::new(RecordingTransport::new()),
        OutputSettings::default(),
    ))
}

#[test]
fn patch_spawns_and_disposes_exactly_the_set_difference() {
    for m1 in 0..32 {
        for m2 in 0..32 {
            let s1 = scene_from_mask(m1);
            let s2 = scene_from_mask(m2);
            let (n1, n2) = (names(&s1), names(&s2));

            let (mut live, _) = SceneInstance::initialize(output(), RoomOrigin::default(), &s1);
            let report = live.patch(&s2);

            let spawned: BTreeSet<String> = report.spawned.iter().cloned().collect();
            let disposed: BTreeSet<String> = report.disposed.iter().cloned().collect();
            let patched: BTreeSet<String> = report.patched.iter().cloned().collect();
            assert_eq!(spawned, n2.difference(&n1).cloned().collect());
            assert_eq!(disposed, n1.difference(&n2).cloned().collect());
            assert_eq!(patched, n1.intersection(&n2).cloned().collect());
            assert_eq!(live.fixture_names().into_iter().collect::<BTreeSet<_>>(), n2);

            // Same definition again: nothing spawned or disposed
            assert!(live.patch(&s2).is_noop());
        }
    }
}

#[test]
fn registry_follows_reconciliation() {
    let out = output();
    let (mut live, _) =
        SceneInstance::initialize(Arc::clone(&out), RoomOrigin::default(), &scene_from_mask(0b11111));
    let target = OutputTarget::Unicast("10.1.1.1".into());
    assert_eq!(
        out.controller(&target).unwrap().active_universe_ids(),
        vec![1, 2, 3, 4, 5]
    );

    live.patch(&scene_from_mask(0b00101));
    assert_eq!(out.controller(&target).unwrap().active_universe_ids(), vec![1, 3]);

    live.patch(&scene_from_mask(0));
    assert!(out.controller(&target).is_none());
    assert!(live.is_empty());
}

#[test]
fn partial_scene_file_skips_only_bad_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.json");
    save_scene_file(&path, &scene_from_mask(0b00011)).unwrap();

    let out = output();
    let (mut live, _) =
        SceneInstance::initialize(Arc::clone(&out), RoomOrigin::default(), &load_scene_file(&path).unwrap());
    assert_eq!(live.len(), 2);

    // Drop a required field from one entry and add a new valid one
    let text = std::fs::read_to_string(&path).unwrap();
    let mut doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let grids = doc["GridDefinitions"].as_array_mut().unwrap();
    grids[1].as_object_mut().unwrap().remove("StartUniverse");
    let mut extra = grids[0].clone();
    extra["Name"] = serde_json::json!("east");
    extra["StartUniverse"] = serde_json::json!(9);
    grids.push(extra);
    std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    let report = live.patch(&load_scene_file(&path).unwrap());
    assert_eq!(report.spawned, vec!["east"]);
    assert_eq!(report.patched, vec!["north"]);
    assert_eq!(report.disposed, vec!["south"]);
}

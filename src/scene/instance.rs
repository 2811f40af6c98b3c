use std::collections::HashSet;
use std::sync::Arc;

use glam::Affine3A;

use crate::error::DmxResult;
use crate::fixtures::engine::FixtureInstance;
use crate::fixtures::layout::{build_grid, build_lantern};
use crate::host::RoomOrigin;
use crate::math::transform_to_affine;
use crate::models::{DmxTransform, FixtureDefinition, FixtureKind, PaintSegment, SceneDefinition};
use crate::output::DmxOutput;

/// Names touched by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub spawned: Vec<String>,
    pub patched: Vec<String>,
    pub disposed: Vec<String>,
    /// New definitions whose geometry could not be built.
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.spawned.is_empty() && self.disposed.is_empty() && self.skipped.is_empty()
    }
}

struct LiveFixture {
    definition: FixtureDefinition,
    fixture: FixtureInstance,
    /// False when the universe had no room; the fixture still paints.
    registered: bool,
}

/// Live fixtures of one loaded scene, keyed by name, in definition order.
pub struct SceneInstance {
    output: Arc<DmxOutput>,
    room_origin: RoomOrigin,
    scene_transform: DmxTransform,
    is_visible: bool,
    fixtures: Vec<LiveFixture>,
}

impl SceneInstance {
    /// Spawns every fixture of `definition` below `room_origin`.
    pub fn initialize(
        output: Arc<DmxOutput>,
        room_origin: RoomOrigin,
        definition: &SceneDefinition,
    ) -> (Self, ReconcileReport) {
        let mut scene = Self {
            output,
            room_origin,
            scene_transform: definition.scene_transform,
            is_visible: definition.is_visible,
            fixtures: Vec::new(),
        };
        let report = scene.patch(definition);
        (scene, report)
    }

    /// Converges the live fixtures on `definition`: existing names are
    /// patched in place, new names spawned, missing names disposed.
    pub fn patch(&mut self, definition: &SceneDefinition) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        self.scene_transform = definition.scene_transform;
        self.is_visible = definition.is_visible;
        let root = self.root_transform();

        // Release channels before anything new claims them
        let wanted: HashSet<&str> = definition.fixtures.iter().map(|f| f.name.as_str()).collect();
        let (keep, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut self.fixtures)
            .into_iter()
            .partition(|live| wanted.contains(live.definition.name.as_str()));
        self.fixtures = keep;
        for live in gone {
            report.disposed.push(live.definition.name.clone());
            self.despawn(live);
        }

        let mut released = false;
        for def in &definition.fixtures {
            if let Some(index) = self.position(&def.name) {
                released |= patch_fixture(&self.output, &mut self.fixtures[index], def);
                report.patched.push(def.name.clone());
            } else {
                match self.spawn(def, root) {
                    Ok(live) => {
                        report.spawned.push(def.name.clone());
                        self.fixtures.push(live);
                    }
                    Err(e) => {
                        log::warn!("[scene] Failed to spawn {}: {}", def.name, e);
                        report.skipped.push(def.name.clone());
                    }
                }
            }
        }

        // A move later in the pass may have freed room for an earlier one
        if released {
            for live in self.fixtures.iter_mut().filter(|live| !live.registered) {
                live.registered = register(&self.output, &live.definition, &live.fixture);
            }
        }

        self.set_scene_visibility(definition.is_visible);
        self.refresh_world_transforms();
        self.output.prune_idle();
        report
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fixtures.iter().position(|f| f.definition.name == name)
    }

    fn spawn(&self, def: &FixtureDefinition, root: Affine3A) -> DmxResult<LiveFixture> {
        let built = match &def.kind {
            FixtureKind::Lantern(geometry) => build_lantern(geometry)?,
            FixtureKind::Grid(geometry) => build_grid(geometry)?,
        };

        let mut fixture = FixtureInstance::new(def.name.clone(), built);
        fixture.set_local_transform(transform_to_affine(&def.transform));
        fixture.set_visible(self.is_visible);
        fixture.update_world(root);

        let registered = register(&self.output, def, &fixture);
        log::info!(
            "[scene] Spawned {} {} ({} pixels, universe {} on {})",
            def.kind.label(),
            def.name,
            fixture.geometry().total_pixels(),
            def.universe,
            def.target
        );

        Ok(LiveFixture {
            definition: def.clone(),
            fixture,
            registered,
        })
    }

    fn despawn(&self, live: LiveFixture) {
        if live.registered {
            self.output
                .unregister_fixture(&live.definition.target, &live.definition.name);
        }
        log::info!("[scene] Despawned {}", live.definition.name);
    }

    /// Render flag only; paint and channel state are untouched.
    pub fn set_scene_visibility(&mut self, visible: bool) {
        self.is_visible = visible;
        for live in &mut self.fixtures {
            live.fixture.set_visible(visible);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn set_scene_transform(&mut self, transform: DmxTransform) {
        self.scene_transform = transform;
        self.refresh_world_transforms();
    }

    /// Re-anchors the scene root. Fixture-local transforms are preserved.
    pub fn on_room_origin_changed(&mut self, room_origin: RoomOrigin) {
        self.room_origin = room_origin;
        self.refresh_world_transforms();
    }

    pub fn room_origin(&self) -> RoomOrigin {
        self.room_origin
    }

    /// Room origin times scene transform.
    pub fn root_transform(&self) -> Affine3A {
        self.room_origin.to_affine() * transform_to_affine(&self.scene_transform)
    }

    fn refresh_world_transforms(&mut self) {
        let root = self.root_transform();
        for live in &mut self.fixtures {
            live.fixture.update_world(root);
        }
    }

    pub fn tick(&mut self, dt: f32, decay_rate: f32) {
        for live in &mut self.fixtures {
            live.fixture.tick(dt, decay_rate);
        }
    }

    /// Paints a world-space segment onto one fixture. Unknown names paint nothing.
    pub fn paint(&mut self, fixture_name: &str, segment: &PaintSegment, radius: f32) -> usize {
        match self.position(fixture_name) {
            Some(index) => self.fixtures[index].fixture.paint_world(segment, radius),
            None => 0,
        }
    }

    pub fn fixture(&self, name: &str) -> Option<&FixtureInstance> {
        self.fixtures
            .iter()
            .find(|f| f.definition.name == name)
            .map(|f| &f.fixture)
    }

    pub fn fixtures(&self) -> impl Iterator<Item = &FixtureInstance> {
        self.fixtures.iter().map(|f| &f.fixture)
    }

    pub fn definition(&self, name: &str) -> Option<&FixtureDefinition> {
        self.fixtures
            .iter()
            .find(|f| f.definition.name == name)
            .map(|f| &f.definition)
    }

    pub fn is_transmitted(&self, name: &str) -> bool {
        self.fixtures
            .iter()
            .any(|f| f.definition.name == name && f.registered)
    }

    pub fn fixture_names(&self) -> Vec<String> {
        self.fixtures.iter().map(|f| f.definition.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn output(&self) -> &Arc<DmxOutput> {
        &self.output
    }
}

impl Drop for SceneInstance {
    fn drop(&mut self) {
        for live in std::mem::take(&mut self.fixtures) {
            self.despawn(live);
        }
        self.output.prune_idle();
    }
}

fn register(output: &DmxOutput, def: &FixtureDefinition, fixture: &FixtureInstance) -> bool {
    match output.register_fixture(&def.target, def.universe, fixture) {
        Ok(offset) => {
            // StartChannel is 1-based; packing is contiguous regardless
            let requested = usize::from(def.start_channel.max(1)) - 1;
            if requested != offset {
                log::info!(
                    "[scene] {} packed at channel {} of universe {} (StartChannel {})",
                    def.name,
                    offset + 1,
                    def.universe,
                    def.start_channel
                );
            }
            true
        }
        Err(e) => {
            log::warn!("[scene] {} will not be transmitted: {}", def.name, e);
            false
        }
    }
}

/// Transform and network target only; geometry is kept as built.
/// Returns true when the fixture gave up channels it held.
fn patch_fixture(output: &DmxOutput, live: &mut LiveFixture, def: &FixtureDefinition) -> bool {
    if live.definition.kind != def.kind {
        log::info!(
            "[scene] Geometry change for {} ignored until it is respawned",
            def.name
        );
    }

    live.fixture.set_local_transform(transform_to_affine(&def.transform));

    let moved = live.definition.target != def.target || live.definition.universe != def.universe;
    let released = moved && live.registered;
    if released {
        output.unregister_fixture(&live.definition.target, &def.name);
        live.registered = false;
    }
    if !live.registered {
        live.registered = register(output, def, &live.fixture);
    }

    let kind = live.definition.kind;
    live.definition = FixtureDefinition {
        kind,
        ..def.clone()
    };
    released
}

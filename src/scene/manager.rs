use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DmxError, DmxResult};
use crate::host::{HostHooks, RoomOrigin};
use crate::models::PaintSegment;
use crate::output::{DmxOutput, Transport};
use crate::scene::instance::{ReconcileReport, SceneInstance};
use crate::scene::parser::load_scene_file;
use crate::scene::watcher::SceneFileWatcher;
use crate::settings::Settings;

static MANAGER_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide scene context. Only one may exist at a time; constructing
/// a second fails with `AlreadyActive` until the first is dropped.
pub struct SceneManager {
    settings: Settings,
    output: Arc<DmxOutput>,
    instance: Option<SceneInstance>,
    room_origin: RoomOrigin,
    watcher: Option<SceneFileWatcher>,
}

impl SceneManager {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>) -> DmxResult<Self> {
        if MANAGER_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DmxError::AlreadyActive);
        }

        let output = Arc::new(DmxOutput::new(transport, settings.output.clone()));
        let mut manager = Self {
            settings,
            output,
            instance: None,
            room_origin: RoomOrigin::default(),
            watcher: None,
        };
        manager.watch_scene_path();
        Ok(manager)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn output(&self) -> &Arc<DmxOutput> {
        &self.output
    }

    pub fn scene(&self) -> Option<&SceneInstance> {
        self.instance.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.instance.is_some()
    }

    fn watch_scene_path(&mut self) {
        self.watcher = None;
        if !self.settings.has_scene() {
            return;
        }
        match SceneFileWatcher::new(&self.settings.scene_file_path) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => log::warn!("[scene] Scene file will not be watched: {}", e),
        }
    }

    /// Replaces any loaded scene with the one on disk and starts output.
    pub fn load_scene(&mut self, room_origin: RoomOrigin) -> DmxResult<ReconcileReport> {
        self.unload_scene();
        self.room_origin = room_origin;

        let definition = load_scene_file(&self.settings.scene_file_path).map_err(|e| {
            log::warn!("[scene] Failed to load scene: {}", e);
            e
        })?;
        let (instance, report) =
            SceneInstance::initialize(Arc::clone(&self.output), room_origin, &definition);
        log::info!(
            "[scene] Loaded {} with {} fixtures",
            self.settings.scene_file_path,
            instance.len()
        );
        self.instance = Some(instance);
        self.output.start_idle();
        Ok(report)
    }

    pub fn unload_scene(&mut self) {
        if let Some(instance) = self.instance.take() {
            log::info!("[scene] Unloading scene ({} fixtures)", instance.len());
            drop(instance);
        }
        self.output.stop_all();
    }

    /// Re-reads the scene file and reconciles. An unreadable or malformed
    /// file leaves the live scene as it was. `Ok(None)` when nothing is loaded.
    pub fn patch_loaded_scene(&mut self) -> DmxResult<Option<ReconcileReport>> {
        let Some(instance) = self.instance.as_mut() else {
            return Ok(None);
        };
        let definition = load_scene_file(&self.settings.scene_file_path).map_err(|e| {
            log::warn!("[scene] Keeping current scene: {}", e);
            e
        })?;

        let report = instance.patch(&definition);
        log::info!(
            "[scene] Patched scene: {} spawned, {} patched, {} disposed",
            report.spawned.len(),
            report.patched.len(),
            report.disposed.len()
        );
        self.output.start_idle();
        Ok(Some(report))
    }

    /// Points the manager at another scene file and patches from it.
    pub fn try_update_scene_path(&mut self, path: impl Into<String>) -> DmxResult<Option<ReconcileReport>> {
        let path = path.into();
        if path == self.settings.scene_file_path {
            return Ok(None);
        }
        log::info!("[scene] Scene path changed to {}", path);
        self.settings.scene_file_path = path;
        self.watch_scene_path();
        self.patch_loaded_scene()
    }

    /// Takes new tunables. Output settings apply to targets opened from now on.
    pub fn apply_settings(&mut self, settings: Settings) -> DmxResult<Option<ReconcileReport>> {
        let path = settings.scene_file_path.clone();
        self.output.set_settings(settings.output.clone());
        self.settings = Settings {
            scene_file_path: std::mem::take(&mut self.settings.scene_file_path),
            ..settings
        };
        self.try_update_scene_path(path)
    }

    /// Patches once if the scene file changed since the last call.
    pub fn reload_if_dirty(&mut self) -> Option<ReconcileReport> {
        let dirty = self.watcher.as_ref().is_some_and(SceneFileWatcher::take_dirty);
        if !dirty {
            return None;
        }
        self.patch_loaded_scene().ok().flatten()
    }
}

impl HostHooks for SceneManager {
    fn on_scene_activated(&mut self, room_origin: RoomOrigin) {
        // Failure is logged by load_scene; the scene simply stays dark
        let _ = self.load_scene(room_origin);
    }

    fn on_scene_deactivated(&mut self) {
        self.unload_scene();
    }

    fn on_room_origin_changed(&mut self, room_origin: RoomOrigin) {
        self.room_origin = room_origin;
        if let Some(instance) = self.instance.as_mut() {
            instance.on_room_origin_changed(room_origin);
        }
    }

    fn on_interaction_overlap(&mut self, fixture_name: &str, segment: &PaintSegment) -> usize {
        let radius = self.settings.saber_paint_radius;
        self.instance
            .as_mut()
            .map_or(0, |instance| instance.paint(fixture_name, segment, radius))
    }

    fn on_frame(&mut self, dt: f32) {
        let decay_rate = self.settings.saber_paint_decay_rate;
        if let Some(instance) = self.instance.as_mut() {
            instance.tick(dt, decay_rate);
        }
    }
}

impl Drop for SceneManager {
    fn drop(&mut self) {
        self.unload_scene();
        MANAGER_ACTIVE.store(false, Ordering::SeqCst);
    }
}

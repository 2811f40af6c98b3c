use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{DmxError, DmxResult};

/// Watches the directory holding the scene file and raises a dirty flag
/// when the file itself changes. Watching the directory also catches
/// editors that save by rename.
pub struct SceneFileWatcher {
    path: PathBuf,
    dirty: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

fn is_scene_event(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|name| name == file_name.as_os_str()))
}

impl SceneFileWatcher {
    pub fn new(path: impl AsRef<Path>) -> DmxResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| DmxError::configuration(format!("{} is not a file path", path.display())))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let dirty = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dirty);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_scene_event(&event, &file_name) {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            Err(e) => log::warn!("[scene] Watch error: {}", e),
        })
        .map_err(|e| DmxError::configuration(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| DmxError::configuration(format!("failed to watch {}: {}", dir.display(), e)))?;
        log::debug!("[scene] Watching {}", path.display());

        Ok(Self {
            path,
            dirty,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns and clears the dirty flag, so a burst of events yields one reload.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};
    use std::time::Duration;

    #[test]
    fn only_scene_file_changes_count() {
        let name = OsString::from("scene.json");
        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/rig/scene.json"));
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/rig/scene.json"));
        let other = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/rig/notes.txt"));
        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/rig/scene.json"));

        assert!(is_scene_event(&modify, &name));
        assert!(is_scene_event(&create, &name));
        assert!(!is_scene_event(&other, &name));
        assert!(!is_scene_event(&access, &name));
    }

    #[test]
    fn dirty_flag_is_taken_once() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = SceneFileWatcher::new(dir.path().join("scene.json")).unwrap();
        assert!(!watcher.take_dirty());
        watcher.mark_dirty();
        assert!(watcher.take_dirty());
        assert!(!watcher.take_dirty());
    }

    #[test]
    fn writing_the_file_marks_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let watcher = SceneFileWatcher::new(&path).unwrap();
        std::fs::write(&path, "{}").unwrap();

        let mut seen = false;
        for _ in 0..50 {
            if watcher.take_dirty() {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        assert!(seen);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("scene.json");
        assert!(SceneFileWatcher::new(path).is_err());
    }
}

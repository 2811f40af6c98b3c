pub mod instance;
pub mod manager;
pub mod parser;
pub mod watcher;

pub use instance::{ReconcileReport, SceneInstance};
pub use manager::SceneManager;
pub use parser::{load_scene_file, parse_scene, save_scene_file};
pub use watcher::SceneFileWatcher;

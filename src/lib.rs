pub mod error;
pub mod fixtures;
pub mod host;
pub mod math;
pub mod models;
pub mod output;
pub mod scene;
pub mod settings;

pub use error::{DmxError, DmxResult};
pub use host::{HostHooks, RoomOrigin};
pub use scene::SceneManager;
pub use settings::Settings;

pub mod controller;
pub mod resolve;
pub mod sacn;
pub mod transport;
pub mod universe;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::error::DmxResult;
use crate::fixtures::engine::FixtureInstance;
pub use crate::models::OutputTarget;
use crate::settings::OutputSettings;

pub use controller::DmxController;
pub use sacn::E131Transport;
pub use transport::{Packet, PacketSender, RecordingTransport, Transport};
pub use universe::{UniverseRegistry, UNIVERSE_CHANNELS};

/// Routes fixtures to one `DmxController` per output target.
pub struct DmxOutput {
    transport: Arc<dyn Transport>,
    settings: Mutex<OutputSettings>,
    controllers: Mutex<BTreeMap<OutputTarget, Arc<DmxController>>>,
}

impl DmxOutput {
    pub fn new(transport: Arc<dyn Transport>, settings: OutputSettings) -> Self {
        Self {
            transport,
            settings: Mutex::new(settings),
            controllers: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock_controllers(&self) -> MutexGuard<'_, BTreeMap<OutputTarget, Arc<DmxController>>> {
        self.controllers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies to controllers created from now on.
    pub fn set_settings(&self, settings: OutputSettings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn register_fixture(
        &self,
        target: &OutputTarget,
        universe: u16,
        fixture: &FixtureInstance,
    ) -> DmxResult<usize> {
        let controller = {
            let mut controllers = self.lock_controllers();
            let controller = controllers.entry(target.clone()).or_insert_with(|| {
                let settings = self
                    .settings
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                Arc::new(DmxController::new(
                    target.clone(),
                    Arc::clone(&self.transport),
                    settings,
                ))
            });
            Arc::clone(controller)
        };
        controller.register_fixture(universe, fixture)
    }

    pub fn unregister_fixture(&self, target: &OutputTarget, name: &str) -> bool {
        self.controller(target)
            .map(|c| c.unregister_fixture(name))
            .unwrap_or(false)
    }

    pub fn controller(&self, target: &OutputTarget) -> Option<Arc<DmxController>> {
        self.lock_controllers().get(target).cloned()
    }

    pub fn controllers(&self) -> Vec<Arc<DmxController>> {
        self.lock_controllers().values().cloned().collect()
    }

    pub fn universe_buffer(&self, target: &OutputTarget, universe: u16) -> Option<Vec<u8>> {
        self.controller(target)?.universe_buffer(universe)
    }

    /// Spawns `start` for every controller with fixtures that is neither
    /// broadcasting nor already starting. Resolution runs off the caller's
    /// thread, so the frame loop never waits on it.
    pub fn start_idle(&self) -> Vec<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("[output] No async runtime, transmission not started");
            return Vec::new();
        };

        self.controllers()
            .into_iter()
            .filter(|c| !c.is_idle() && !c.is_broadcasting() && !c.is_starting())
            .map(|controller| {
                runtime.spawn(async move {
                    // Failures are already logged by the controller
                    let _ = controller.start().await;
                })
            })
            .collect()
    }

    /// Stops and drops controllers left without fixtures.
    pub fn prune_idle(&self) -> usize {
        let mut controllers = self.lock_controllers();
        let before = controllers.len();
        controllers.retain(|target, controller| {
            if controller.is_idle() {
                controller.stop();
                log::info!("[output] Dropped idle output {}", target);
                false
            } else {
                true
            }
        });
        before - controllers.len()
    }

    pub fn stop_all(&self) {
        let drained: Vec<_> = std::mem::take(&mut *self.lock_controllers())
            .into_values()
            .collect();
        for controller in drained {
            controller.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::layout::build_geometry;
    use crate::fixtures::models::{PhysicalParams, PixelCounts, PixelLayout};
    use std::time::Duration;

    fn fixture(name: &str) -> FixtureInstance {
        let built = build_geometry(
            PixelLayout::HorizontalLines,
            PhysicalParams {
                arc_length: 1.0,
                radius: 0.0,
                height: 1.0,
            },
            PixelCounts::grid(2, 2),
        )
        .unwrap();
        FixtureInstance::new(name, built)
    }

    fn output(transport: &RecordingTransport) -> DmxOutput {
        DmxOutput::new(Arc::new(transport.clone()), OutputSettings::default())
    }

    #[test]
    fn one_controller_per_target() {
        let output = output(&RecordingTransport::new());
        let host = OutputTarget::Unicast("10.0.0.1".into());
        let a = fixture("a");
        let b = fixture("b");
        let c = fixture("c");
        output.register_fixture(&host, 1, &a).unwrap();
        output.register_fixture(&host, 1, &b).unwrap();
        output.register_fixture(&OutputTarget::Multicast, 1, &c).unwrap();
        assert_eq!(output.controllers().len(), 2);
        assert_eq!(output.controller(&host).unwrap().fixture_count(), 2);
        assert_eq!(output.universe_buffer(&host, 1).unwrap().len(), 24);
    }

    #[test]
    fn prune_drops_only_idle_controllers() {
        let output = output(&RecordingTransport::new());
        let host = OutputTarget::Unicast("10.0.0.1".into());
        let a = fixture("a");
        let b = fixture("b");
        output.register_fixture(&host, 1, &a).unwrap();
        output.register_fixture(&OutputTarget::Multicast, 1, &b).unwrap();

        assert!(output.unregister_fixture(&host, "a"));
        assert_eq!(output.prune_idle(), 1);
        assert!(output.controller(&host).is_none());
        assert!(output.controller(&OutputTarget::Multicast).is_some());
    }

    #[test]
    fn start_without_runtime_is_a_no_op() {
        let output = output(&RecordingTransport::new());
        let a = fixture("a");
        output.register_fixture(&OutputTarget::Multicast, 1, &a).unwrap();
        assert!(output.start_idle().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_idle_then_stop_all() {
        let transport = RecordingTransport::new();
        let output = output(&transport);
        let a = fixture("a");
        output.register_fixture(&OutputTarget::Multicast, 5, &a).unwrap();

        for handle in output.start_idle() {
            handle.await.unwrap();
        }
        assert!(output.controller(&OutputTarget::Multicast).unwrap().is_broadcasting());
        // Already running, nothing new to start
        assert!(output.start_idle().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!transport.data_packets().is_empty());

        output.stop_all();
        assert!(output.controllers().is_empty());
        tokio::task::yield_now().await;
        transport.clear();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(transport.sent().is_empty());
    }
}

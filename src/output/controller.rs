use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{DmxError, DmxResult};
use crate::fixtures::engine::FixtureInstance;
use crate::models::OutputTarget;
use crate::output::resolve::resolve_host;
use crate::output::transport::{PacketSender, Transport};
use crate::output::universe::UniverseRegistry;
use crate::settings::OutputSettings;

type SharedRegistry = Arc<Mutex<UniverseRegistry>>;

fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, UniverseRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running discovery and publish loops. Dropping the session aborts both.
struct Session {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Counts one in-flight `start` until it exits, however it exits.
struct StartingGuard<'a>(&'a AtomicUsize);

impl<'a> StartingGuard<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Universe registry plus transmission schedule for one output target.
pub struct DmxController {
    target: OutputTarget,
    registry: SharedRegistry,
    transport: Arc<dyn Transport>,
    settings: OutputSettings,
    session: Mutex<Option<Session>>,
    generation: AtomicU64,
    starting: AtomicUsize,
}

impl DmxController {
    pub fn new(target: OutputTarget, transport: Arc<dyn Transport>, settings: OutputSettings) -> Self {
        Self {
            target,
            registry: Arc::new(Mutex::new(UniverseRegistry::new())),
            transport,
            settings,
            session: Mutex::new(None),
            generation: AtomicU64::new(0),
            starting: AtomicUsize::new(0),
        }
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn register_fixture(&self, universe: u16, fixture: &FixtureInstance) -> DmxResult<usize> {
        lock_registry(&self.registry).register_fixture(universe, fixture)
    }

    pub fn unregister_fixture(&self, name: &str) -> bool {
        lock_registry(&self.registry).unregister_fixture(name)
    }

    pub fn active_universe_ids(&self) -> Vec<u16> {
        lock_registry(&self.registry).active_universe_ids()
    }

    pub fn universe_buffer(&self, universe: u16) -> Option<Vec<u8>> {
        lock_registry(&self.registry).universe_buffer(universe)
    }

    pub fn fixture_count(&self) -> usize {
        lock_registry(&self.registry).fixture_count()
    }

    pub fn is_idle(&self) -> bool {
        lock_registry(&self.registry).is_empty()
    }

    pub fn is_broadcasting(&self) -> bool {
        self.lock_session().is_some()
    }

    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::SeqCst) > 0
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the transport and starts both loops, replacing any running
    /// session. Resolution failure leaves the controller stopped.
    pub async fn start(&self) -> DmxResult<()> {
        let _starting = StartingGuard::enter(&self.starting);

        self.stop();
        let generation = self.generation.load(Ordering::SeqCst);

        let sender = match self.open_sender().await {
            Ok(sender) => sender,
            Err(e) => {
                log::error!("[output] Failed to start output to {}: {}", self.target, e);
                return Err(e);
            }
        };

        let mut session = self.lock_session();
        if self.generation.load(Ordering::SeqCst) != generation {
            // A stop or another start happened while we were resolving
            return Ok(());
        }

        let discovery = tokio::spawn(discovery_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.transport),
            Arc::clone(&sender),
            self.settings.discovery_interval(),
        ));
        let publish = tokio::spawn(publish_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.transport),
            sender,
            self.settings.frame_interval(),
        ));
        *session = Some(Session {
            tasks: vec![discovery, publish],
        });
        log::info!("[output] Broadcasting to {}", self.target);
        Ok(())
    }

    async fn open_sender(&self) -> DmxResult<Arc<dyn PacketSender>> {
        match &self.target {
            OutputTarget::Multicast => self
                .transport
                .multicast_sender()
                .await
                .map_err(|e| DmxError::transport_unavailable(format!("multicast socket: {}", e))),
            OutputTarget::Unicast(host) => {
                let address = resolve_host(
                    host,
                    self.settings.resolve_attempts,
                    self.settings.resolve_backoff(),
                )
                .await?;
                log::info!("[output] Found sACN host {} at {}", host, address);
                self.transport
                    .unicast_sender(address)
                    .await
                    .map_err(|e| DmxError::transport_unavailable(format!("{}: {}", host, e)))
            }
        }
    }

    /// Cancels both loops. Also voids a `start` still resolving.
    pub fn stop(&self) {
        let mut session = self.lock_session();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if session.take().is_some() {
            log::info!("[output] Halting broadcast to {}", self.target);
        }
    }
}

impl Drop for DmxController {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn discovery_loop(
    registry: SharedRegistry,
    transport: Arc<dyn Transport>,
    sender: Arc<dyn PacketSender>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let universes = lock_registry(&registry).active_universe_ids();
        if universes.is_empty() {
            continue;
        }
        for packet in transport.discovery_packets(&universes) {
            if let Err(e) = sender.send(&packet).await {
                log::debug!("[output] Dropped discovery packet: {}", e);
            }
        }
    }
}

async fn publish_loop(
    registry: SharedRegistry,
    transport: Arc<dyn Transport>,
    sender: Arc<dyn PacketSender>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        // Pack under the lock, send after releasing it
        let frames = lock_registry(&registry).pack_active();
        for (universe, channels) in frames {
            let packet = transport.data_packet(universe, &channels);
            if let Err(e) = sender.send(&packet).await {
                log::debug!("[output] Dropped data packet for universe {}: {}", universe, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::layout::build_geometry;
    use crate::fixtures::models::{PhysicalParams, PixelCounts, PixelLayout};
    use crate::output::transport::{RecordingTransport, Route};
    use std::net::{IpAddr, Ipv4Addr};

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

    fn controller(target: OutputTarget, transport: &RecordingTransport) -> DmxController {
        DmxController::new(target, Arc::new(transport.clone()), OutputSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_non_empty_universes_at_frame_rate() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Multicast, &transport);
        let a = fixture("a");
        ctl.register_fixture(3, &a).unwrap();

        ctl.start().await.unwrap();
        assert!(ctl.is_broadcasting());
        tokio::time::sleep(Duration::from_secs(1)).await;

        let data = transport.data_packets();
        assert!((25..=35).contains(&data.len()), "{} packets", data.len());
        assert!(data.iter().all(|s| s.packet.universe == 3 && s.route == Route::Multicast));
        let parsed = e131::parse_data_packet(&data[0].packet.bytes).unwrap();
        assert_eq!(parsed.slots.len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn announces_universes_every_ten_seconds() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Unicast("10.0.0.5".into()), &transport);
        let a = fixture("a");
        let b = fixture("b");
        ctl.register_fixture(9, &a).unwrap();
        ctl.register_fixture(2, &b).unwrap();

        ctl.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(25)).await;

        let discovery = transport.discovery_packets_sent();
        assert_eq!(discovery.len(), 3);
        assert_eq!(discovery[0].route, Route::Unicast(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        let (_, _, universes) = e131::parse_discovery_universes(&discovery[0].packet.bytes).unwrap();
        assert_eq!(universes, vec![2, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_both_loops() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Multicast, &transport);
        let a = fixture("a");
        ctl.register_fixture(1, &a).unwrap();
        ctl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        ctl.stop();
        assert!(!ctl.is_broadcasting());
        tokio::task::yield_now().await;
        transport.clear();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_does_not_duplicate_loops() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Multicast, &transport);
        let a = fixture("a");
        ctl.register_fixture(1, &a).unwrap();
        ctl.start().await.unwrap();
        ctl.start().await.unwrap();
        tokio::task::yield_now().await;
        transport.clear();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let count = transport.data_packets().len();
        assert!((25..=35).contains(&count), "{} packets", count);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failures_are_dropped_and_the_stream_continues() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Multicast, &transport);
        let a = fixture("a");
        ctl.register_fixture(1, &a).unwrap();

        transport.set_failing(true);
        ctl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(transport.sent().is_empty());

        transport.set_failing(false);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!transport.data_packets().is_empty());
        assert!(ctl.is_broadcasting());
    }

    #[tokio::test(start_paused = true)]
    async fn emptied_universes_stop_being_sent() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Multicast, &transport);
        let a = fixture("a");
        let b = fixture("b");
        ctl.register_fixture(1, &a).unwrap();
        ctl.register_fixture(2, &b).unwrap();
        ctl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        ctl.unregister_fixture("a");
        transport.clear();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let data = transport.data_packets();
        assert!(!data.is_empty());
        assert!(data.iter().all(|s| s.packet.universe == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn extreme_frame_rate_still_publishes() {
        let transport = RecordingTransport::new();
        let settings = OutputSettings {
            fps: 1.0e10,
            ..Default::default()
        };
        let ctl = DmxController::new(OutputTarget::Multicast, Arc::new(transport.clone()), settings);
        let a = fixture("a");
        ctl.register_fixture(1, &a).unwrap();

        ctl.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(transport.data_packets().len() >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn send_errors_surface_as_send_failures() {
        let transport = RecordingTransport::new();
        transport.set_failing(true);
        let sender = transport.multicast_sender().await.unwrap();
        let err = sender.send(&transport.data_packet(1, &[0; 3])).await.unwrap_err();
        assert!(matches!(err, DmxError::Send(_)));
    }

    #[test]
    fn overlapping_starts_stay_starting_until_the_last_exits() {
        let ctl = controller(OutputTarget::Multicast, &RecordingTransport::new());
        let first = StartingGuard::enter(&ctl.starting);
        let second = StartingGuard::enter(&ctl.starting);
        drop(first);
        assert!(ctl.is_starting());
        drop(second);
        assert!(!ctl.is_starting());
    }

    #[tokio::test]
    async fn unresolvable_host_does_not_start() {
        let transport = RecordingTransport::new();
        let ctl = controller(OutputTarget::Unicast("   ".into()), &transport);
        let a = fixture("a");
        ctl.register_fixture(1, &a).unwrap();
        let err = ctl.start().await.unwrap_err();
        assert!(matches!(err, DmxError::TransportUnavailable(_)));
        assert!(!ctl.is_broadcasting());
        assert!(!ctl.is_starting());
    }
}

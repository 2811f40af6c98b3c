use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use e131::{PacketFactory, DISCOVERY_UNIVERSE};

use crate::error::{DmxError, DmxResult};

/// A ready-to-send protocol packet and the universe it is addressed to
/// (the discovery universe for announcements).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub universe: u16,
    pub bytes: Vec<u8>,
}

impl Packet {
    pub fn is_discovery(&self) -> bool {
        self.universe == DISCOVERY_UNIVERSE
    }
}

#[async_trait]
pub trait PacketSender: Send + Sync {
    /// Socket failures come back as [`DmxError::Send`].
    async fn send(&self, packet: &Packet) -> DmxResult<()>;
}

/// Wire encoder plus socket factory. The scheduler only hands it
/// `(universe, channel bytes)` and sends whatever it builds.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn unicast_sender(&self, address: IpAddr) -> io::Result<Arc<dyn PacketSender>>;

    async fn multicast_sender(&self) -> io::Result<Arc<dyn PacketSender>>;

    fn discovery_packets(&self, universes: &[u16]) -> Vec<Packet>;

    fn data_packet(&self, universe: u16, channels: &[u8]) -> Packet;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Unicast(IpAddr),
    Multicast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub route: Route,
    pub packet: Packet,
}

#[derive(Debug, Default)]
struct Recorder {
    sent: Mutex<Vec<SentPacket>>,
    failing: AtomicBool,
}

impl Recorder {
    fn push(&self, sent: SentPacket) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sent);
    }
}

/// Transport that encodes real E1.31 packets but keeps them in memory.
/// Used by the tests and by `scene_player --dry-run`.
#[derive(Clone)]
pub struct RecordingTransport {
    factory: Arc<PacketFactory>,
    recorder: Arc<Recorder>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            factory: Arc::new(PacketFactory::with_random_cid("recording")),
            recorder: Arc::new(Recorder::default()),
        }
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        self.recorder
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.recorder
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn data_packets(&self) -> Vec<SentPacket> {
        self.sent()
            .into_iter()
            .filter(|s| !s.packet.is_discovery())
            .collect()
    }

    pub fn discovery_packets_sent(&self) -> Vec<SentPacket> {
        self.sent()
            .into_iter()
            .filter(|s| s.packet.is_discovery())
            .collect()
    }

    /// While set, every send fails with `ConnectionRefused`.
    pub fn set_failing(&self, failing: bool) {
        self.recorder.failing.store(failing, Ordering::SeqCst);
    }
}

struct RecordingSender {
    route: Route,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl PacketSender for RecordingSender {
    async fn send(&self, packet: &Packet) -> DmxResult<()> {
        if self.recorder.failing.load(Ordering::SeqCst) {
            return Err(DmxError::Send(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "recording sender failing",
            )));
        }
        self.recorder.push(SentPacket {
            route: self.route,
            packet: packet.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn unicast_sender(&self, address: IpAddr) -> io::Result<Arc<dyn PacketSender>> {
        Ok(Arc::new(RecordingSender {
            route: Route::Unicast(address),
            recorder: Arc::clone(&self.recorder),
        }))
    }

    async fn multicast_sender(&self) -> io::Result<Arc<dyn PacketSender>> {
        Ok(Arc::new(RecordingSender {
            route: Route::Multicast,
            recorder: Arc::clone(&self.recorder),
        }))
    }

    fn discovery_packets(&self, universes: &[u16]) -> Vec<Packet> {
        self.factory
            .discovery_packets(universes)
            .into_iter()
            .map(|bytes| Packet {
                universe: DISCOVERY_UNIVERSE,
                bytes,
            })
            .collect()
    }

    fn data_packet(&self, universe: u16, channels: &[u8]) -> Packet {
        Packet {
            universe,
            bytes: self.factory.data_packet(universe, channels),
        }
    }
}

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

use crate::types::{ACN_SDT_MULTICAST_PORT, DISCOVERY_UNIVERSE};

/// Multicast group for a universe: 239.255.{high byte}.{low byte}.
pub fn multicast_address(universe: u16) -> Ipv4Addr {
    let [hi, lo] = universe.to_be_bytes();
    Ipv4Addr::new(239, 255, hi, lo)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Every packet goes to one receiver.
    Unicast(SocketAddr),
    /// Each packet goes to its universe's multicast group.
    Multicast,
}

/// UDP sender for E1.31 packets.
pub struct SacnSender {
    socket: UdpSocket,
    destination: Destination,
}

impl SacnSender {
    /// Bind an ephemeral socket that sends to `address:5568`.
    pub async fn unicast(address: IpAddr) -> io::Result<Self> {
        Self::unicast_to(SocketAddr::new(address, ACN_SDT_MULTICAST_PORT)).await
    }

    /// Bind an ephemeral socket that sends to an explicit receiver address.
    pub async fn unicast_to(target: SocketAddr) -> io::Result<Self> {
        let bind: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind).await?;
        Ok(Self {
            socket,
            destination: Destination::Unicast(target),
        })
    }

    /// Bind an IPv4 socket that addresses the per-universe multicast groups.
    pub async fn multicast() -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_multicast_ttl_v4(16)?;
        socket.set_multicast_loop_v4(true)?;
        Ok(Self {
            socket,
            destination: Destination::Multicast,
        })
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Where a packet for `universe` is sent.
    pub fn target_for(&self, universe: u16) -> SocketAddr {
        match self.destination {
            Destination::Unicast(addr) => addr,
            Destination::Multicast => {
                SocketAddr::new(IpAddr::V4(multicast_address(universe)), ACN_SDT_MULTICAST_PORT)
            }
        }
    }

    /// Send a packet built for `universe`. Use [`DISCOVERY_UNIVERSE`] for
    /// discovery packets.
    pub async fn send(&self, universe: u16, packet: &[u8]) -> io::Result<usize> {
        self.socket.send_to(packet, self.target_for(universe)).await
    }
}

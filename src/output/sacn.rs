use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use e131::{PacketFactory, SacnSender};

use crate::error::{DmxError, DmxResult};
use crate::output::transport::{Packet, PacketSender, Transport};

/// Component identifier announced by every controller of this process.
pub const DEFAULT_CID: [u8; 16] = [
    0x29, 0xd7, 0x13, 0x52, 0xc9, 0xa8, 0x40, 0x66, 0x97, 0xa6, 0x11, 0x7b, 0xd1, 0x00, 0x76, 0xf6,
];

/// E1.31 over UDP.
pub struct E131Transport {
    factory: PacketFactory,
}

impl E131Transport {
    pub fn new(source_name: &str) -> Self {
        Self::with_cid(DEFAULT_CID, source_name)
    }

    pub fn with_cid(cid: [u8; 16], source_name: &str) -> Self {
        Self {
            factory: PacketFactory::new(cid, source_name),
        }
    }
}

struct UdpPacketSender(SacnSender);

#[async_trait]
impl PacketSender for UdpPacketSender {
    async fn send(&self, packet: &Packet) -> DmxResult<()> {
        self.0
            .send(packet.universe, &packet.bytes)
            .await
            .map(|_| ())
            .map_err(DmxError::Send)
    }
}

#[async_trait]
impl Transport for E131Transport {
    async fn unicast_sender(&self, address: IpAddr) -> io::Result<Arc<dyn PacketSender>> {
        let sender = SacnSender::unicast(address).await?;
        log::debug!("[sacn] Unicast sender targeting {:?}", sender.destination());
        Ok(Arc::new(UdpPacketSender(sender)))
    }

    async fn multicast_sender(&self) -> io::Result<Arc<dyn PacketSender>> {
        let sender = SacnSender::multicast().await?;
        log::debug!("[sacn] Multicast sender ready");
        Ok(Arc::new(UdpPacketSender(sender)))
    }

    fn discovery_packets(&self, universes: &[u16]) -> Vec<Packet> {
        self.factory
            .discovery_packets(universes)
            .into_iter()
            .map(|bytes| Packet {
                universe: e131::DISCOVERY_UNIVERSE,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::UdpSocket;

    #[test]
    fn packets_carry_source_identity() {
        let transport = E131Transport::new("Lantern Rig");
        let packet = transport.data_packet(5, &[1, 2, 3]);
        assert_eq!(packet.universe, 5);
        let parsed = e131::parse_data_packet(&packet.bytes).unwrap();
        assert_eq!(parsed.cid, DEFAULT_CID);
        assert_eq!(parsed.source_name, "Lantern Rig");
        assert_eq!(parsed.slots, vec![1, 2, 3]);

        let discovery = transport.discovery_packets(&[3, 1]);
        assert_eq!(discovery.len(), 1);
        assert!(discovery[0].is_discovery());
        let (_, _, universes) = e131::parse_discovery_universes(&discovery[0].bytes).unwrap();
        assert_eq!(universes, vec![1, 3]);
    }

    #[tokio::test]
    async fn unicast_sender_reaches_port_5568_host() {
        // Can only bind 5568 when nothing else owns it; skip otherwise.
        let Ok(receiver) = UdpSocket::bind((Ipv4Addr::LOCALHOST, e131::ACN_SDT_MULTICAST_PORT)).await
        else {
            return;
        };
        let transport = E131Transport::new("test");
        let sender = transport
            .unicast_sender(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        sender.send(&transport.data_packet(1, &[9; 6])).await.unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        let parsed = e131::parse_data_packet(&buf[..len]).unwrap();
        assert_eq!(parsed.universe, 1);
        assert_eq!(parsed.slots, vec![9; 6]);
    }
}

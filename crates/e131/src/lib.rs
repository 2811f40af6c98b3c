//! Minimal E1.31 (streaming ACN) support: data and universe discovery
//! packet construction plus a tokio UDP sender.

pub mod packet;
pub mod sender;
pub mod types;

pub use packet::{parse_data_packet, parse_discovery_universes, DataPacket, PacketFactory};
pub use sender::{multicast_address, Destination, SacnSender};
pub use types::{ACN_SDT_MULTICAST_PORT, DISCOVERY_UNIVERSE, MAX_DATA_UNIVERSE, MAX_DMX_SLOTS};

/// UDP port reserved for ACN / sACN traffic.
pub const ACN_SDT_MULTICAST_PORT: u16 = 5568;

/// ACN packet identifier that follows the preamble.
pub const ACN_PACKET_IDENTIFIER: [u8; 12] = *b"ASC-E1.17\0\0\0";

pub const PREAMBLE_SIZE: u16 = 0x0010;
pub const POSTAMBLE_SIZE: u16 = 0x0000;

/// Root layer vectors.
pub const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;
pub const VECTOR_ROOT_E131_EXTENDED: u32 = 0x0000_0008;

/// Framing layer vectors.
pub const VECTOR_E131_DATA_PACKET: u32 = 0x0000_0002;
pub const VECTOR_E131_EXTENDED_DISCOVERY: u32 = 0x0000_0002;

/// DMP layer: set property.
pub const VECTOR_DMP_SET_PROPERTY: u8 = 0x02;
pub const DMP_ADDRESS_TYPE: u8 = 0xa1;

/// Universe discovery layer vector.
pub const VECTOR_UNIVERSE_DISCOVERY_UNIVERSE_LIST: u32 = 0x0000_0001;

/// Reserved universe that discovery packets are addressed to.
pub const DISCOVERY_UNIVERSE: u16 = 64214;

/// Highest universe usable for data.
pub const MAX_DATA_UNIVERSE: u16 = 63999;

pub const DMX_START_CODE: u8 = 0x00;
pub const DEFAULT_PRIORITY: u8 = 100;

/// Maximum number of DMX slots carried by one data packet.
pub const MAX_DMX_SLOTS: usize = 512;

/// Maximum number of universes listed on one discovery page.
pub const MAX_UNIVERSES_PER_PAGE: usize = 512;

pub const SOURCE_NAME_LEN: usize = 64;

/// Header sizes (everything before the payload).
pub const DATA_HEADER_LEN: usize = 126;
pub const DISCOVERY_HEADER_LEN: usize = 120;

/// Byte offsets of the PDU flags/length words.
pub const ROOT_PDU_OFFSET: usize = 16;
pub const FRAMING_PDU_OFFSET: usize = 38;
pub const DMP_PDU_OFFSET: usize = 115;
pub const DISCOVERY_PDU_OFFSET: usize = 112;

/// High nibble set on every PDU length word.
pub const PDU_FLAGS: u16 = 0x7000;

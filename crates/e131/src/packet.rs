use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::{Mutex, PoisonError};

use crate::types::*;

/// Builds E1.31 packets for one source (component id + source name).
///
/// Data packets carry a per-universe sequence number that wraps at 255.
pub struct PacketFactory {
    cid: [u8; 16],
    source_name: [u8; SOURCE_NAME_LEN],
    sequences: Mutex<HashMap<u16, u8>>,
}

impl PacketFactory {
    pub fn new(cid: [u8; 16], source_name: &str) -> Self {
        Self {
            cid,
            source_name: encode_source_name(source_name),
            sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Factory with a freshly generated component identifier.
    pub fn with_random_cid(source_name: &str) -> Self {
        Self::new(*uuid::Uuid::new_v4().as_bytes(), source_name)
    }

    /// Build a data packet. Slots past 512 are dropped.
    pub fn data_packet(&self, universe: u16, slots: &[u8]) -> Vec<u8> {
        let slots = &slots[..slots.len().min(MAX_DMX_SLOTS)];
        let total = DATA_HEADER_LEN + slots.len();
        let mut buf = vec![0u8; total];

        self.write_root_layer(&mut buf, VECTOR_ROOT_E131_DATA);

        // Framing layer
        write_pdu_length(&mut buf, FRAMING_PDU_OFFSET);
        BigEndian::write_u32(&mut buf[40..44], VECTOR_E131_DATA_PACKET);
        buf[44..108].copy_from_slice(&self.source_name);
        buf[108] = DEFAULT_PRIORITY;
        // 109..111 synchronization address stays 0
        buf[111] = self.next_sequence(universe);
        // 112 options stays 0
        BigEndian::write_u16(&mut buf[113..115], universe);

        // DMP layer
        write_pdu_length(&mut buf, DMP_PDU_OFFSET);
        buf[117] = VECTOR_DMP_SET_PROPERTY;
        buf[118] = DMP_ADDRESS_TYPE;
        // 119..121 first property address stays 0
        BigEndian::write_u16(&mut buf[121..123], 0x0001);
        BigEndian::write_u16(&mut buf[123..125], (slots.len() + 1) as u16);
        buf[125] = DMX_START_CODE;
        buf[DATA_HEADER_LEN..].copy_from_slice(slots);

        buf
    }

    /// Build the universe discovery packets announcing `universes`.
    ///
    /// The list is sorted and deduplicated, then split into pages of 512.
    /// An empty list still produces a single (empty) page.
    pub fn discovery_packets(&self, universes: &[u16]) -> Vec<Vec<u8>> {
        let mut sorted = universes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let pages: Vec<&[u16]> = if sorted.is_empty() {
            vec![&[]]
        } else {
            sorted.chunks(MAX_UNIVERSES_PER_PAGE).collect()
        };
        let last_page = (pages.len() - 1) as u8;

        pages
            .iter()
            .enumerate()
            .map(|(page, list)| self.discovery_page(page as u8, last_page, list))
            .collect()
    }

    fn discovery_page(&self, page: u8, last_page: u8, universes: &[u16]) -> Vec<u8> {
        let total = DISCOVERY_HEADER_LEN + universes.len() * 2;
        let mut buf = vec![0u8; total];

        self.write_root_layer(&mut buf, VECTOR_ROOT_E131_EXTENDED);

        write_pdu_length(&mut buf, FRAMING_PDU_OFFSET);
        BigEndian::write_u32(&mut buf[40..44], VECTOR_E131_EXTENDED_DISCOVERY);
        buf[44..108].copy_from_slice(&self.source_name);
        // 108..112 reserved

        write_pdu_length(&mut buf, DISCOVERY_PDU_OFFSET);
        BigEndian::write_u32(&mut buf[114..118], VECTOR_UNIVERSE_DISCOVERY_UNIVERSE_LIST);
        buf[118] = page;
        buf[119] = last_page;
        for (i, universe) in universes.iter().enumerate() {
            let at = DISCOVERY_HEADER_LEN + i * 2;
            BigEndian::write_u16(&mut buf[at..at + 2], *universe);
        }

        buf
    }

    fn write_root_layer(&self, buf: &mut [u8], vector: u32) {
        BigEndian::write_u16(&mut buf[0..2], PREAMBLE_SIZE);
        BigEndian::write_u16(&mut buf[2..4], POSTAMBLE_SIZE);
        buf[4..16].copy_from_slice(&ACN_PACKET_IDENTIFIER);
        write_pdu_length(buf, ROOT_PDU_OFFSET);
        BigEndian::write_u32(&mut buf[18..22], vector);
        buf[22..38].copy_from_slice(&self.cid);
    }

    fn next_sequence(&self, universe: u16) -> u8 {
        let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = sequences.entry(universe).or_insert(0);
        let current = *seq;
        *seq = seq.wrapping_add(1);
        current
    }
}

/// Flags + length word covering everything from `offset` to the end.
fn write_pdu_length(buf: &mut [u8], offset: usize) {
    let len = (buf.len() - offset) as u16 & 0x0fff;
    BigEndian::write_u16(&mut buf[offset..offset + 2], PDU_FLAGS | len);
}

fn encode_source_name(name: &str) -> [u8; SOURCE_NAME_LEN] {
    let mut out = [0u8; SOURCE_NAME_LEN];
    // Keep the final byte as the null terminator.
    let mut end = name.len().min(SOURCE_NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    out[..end].copy_from_slice(&name.as_bytes()[..end]);
    out
}

/// Fields of a received data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub cid: [u8; 16],
    pub source_name: String,
    pub priority: u8,
    pub sequence: u8,
    pub universe: u16,
    pub slots: Vec<u8>,
}

/// Parse a data packet, rejecting anything that is not E1.31 data with
/// the null start code.
pub fn parse_data_packet(data: &[u8]) -> io::Result<DataPacket> {
    if data.len() < DATA_HEADER_LEN {
        return Err(invalid("packet shorter than the data header"));
    }
    let mut cursor = Cursor::new(data);
    if cursor.read_u16::<BigEndian>()? != PREAMBLE_SIZE {
        return Err(invalid("bad preamble size"));
    }
    cursor.read_u16::<BigEndian>()?;
    let mut ident = [0u8; 12];
    cursor.read_exact(&mut ident)?;
    if ident != ACN_PACKET_IDENTIFIER {
        return Err(invalid("not an ACN packet"));
    }
    cursor.read_u16::<BigEndian>()?;
    if cursor.read_u32::<BigEndian>()? != VECTOR_ROOT_E131_DATA {
        return Err(invalid("not an E1.31 data packet"));
    }
    let mut cid = [0u8; 16];
    cursor.read_exact(&mut cid)?;

    cursor.read_u16::<BigEndian>()?;
    if cursor.read_u32::<BigEndian>()? != VECTOR_E131_DATA_PACKET {
        return Err(invalid("bad framing vector"));
    }
    let mut name = [0u8; SOURCE_NAME_LEN];
    cursor.read_exact(&mut name)?;
    let name_end = name.iter().position(|b| *b == 0).unwrap_or(SOURCE_NAME_LEN);
    let source_name = String::from_utf8_lossy(&name[..name_end]).to_string();
    let priority = cursor.read_u8()?;
    cursor.read_u16::<BigEndian>()?;
    let sequence = cursor.read_u8()?;
    cursor.read_u8()?;
    let universe = cursor.read_u16::<BigEndian>()?;

    cursor.read_u16::<BigEndian>()?;
    if cursor.read_u8()? != VECTOR_DMP_SET_PROPERTY {
        return Err(invalid("bad DMP vector"));
    }
    cursor.read_u8()?;
    cursor.read_u16::<BigEndian>()?;
    cursor.read_u16::<BigEndian>()?;
    let count = cursor.read_u16::<BigEndian>()? as usize;
    if count == 0 || DATA_HEADER_LEN - 1 + count > data.len() {
        return Err(invalid("property count does not match packet length"));
    }
    if cursor.read_u8()? != DMX_START_CODE {
        return Err(invalid("unsupported start code"));
    }

    Ok(DataPacket {
        cid,
        source_name,
        priority,
        sequence,
        universe,
        slots: data[DATA_HEADER_LEN..DATA_HEADER_LEN - 1 + count].to_vec(),
    })
}

/// Universe list carried by one discovery page.
pub fn parse_discovery_universes(data: &[u8]) -> io::Result<(u8, u8, Vec<u16>)> {
    if data.len() < DISCOVERY_HEADER_LEN || (data.len() - DISCOVERY_HEADER_LEN) % 2 != 0 {
        return Err(invalid("bad discovery packet length"));
    }
    if BigEndian::read_u32(&data[18..22]) != VECTOR_ROOT_E131_EXTENDED {
        return Err(invalid("not an extended packet"));
    }
    if BigEndian::read_u32(&data[114..118]) != VECTOR_UNIVERSE_DISCOVERY_UNIVERSE_LIST {
        return Err(invalid("not a universe list"));
    }
    let universes = data[DISCOVERY_HEADER_LEN..]
        .chunks_exact(2)
        .map(BigEndian::read_u16)
        .collect();
    Ok((data[118], data[119], universes))
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

//! Packet-number spaces and encryption levels.

/// One of the three packet-number spaces a session maintains, each with its
/// own ack generator, packet-number generator, retransmission tracker and
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketNumberSpace {
    Initial,
    Handshake,
    App,
}

impl PacketNumberSpace {
    pub const ALL: [PacketNumberSpace; 3] = [
        PacketNumberSpace::Initial,
        PacketNumberSpace::Handshake,
        PacketNumberSpace::App,
    ];

    pub fn index(self) -> usize {
        match self {
            PacketNumberSpace::Initial => 0,
            PacketNumberSpace::Handshake => 1,
            PacketNumberSpace::App => 2,
        }
    }
}

/// Parallel to `PacketNumberSpace`; selects which sealer is used to
/// open/seal a packet.
pub type EncryptionLevel = PacketNumberSpace;

/// The QUIC v1 long-header packet types (RFC 9000 §17.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPacketType {
    Initial,
    ZeroRtt,
    Handshake,
    Retry,
}

impl LongPacketType {
    pub fn to_bits(self) -> u8 {
        match self {
            LongPacketType::Initial => 0b00,
            LongPacketType::ZeroRtt => 0b01,
            LongPacketType::Handshake => 0b10,
            LongPacketType::Retry => 0b11,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => LongPacketType::Initial,
            0b01 => LongPacketType::ZeroRtt,
            0b10 => LongPacketType::Handshake,
            _ => LongPacketType::Retry,
        }
    }

    pub fn space(self) -> Option<PacketNumberSpace> {
        match self {
            LongPacketType::Initial => Some(PacketNumberSpace::Initial),
            LongPacketType::Handshake => Some(PacketNumberSpace::Handshake),
            LongPacketType::ZeroRtt | LongPacketType::Retry => None,
        }
    }
}

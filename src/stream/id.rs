//! Stream identifiers: a 62-bit integer whose two low bits carry the
//! initiator and direction (RFC 9000 §2.1).

use crate::varint::VarInt;

/// Which endpoint role initiated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bidi,
    Uni,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u64);

impl StreamId {
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn into_u64(self) -> u64 {
        self.0
    }

    /// The lowest stream ID for a given (initiator, direction) pair:
    /// 0x00 client-bidi, 0x01 server-bidi, 0x02 client-uni, 0x03 server-uni.
    pub fn initial(initiator: Side, direction: Direction) -> Self {
        let bits = match (direction, initiator) {
            (Direction::Bidi, Side::Client) => 0,
            (Direction::Bidi, Side::Server) => 1,
            (Direction::Uni, Side::Client) => 2,
            (Direction::Uni, Side::Server) => 3,
        };
        Self(bits)
    }

    /// The `n`th stream ID of the given type, counting from 0 at `initial`.
    /// Stream IDs of one type are spaced 4 apart, since the low 2 bits
    /// encode the type. Returns `None` on overflow past the 62-bit range.
    pub fn nth(initiator: Side, direction: Direction, n: u64) -> Option<Self> {
        let base = Self::initial(initiator, direction).0;
        let id = n.checked_mul(4)?.checked_add(base)?;
        VarInt::new(id).ok().map(|_| Self(id))
    }

    pub fn next_of_type(self) -> Option<Self> {
        let id = self.0.checked_add(4)?;
        VarInt::new(id).ok().map(Self)
    }

    pub fn initiator(self) -> Side {
        if self.0 & 0x01 == 0 {
            Side::Client
        } else {
            Side::Server
        }
    }

    pub fn direction(self) -> Direction {
        if self.0 & 0x02 == 0 {
            Direction::Bidi
        } else {
            Direction::Uni
        }
    }

    /// Whether a stream with this ID was opened by `local` (as opposed to
    /// received from the peer).
    pub fn is_locally_initiated(self, local: Side) -> bool {
        self.initiator() == local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_ids_match_rfc_table() {
        assert_eq!(StreamId::initial(Side::Client, Direction::Bidi).into_u64(), 0);
        assert_eq!(StreamId::initial(Side::Server, Direction::Bidi).into_u64(), 1);
        assert_eq!(StreamId::initial(Side::Client, Direction::Uni).into_u64(), 2);
        assert_eq!(StreamId::initial(Side::Server, Direction::Uni).into_u64(), 3);
    }

    #[test]
    fn nth_steps_by_four() {
        let first = StreamId::nth(Side::Client, Direction::Bidi, 0).unwrap();
        let second = StreamId::nth(Side::Client, Direction::Bidi, 1).unwrap();
        assert_eq!(second.into_u64() - first.into_u64(), 4);
        assert_eq!(second, first.next_of_type().unwrap());
    }

    #[test]
    fn roundtrips_initiator_and_direction() {
        for &initiator in &[Side::Client, Side::Server] {
            for &direction in &[Direction::Bidi, Direction::Uni] {
                let id = StreamId::initial(initiator, direction);
                assert_eq!(id.initiator(), initiator);
                assert_eq!(id.direction(), direction);
            }
        }
    }

    #[test]
    fn overflow_past_max_returns_none() {
        let max = StreamId::from_u64(VarInt::MAX.get() - 3);
        assert!(max.next_of_type().is_none());
    }
}

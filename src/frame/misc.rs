//! The remaining, simpler frame types (everything but ACK/STREAM/CRYPTO,
//! which get their own modules), per RFC 9000 §19.

use bytes::{Buf, BufMut};

use crate::cid::ConnectionId;
use crate::error::{require, QuicResult};
use crate::stream::id::StreamId;
use crate::varint::VarInt;

macro_rules! varint_field {
    ($buf:expr) => {
        VarInt::decode($buf)?.get()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingFrame;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeDoneFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxDataFrame {
    pub maximum_data: u64,
}
impl MaxDataFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::MAX_DATA as u32).encode(buf);
        VarInt::new(self.maximum_data).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        Ok(Self { maximum_data: varint_field!(buf) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    pub stream_id: StreamId,
    pub maximum_stream_data: u64,
}
impl MaxStreamDataFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::MAX_STREAM_DATA as u32).encode(buf);
        VarInt::new(self.stream_id.into_u64()).unwrap().encode(buf);
        VarInt::new(self.maximum_stream_data).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let stream_id = StreamId::from_u64(varint_field!(buf));
        let maximum_stream_data = varint_field!(buf);
        Ok(Self { stream_id, maximum_stream_data })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Bidi,
    Uni,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxStreamsFrame {
    pub kind: StreamKind,
    pub maximum_streams: u64,
}
impl MaxStreamsFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        let ty = match self.kind {
            StreamKind::Bidi => super::FrameType::MAX_STREAMS_BIDI,
            StreamKind::Uni => super::FrameType::MAX_STREAMS_UNI,
        };
        VarInt::from_u32(ty as u32).encode(buf);
        VarInt::new(self.maximum_streams).unwrap().encode(buf);
    }
    /// The BIDI/UNI variant is determined by the type byte, which the
    /// caller has already inspected to pick a type-specific decode path;
    /// `kind` is threaded through here rather than re-derived.
    pub fn decode(kind: StreamKind, buf: &mut impl Buf) -> QuicResult<Self> {
        Ok(Self { kind, maximum_streams: varint_field!(buf) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlockedFrame {
    pub maximum_data: u64,
}
impl DataBlockedFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::DATA_BLOCKED as u32).encode(buf);
        VarInt::new(self.maximum_data).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        Ok(Self { maximum_data: varint_field!(buf) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDataBlockedFrame {
    pub stream_id: StreamId,
    pub maximum_stream_data: u64,
}
impl StreamDataBlockedFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::STREAM_DATA_BLOCKED as u32).encode(buf);
        VarInt::new(self.stream_id.into_u64()).unwrap().encode(buf);
        VarInt::new(self.maximum_stream_data).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let stream_id = StreamId::from_u64(varint_field!(buf));
        let maximum_stream_data = varint_field!(buf);
        Ok(Self { stream_id, maximum_stream_data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectionIdFrame {
    pub sequence_number: u64,
    pub retire_prior_to: u64,
    pub connection_id: ConnectionId,
    pub stateless_reset_token: [u8; 16],
}
impl NewConnectionIdFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::NEW_CONNECTION_ID as u32).encode(buf);
        VarInt::new(self.sequence_number).unwrap().encode(buf);
        VarInt::new(self.retire_prior_to).unwrap().encode(buf);
        buf.put_u8(self.connection_id.len() as u8);
        buf.put_slice(self.connection_id.as_bytes());
        buf.put_slice(&self.stateless_reset_token);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let sequence_number = varint_field!(buf);
        let retire_prior_to = varint_field!(buf);
        require(retire_prior_to <= sequence_number, "new_connection_id: retire_prior_to exceeds sequence_number")?;
        require(buf.remaining() >= 1, "new_connection_id: missing length")?;
        let len = bytes::Buf::get_u8(buf) as usize;
        require(len >= 1 && len <= crate::cid::MAX_CID_LEN, "new_connection_id: invalid cid length")?;
        require(buf.remaining() >= len + 16, "new_connection_id: truncated")?;
        let mut cid_bytes = vec![0u8; len];
        buf.copy_to_slice(&mut cid_bytes);
        let mut token = [0u8; 16];
        buf.copy_to_slice(&mut token);
        Ok(Self {
            sequence_number,
            retire_prior_to,
            connection_id: ConnectionId::new(cid_bytes)?,
            stateless_reset_token: token,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetireConnectionIdFrame {
    pub sequence_number: u64,
}
impl RetireConnectionIdFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::RETIRE_CONNECTION_ID as u32).encode(buf);
        VarInt::new(self.sequence_number).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        Ok(Self { sequence_number: varint_field!(buf) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChallengeFrame {
    pub data: [u8; 8],
}
impl PathChallengeFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::PATH_CHALLENGE as u32).encode(buf);
        buf.put_slice(&self.data);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        require(buf.remaining() >= 8, "path_challenge: truncated")?;
        let mut data = [0u8; 8];
        buf.copy_to_slice(&mut data);
        Ok(Self { data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResponseFrame {
    pub data: [u8; 8],
}
impl PathResponseFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::PATH_RESPONSE as u32).encode(buf);
        buf.put_slice(&self.data);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        require(buf.remaining() >= 8, "path_response: truncated")?;
        let mut data = [0u8; 8];
        buf.copy_to_slice(&mut data);
        Ok(Self { data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    pub is_application_error: bool,
    pub error_code: u64,
    pub frame_type: u64,
    pub reason: Vec<u8>,
}
impl ConnectionCloseFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        let ty = if self.is_application_error {
            super::FrameType::CONNECTION_CLOSE_APPLICATION
        } else {
            super::FrameType::CONNECTION_CLOSE_TRANSPORT
        };
        VarInt::from_u32(ty as u32).encode(buf);
        VarInt::new(self.error_code).unwrap().encode(buf);
        if !self.is_application_error {
            VarInt::new(self.frame_type).unwrap().encode(buf);
        }
        VarInt::new(self.reason.len() as u64).unwrap().encode(buf);
        buf.put_slice(&self.reason);
    }
    pub fn decode(is_application_error: bool, buf: &mut impl Buf) -> QuicResult<Self> {
        let error_code = varint_field!(buf);
        let frame_type = if is_application_error { 0 } else { varint_field!(buf) };
        let len = VarInt::decode(buf)?.as_usize();
        require(buf.remaining() >= len, "connection_close: truncated reason")?;
        let mut reason = vec![0u8; len];
        buf.copy_to_slice(&mut reason);
        Ok(Self { is_application_error, error_code, frame_type, reason })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetStreamFrame {
    pub stream_id: StreamId,
    pub application_error_code: u64,
    pub final_size: u64,
}
impl ResetStreamFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::RESET_STREAM as u32).encode(buf);
        VarInt::new(self.stream_id.into_u64()).unwrap().encode(buf);
        VarInt::new(self.application_error_code).unwrap().encode(buf);
        VarInt::new(self.final_size).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let stream_id = StreamId::from_u64(varint_field!(buf));
        let application_error_code = varint_field!(buf);
        let final_size = varint_field!(buf);
        Ok(Self { stream_id, application_error_code, final_size })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSendingFrame {
    pub stream_id: StreamId,
    pub application_error_code: u64,
}
impl StopSendingFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::STOP_SENDING as u32).encode(buf);
        VarInt::new(self.stream_id.into_u64()).unwrap().encode(buf);
        VarInt::new(self.application_error_code).unwrap().encode(buf);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let stream_id = StreamId::from_u64(varint_field!(buf));
        let application_error_code = varint_field!(buf);
        Ok(Self { stream_id, application_error_code })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTokenFrame {
    pub token: Vec<u8>,
}
impl NewTokenFrame {
    pub fn encode(&self, buf: &mut impl BufMut) {
        VarInt::from_u32(super::FrameType::NEW_TOKEN as u32).encode(buf);
        VarInt::new(self.token.len() as u64).unwrap().encode(buf);
        buf.put_slice(&self.token);
    }
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let len = VarInt::decode(buf)?.as_usize();
        require(len > 0, "new_token: token MUST NOT be empty")?;
        require(buf.remaining() >= len, "new_token: truncated")?;
        let mut token = vec![0u8; len];
        buf.copy_to_slice(&mut token);
        Ok(Self { token })
    }
}

//! Frame type registry and the top-level `Frame` sum type tying every
//! frame module together, per RFC 9000 §19.

pub mod ack;
pub mod crypto;
pub mod misc;
pub mod stream;

use bytes::{Buf, BufMut};

use crate::error::{QuicError, QuicResult};
use crate::varint::VarInt;

pub use ack::{AckFrame, AckRange};
pub use crypto::CryptoFrame;
pub use misc::*;
pub use stream::StreamFrame;

#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    PADDING = 0x00,
    PING = 0x01,
    ACK = 0x02,
    ACK_ECN = 0x03,
    RESET_STREAM = 0x04,
    STOP_SENDING = 0x05,
    CRYPTO = 0x06,
    NEW_TOKEN = 0x07,
    // STREAM = 0x08..=0x0f, handled separately (low 3 bits are flags)
    MAX_DATA = 0x10,
    MAX_STREAM_DATA = 0x11,
    MAX_STREAMS_BIDI = 0x12,
    MAX_STREAMS_UNI = 0x13,
    DATA_BLOCKED = 0x14,
    STREAM_DATA_BLOCKED = 0x15,
    STREAMS_BLOCKED_BIDI = 0x16,
    STREAMS_BLOCKED_UNI = 0x17,
    NEW_CONNECTION_ID = 0x18,
    RETIRE_CONNECTION_ID = 0x19,
    PATH_CHALLENGE = 0x1a,
    PATH_RESPONSE = 0x1b,
    CONNECTION_CLOSE_TRANSPORT = 0x1c,
    CONNECTION_CLOSE_APPLICATION = 0x1d,
    HANDSHAKE_DONE = 0x1e,
}

/// A fully parsed frame, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Padding,
    Ping,
    Ack(AckFrame),
    ResetStream(ResetStreamFrame),
    StopSending(StopSendingFrame),
    Crypto(CryptoFrame),
    NewToken(NewTokenFrame),
    Stream(StreamFrame),
    MaxData(MaxDataFrame),
    MaxStreamData(MaxStreamDataFrame),
    MaxStreams(MaxStreamsFrame),
    DataBlocked(DataBlockedFrame),
    StreamDataBlocked(StreamDataBlockedFrame),
    NewConnectionId(NewConnectionIdFrame),
    RetireConnectionId(RetireConnectionIdFrame),
    PathChallenge(PathChallengeFrame),
    PathResponse(PathResponseFrame),
    ConnectionClose(ConnectionCloseFrame),
    HandshakeDone,
}

impl Frame {
    /// RFC 9000 §13.2: any frame other than ACK, PADDING or
    /// CONNECTION_CLOSE elicits an ack from the peer. Grounded on
    /// `aws-s2n-quic`'s `frame::ack_elicitation`.
    pub fn is_ack_eliciting(&self) -> bool {
        !matches!(self, Frame::Ack(_) | Frame::Padding | Frame::ConnectionClose(_))
    }

    /// RFC 9002 §2: packets containing only ACK/PADDING/CONNECTION_CLOSE
    /// frames are not counted for congestion control purposes. Grounded on
    /// `aws-s2n-quic`'s `frame::congestion_controlled`.
    pub fn is_congestion_controlled(&self) -> bool {
        !matches!(self, Frame::Ack(_) | Frame::Padding | Frame::ConnectionClose(_))
    }

    /// Encoded size of this frame, used by the retransmission tracker and
    /// the control-frame queue to decide whether a frame fits the
    /// remaining packet capacity.
    pub fn wire_len(&self) -> usize {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Frame::Padding => VarInt::from_u32(FrameType::PADDING as u32).encode(buf),
            Frame::Ping => VarInt::from_u32(FrameType::PING as u32).encode(buf),
            Frame::Ack(f) => f.encode(f.ecn_counts.is_some(), buf),
            Frame::ResetStream(f) => f.encode(buf),
            Frame::StopSending(f) => f.encode(buf),
            Frame::Crypto(f) => f.encode(buf),
            Frame::NewToken(f) => f.encode(buf),
            Frame::Stream(f) => f.encode(buf),
            Frame::MaxData(f) => f.encode(buf),
            Frame::MaxStreamData(f) => f.encode(buf),
            Frame::MaxStreams(f) => f.encode(buf),
            Frame::DataBlocked(f) => f.encode(buf),
            Frame::StreamDataBlocked(f) => f.encode(buf),
            Frame::NewConnectionId(f) => f.encode(buf),
            Frame::RetireConnectionId(f) => f.encode(buf),
            Frame::PathChallenge(f) => f.encode(buf),
            Frame::PathResponse(f) => f.encode(buf),
            Frame::ConnectionClose(f) => f.encode(buf),
            Frame::HandshakeDone => VarInt::from_u32(FrameType::HANDSHAKE_DONE as u32).encode(buf),
        }
    }

    /// Parses exactly one frame from the front of `buf`. Unknown frame
    /// types are reported as `NotImplemented` so the caller can skip them
    /// without tearing down the session.
    pub fn decode(buf: &mut impl Buf) -> QuicResult<Self> {
        let type_varint = VarInt::decode(buf)?.get();

        if (0x08..=0x0f).contains(&type_varint) {
            return Ok(Frame::Stream(StreamFrame::decode(type_varint as u8, buf)?));
        }

        Ok(match type_varint {
            0x00 => Frame::Padding,
            0x01 => Frame::Ping,
            0x02 => Frame::Ack(AckFrame::decode(false, buf)?),
            0x03 => Frame::Ack(AckFrame::decode(true, buf)?),
            0x04 => Frame::ResetStream(ResetStreamFrame::decode(buf)?),
            0x05 => Frame::StopSending(StopSendingFrame::decode(buf)?),
            0x06 => Frame::Crypto(CryptoFrame::decode(buf)?),
            0x07 => Frame::NewToken(NewTokenFrame::decode(buf)?),
            0x10 => Frame::MaxData(MaxDataFrame::decode(buf)?),
            0x11 => Frame::MaxStreamData(MaxStreamDataFrame::decode(buf)?),
            0x12 => Frame::MaxStreams(MaxStreamsFrame::decode(StreamKind::Bidi, buf)?),
            0x13 => Frame::MaxStreams(MaxStreamsFrame::decode(StreamKind::Uni, buf)?),
            0x14 => Frame::DataBlocked(DataBlockedFrame::decode(buf)?),
            0x15 => Frame::StreamDataBlocked(StreamDataBlockedFrame::decode(buf)?),
            0x18 => Frame::NewConnectionId(NewConnectionIdFrame::decode(buf)?),
            0x19 => Frame::RetireConnectionId(RetireConnectionIdFrame::decode(buf)?),
            0x1a => Frame::PathChallenge(PathChallengeFrame::decode(buf)?),
            0x1b => Frame::PathResponse(PathResponseFrame::decode(buf)?),
            0x1c => Frame::ConnectionClose(ConnectionCloseFrame::decode(false, buf)?),
            0x1d => Frame::ConnectionClose(ConnectionCloseFrame::decode(true, buf)?),
            0x1e => Frame::HandshakeDone,
            // STREAMS_BLOCKED_{BIDI,UNI} (0x16/0x17) and any reserved opcode
            // are not acted on; the caller skips the frame and moves on.
            0x16 | 0x17 => return Err(QuicError::NotImplemented("streams_blocked frame")),
            _ => return Err(QuicError::NotImplemented("unknown frame type")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::id::StreamId;

    fn round_trip(frame: Frame) {
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let mut cursor = &buf[..];
        let decoded = Frame::decode(&mut cursor).unwrap();
        assert_eq!(decoded, frame);
        assert!(cursor.is_empty(), "decode should consume the whole frame");
    }

    #[test]
    fn every_frame_type_round_trips() {
        round_trip(Frame::Padding);
        round_trip(Frame::Ping);
        round_trip(Frame::HandshakeDone);
        round_trip(Frame::Ack(AckFrame {
            largest_acked: 5,
            ack_delay: 1,
            first_ack_range: 2,
            ack_ranges: vec![],
            ecn_counts: None,
        }));
        round_trip(Frame::Crypto(CryptoFrame { offset: 0, data: vec![1, 2, 3] }));
        round_trip(Frame::Stream(StreamFrame {
            stream_id: StreamId::from_u64(0),
            offset: 0,
            fin: true,
            data: b"ping\0".to_vec(),
            filled: false,
        }));
        round_trip(Frame::MaxData(MaxDataFrame { maximum_data: 1000 }));
        round_trip(Frame::MaxStreamData(MaxStreamDataFrame {
            stream_id: StreamId::from_u64(4),
            maximum_stream_data: 500,
        }));
        round_trip(Frame::MaxStreams(MaxStreamsFrame { kind: StreamKind::Uni, maximum_streams: 10 }));
        round_trip(Frame::DataBlocked(DataBlockedFrame { maximum_data: 900 }));
        round_trip(Frame::StreamDataBlocked(StreamDataBlockedFrame {
            stream_id: StreamId::from_u64(8),
            maximum_stream_data: 400,
        }));
        round_trip(Frame::RetireConnectionId(RetireConnectionIdFrame { sequence_number: 3 }));
        round_trip(Frame::PathChallenge(PathChallengeFrame { data: [9; 8] }));
        round_trip(Frame::PathResponse(PathResponseFrame { data: [7; 8] }));
        round_trip(Frame::ConnectionClose(ConnectionCloseFrame {
            is_application_error: false,
            error_code: 1,
            frame_type: 2,
            reason: b"bye".to_vec(),
        }));
        round_trip(Frame::ResetStream(ResetStreamFrame {
            stream_id: StreamId::from_u64(4),
            application_error_code: 1,
            final_size: 100,
        }));
        round_trip(Frame::StopSending(StopSendingFrame {
            stream_id: StreamId::from_u64(4),
            application_error_code: 1,
        }));
        round_trip(Frame::NewToken(NewTokenFrame { token: vec![1, 2, 3, 4] }));
    }

    #[test]
    fn unknown_type_is_skipped_not_fatal() {
        let mut buf = Vec::new();
        VarInt::from_u32(0x21).encode(&mut buf);
        let mut cursor = &buf[..];
        let err = Frame::decode(&mut cursor).unwrap_err();
        assert!(matches!(err, QuicError::NotImplemented(_)));
    }
}

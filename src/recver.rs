//! The receive half of `Session`: turns an inbound datagram into decrypted
//! frames and folds them into every affected module, grounded on
//! `original_source/src/modules/recver.c`. The original's queue-plus-worker
//! thread collapses here into a plain method called directly off the
//! transport's `recv_from` loop, since there's only one cooperative task per
//! session rather than a `process()` callback invoked by a scheduler.

use tracing::{debug, trace, warn};

use crate::crypto::KeyEvent;
use crate::error::{QuicError, QuicResult};
use crate::frame::Frame;
use crate::packet::{self, EncryptionLevel, Header, PacketNumberSpace};
use crate::transmission::Transmission;

use super::Session;

impl<T: Transmission> Session<T> {
    /// Entry point for one datagram read off the socket. Strips header
    /// protection, opens the AEAD payload for whichever packet-number space
    /// the header names, folds the frames in, and reacts to any handshake
    /// key transitions the pump surfaces.
    pub async fn receive_datagram(&mut self, datagram: &mut [u8], now: u64) -> QuicResult<()> {
        let dst_cid_len = self.dst_cid_len;
        let (header, truncated_pn, header_len) =
            packet::decode_and_unprotect(datagram, dst_cid_len, |level, sample| self.sealer.level(level).read_header_mask(sample))?;

        let space = match &header {
            Header::Long(h) => h.packet_type.space().ok_or(QuicError::NotImplemented("0-RTT/Retry packets"))?,
            Header::Short(_) => PacketNumberSpace::App,
        };

        if self.config.is_client && self.recv_first {
            if let Header::Long(h) = &header {
                self.peer_cid = h.src_cid.clone();
            }
        }
        self.recv_first = false;

        let largest_acked = self.spaces[space.index()].tracker.largest_acked();
        let packet_number = packet::expand_packet_number(truncated_pn, header.packet_number_len(), largest_acked);

        let (header_bytes, payload_bytes) = datagram.split_at_mut(header_len);
        let plaintext = self.sealer.level(space).open_payload(packet_number, header_bytes, payload_bytes)?;

        trace!(?space, packet_number, len = plaintext.len(), "packet decrypted");

        let is_short_header = matches!(header, Header::Short(_));
        let ack_eliciting = self.process_frames(space, &plaintext, now, is_short_header)?;

        self.spaces[space.index()].ack_generator.on_packet_received(packet_number, now, ack_eliciting);

        for event in self.sealer.pump() {
            self.on_key_event(event);
        }

        Ok(())
    }

    /// Walks every frame in a decrypted payload, dispatching each to the
    /// module it affects. Returns whether any ack-eliciting frame was seen,
    /// for the ack generator. Stops (without erroring) on an unknown frame
    /// type: the cursor can no longer be trusted to resync past it, so
    /// whatever already landed still applies.
    fn process_frames(&mut self, space: PacketNumberSpace, payload: &[u8], now: u64, is_short_header: bool) -> QuicResult<bool> {
        let mut cursor = payload;
        let mut ack_eliciting = false;

        while !cursor.is_empty() {
            let frame = match Frame::decode(&mut cursor) {
                Ok(frame) => frame,
                Err(QuicError::NotImplemented(reason)) => {
                    debug!(reason, "stopping frame walk on unrecognized frame type");
                    break;
                }
                Err(err) => return Err(err),
            };

            if frame.is_ack_eliciting() {
                ack_eliciting = true;
            }

            self.handle_frame(space, frame, now, is_short_header)?;
        }

        Ok(ack_eliciting)
    }

    fn handle_frame(&mut self, space: PacketNumberSpace, frame: Frame, now: u64, is_short_header: bool) -> QuicResult<()> {
        match frame {
            Frame::Padding | Frame::Ping => {}

            Frame::Ack(ack) => self.on_ack_frame(space, &ack, now, is_short_header),

            Frame::Crypto(crypto) => self.sealer.on_crypto_frame(space, crypto.offset, &crypto.data),

            Frame::Stream(stream_frame) => self.on_stream_frame(stream_frame, now)?,

            Frame::ResetStream(reset) => self.on_reset_stream(reset, now),

            Frame::StopSending(stop) => self.on_stop_sending(stop),

            Frame::MaxData(max_data) => self.conn_flowctrl.update_swnd(max_data.maximum_data),

            Frame::MaxStreamData(max_stream_data) => {
                if let Some(stream) = self.streams.get_mut(max_stream_data.stream_id) {
                    stream.flowctrl.update_swnd(max_stream_data.maximum_stream_data);
                }
            }

            Frame::MaxStreams(max_streams) => self.streams.on_max_streams(max_streams.kind, max_streams.maximum_streams),

            Frame::DataBlocked(_) | Frame::StreamDataBlocked(_) => {
                // Informational: the peer reports being blocked on our flow
                // control. Nothing to act on beyond what auto-tuning already
                // schedules.
            }

            Frame::NewConnectionId(new_cid) => self.migrate.on_new_connection_id(&new_cid)?,

            Frame::RetireConnectionId(retire) => self.connid_gen.on_retire_connection_id(&retire)?,

            Frame::PathChallenge(challenge) => {
                self.framer.push_ctrl_frame(Frame::PathResponse(crate::frame::PathResponseFrame { data: challenge.data }));
            }

            Frame::PathResponse(_) => {}

            Frame::ConnectionClose(reason) => {
                warn!(error_code = reason.error_code, "peer closed the connection");
                self.closed = true;
            }

            Frame::HandshakeDone => self.handshake_confirmed = true,
        }

        Ok(())
    }

    fn on_ack_frame(&mut self, space: PacketNumberSpace, ack: &crate::frame::AckFrame, now: u64, is_short_header: bool) {
        let tracker = &mut self.spaces[space.index()].tracker;
        let (acked_frames, lost_frames) = tracker.on_ack_received(ack, now, is_short_header, &mut self.rtt, self.congestion.as_mut());

        for frame in acked_frames {
            self.on_frame_acked(space, frame, ack.largest_acked);
        }
        for frame in lost_frames {
            self.on_frame_lost(space, frame);
        }
    }

    /// A frame carried by a packet the peer has now acknowledged.
    fn on_frame_acked(&mut self, space: PacketNumberSpace, frame: Frame, ack_largest_acked: u64) {
        match frame {
            Frame::Stream(s) => {
                if let Some(send) = self.streams.get_mut(s.stream_id).and_then(|stream| stream.send.as_mut()) {
                    send.on_acked(s.offset, s.data.len() as u64, s.fin);
                }
            }
            Frame::Ack(_) => self.spaces[space.index()].ack_generator.advance_ignore_threshold(ack_largest_acked),
            _ => {}
        }
    }

    /// A frame carried by a packet now declared lost. Stream data rewinds
    /// its send cursor and re-activates itself in the framer; everything
    /// else is simply requeued verbatim, per the tracker's own
    /// retransmission-queue contract.
    fn on_frame_lost(&mut self, space: PacketNumberSpace, frame: Frame) {
        match &frame {
            Frame::Stream(s) => {
                if let Some(send) = self.streams.get_mut(s.stream_id).and_then(|stream| stream.send.as_mut()) {
                    send.on_lost(s.offset, s.fin);
                }
                self.framer.add_active(s.stream_id);
            }
            Frame::Ack(_) | Frame::Padding => {}
            _ => self.spaces[space.index()].tracker.queue_retransmission(frame),
        }
    }

    fn on_stream_frame(&mut self, frame: crate::frame::StreamFrame, now: u64) -> QuicResult<()> {
        let id = frame.stream_id;
        let len = frame.data.len() as u64;
        let end = frame.offset + len;

        let stream = self.streams.get_or_create_inbound(id)?;
        stream
            .recv
            .as_mut()
            .ok_or(QuicError::BadFormat("stream frame on a send-only stream"))?
            .on_stream_frame(frame.offset, &frame.data, frame.fin)?;
        stream.flowctrl.update_rwnd(frame.offset, len, frame.fin).map_err(QuicError::BadFormat)?;

        if end > stream.highest_recv_offset {
            let delta = end - stream.highest_recv_offset;
            stream.highest_recv_offset = end;
            self.conn_recv_total += delta;
            self.conn_flowctrl.on_bytes_received(self.conn_recv_total).map_err(QuicError::BadFormat)?;
        }

        self.streams.mark_if_destroyable(id, now);
        Ok(())
    }

    fn on_reset_stream(&mut self, reset: crate::frame::ResetStreamFrame, now: u64) {
        let smoothed_rtt = self.rtt.smoothed_rtt();
        if let Some(recv) = self.streams.get_mut(reset.stream_id).and_then(|stream| stream.recv.as_mut()) {
            let unread = recv.abandon();
            self.conn_flowctrl.abandon(unread, now, smoothed_rtt);
        }
    }

    /// Simplified handling: the local send side just stops, without
    /// emitting a `RESET_STREAM` of our own back to the peer (full
    /// bidirectional abort is out of scope here).
    fn on_stop_sending(&mut self, stop: crate::frame::StopSendingFrame) {
        if let Some(send) = self.streams.get_mut(stop.stream_id).and_then(|stream| stream.send.as_mut()) {
            send.close();
        }
        self.framer.add_active(stop.stream_id);
    }

    /// Reacts to a handshake key installation: drops the now-superseded
    /// space's sealer and retransmission state, and — on the server, once
    /// 1-RTT keys land — marks the handshake confirmed and schedules
    /// `HANDSHAKE_DONE`.
    fn on_key_event(&mut self, event: KeyEvent) {
        match event {
            KeyEvent::Installed(EncryptionLevel::Handshake) => {
                debug!("handshake keys installed, dropping initial space");
                self.drop_space(PacketNumberSpace::Initial);
            }
            KeyEvent::Installed(EncryptionLevel::App) => {
                debug!("application keys installed, dropping handshake space");
                self.drop_space(PacketNumberSpace::Handshake);
                if !self.config.is_client {
                    self.handshake_confirmed = true;
                    self.framer.push_ctrl_frame(Frame::HandshakeDone);
                }
            }
            KeyEvent::Installed(EncryptionLevel::Initial) => {}
        }
    }

    /// Discards a packet-number space's sealer and retransmission tracker.
    /// Subsequent `open_payload`/`read_header_mask` calls on the dropped
    /// sealer return `QuicError::Closed`, so the decode entry point drops
    /// further datagrams for that space on its own; nothing else needs
    /// resetting.
    pub(crate) fn drop_space(&mut self, level: PacketNumberSpace) {
        self.sealer.drop_level(level);
        self.spaces[level.index()].tracker.drop_space();
    }
}

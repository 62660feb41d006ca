//! The send half of `Session`: builds and transmits one datagram per
//! packet-number space, grounded on
//! `original_source/src/modules/sender.c`. The original's per-space "build
//! then flush" loop over the module table becomes a `pack_packet` per space
//! plus a `send_packets` driver that tries each space in turn and stops
//! after the first datagram goes out, since packet coalescing across
//! spaces in one UDP datagram is out of scope here.

use tracing::trace;

use crate::cid::ConnectionId;
use crate::error::QuicResult;
use crate::flowctrl::FlowControl;
use crate::frame::{DataBlockedFrame, Frame, MaxDataFrame, MaxStreamDataFrame, StreamDataBlockedFrame};
use crate::packet::{self, Header, LongHeader, LongPacketType, PacketNumberLen, PacketNumberSpace, ShortHeader};
use crate::recovery::congestion::CongestionController;
use crate::transmission::Transmission;

use super::Session;

/// Minimum payload size before sealing, RFC 9001 §5.4.2: header protection
/// sampling needs at least 4 bytes of packet number plus sample offset
/// following the packet number.
const MIN_PAYLOAD_LEN: usize = 4;
/// RFC 9000 §14.1: a client's Initial datagrams (and the datagrams carrying
/// an ack-eliciting Initial packet) must be padded to this size.
const MIN_INITIAL_DATAGRAM_LEN: usize = 1200;
const QUIC_VERSION_1: u32 = 1;

impl<T: Transmission> Session<T> {
    /// Drains every module with a pending outgoing control frame into the
    /// framer's queue: new/retired connection IDs, migration retirements,
    /// and flow-control window updates / blocked notifications for the
    /// connection and every stream.
    fn drain_control_frames(&mut self) {
        for frame in self.connid_gen.take_pending_frames() {
            self.framer.push_ctrl_frame(frame);
        }
        for frame in self.migrate.take_pending_frames() {
            self.framer.push_ctrl_frame(frame);
        }

        if let Some(maximum_data) = self.conn_flowctrl.take_window_update() {
            self.framer.push_ctrl_frame(Frame::MaxData(MaxDataFrame { maximum_data }));
        }
        if self.conn_flowctrl.newly_blocked() {
            let maximum_data = self.conn_flowctrl.swnd_limit();
            self.framer.push_ctrl_frame(Frame::DataBlocked(DataBlockedFrame { maximum_data }));
        }

        let mut stream_frames = Vec::new();
        for stream in self.streams.iter_mut() {
            if let Some(maximum_stream_data) = stream.flowctrl.take_window_update() {
                stream_frames.push(Frame::MaxStreamData(MaxStreamDataFrame { stream_id: stream.id, maximum_stream_data }));
            }
            if stream.flowctrl.newly_blocked() {
                let maximum_stream_data = stream.flowctrl.swnd_limit();
                stream_frames.push(Frame::StreamDataBlocked(StreamDataBlockedFrame { stream_id: stream.id, maximum_stream_data }));
            }
        }
        for frame in stream_frames {
            self.framer.push_ctrl_frame(frame);
        }
    }

    /// Whether `space` has anything at all worth sending right now.
    fn has_pending(&self, space: PacketNumberSpace) -> bool {
        let s = &self.spaces[space.index()];
        if s.tracker.has_retransmission() || s.ack_generator.should_send() {
            return true;
        }
        match space {
            PacketNumberSpace::Initial | PacketNumberSpace::Handshake => self.sealer.level(space).has_pending_crypto(),
            PacketNumberSpace::App => self.framer.has_pending(),
        }
    }

    fn build_header(&mut self, space: PacketNumberSpace, pn_len: PacketNumberLen) -> Header {
        match space {
            PacketNumberSpace::Initial => Header::Long(LongHeader::new(
                LongPacketType::Initial,
                QUIC_VERSION_1,
                self.peer_cid.clone(),
                self.connid_gen.current_cid(),
                pn_len,
            )),
            PacketNumberSpace::Handshake => Header::Long(LongHeader::new(
                LongPacketType::Handshake,
                QUIC_VERSION_1,
                self.peer_cid.clone(),
                self.connid_gen.current_cid(),
                pn_len,
            )),
            PacketNumberSpace::App => Header::Short(ShortHeader::new(false, false, self.peer_cid.clone(), pn_len)),
        }
    }

    /// Fills one packet's payload up to `capacity` bytes in RFC 9000 §12.3
    /// priority order: acks first, then lost data, then fresh handshake
    /// bytes, then queued control frames, then stream data. Returns the
    /// frames used (for the retransmission tracker) and whether the payload
    /// carries anything ack-eliciting / congestion-controlled.
    fn fill_payload(&mut self, space: PacketNumberSpace, capacity: usize, now: u64) -> (Vec<u8>, Vec<Frame>) {
        let mut payload = Vec::new();
        let mut frames = Vec::new();

        if self.spaces[space.index()].ack_generator.should_send() {
            if let Some(ack) = self.spaces[space.index()].ack_generator.generate(now) {
                let frame = Frame::Ack(ack);
                if frame.wire_len() <= capacity.saturating_sub(payload.len()) {
                    frame.encode(&mut payload);
                    frames.push(frame);
                }
            }
        }

        while let Some(frame) = self.spaces[space.index()].tracker.pop_retransmission(capacity.saturating_sub(payload.len())) {
            frame.encode(&mut payload);
            frames.push(frame);
        }

        if matches!(space, PacketNumberSpace::Initial | PacketNumberSpace::Handshake) {
            while let Some(frame) = self.sealer.level_mut(space).append_crypto_frame(capacity.saturating_sub(payload.len())) {
                frame.encode(&mut payload);
                frames.push(frame);
            }
        }

        while let Some(frame) = self.framer.append_ctrl_frame(capacity.saturating_sub(payload.len())) {
            frame.encode(&mut payload);
            frames.push(frame);
        }

        if space == PacketNumberSpace::App {
            while let Some(frame) = self.framer.append_stream_frame(capacity.saturating_sub(payload.len()), &mut self.streams) {
                frame.encode(&mut payload);
                frames.push(frame);
            }
        }

        (payload, frames)
    }

    /// Builds, seals and header-protects one datagram for `space`. Returns
    /// `None` if there's nothing to send.
    fn pack_packet(&mut self, space: PacketNumberSpace, now: u64) -> Option<Vec<u8>> {
        let pn = self.spaces[space.index()].pn_generator.peek();
        let largest_acked = self.spaces[space.index()].tracker.largest_acked();
        let pn_len = PacketNumberLen::for_packet_number(pn, largest_acked);

        let (mut payload, frames) = self.fill_payload(space, 1200, now);
        if payload.is_empty() {
            return None;
        }
        while payload.len() < MIN_PAYLOAD_LEN {
            payload.push(0);
        }

        let header = self.build_header(space, pn_len);
        let is_long = matches!(header, Header::Long(_));
        let header_len = header.header_len();

        let mut datagram = Vec::with_capacity(header_len + pn_len.bytesize() + payload.len() + 16);
        header.encode(&mut datagram);
        pn_len.encode(pn, &mut datagram);
        datagram.extend_from_slice(&payload);

        let (header_bytes, sealed_region) = datagram.split_at_mut(header_len + pn_len.bytesize());
        let mut sealed_payload = sealed_region.to_vec();
        if self.sealer.level(space).seal_payload(pn, header_bytes, &mut sealed_payload).is_err() {
            return None;
        }
        datagram.truncate(header_len + pn_len.bytesize());
        datagram.extend_from_slice(&sealed_payload);

        if space == PacketNumberSpace::Initial && datagram.len() < MIN_INITIAL_DATAGRAM_LEN {
            datagram.resize(MIN_INITIAL_DATAGRAM_LEN, 0);
        }

        let sample_offset = header_len + pn_len.bytesize() + 4;
        if datagram.len() < sample_offset + 16 {
            datagram.resize(sample_offset + 16, 0);
        }
        let sample = datagram[sample_offset..sample_offset + 16].to_vec();
        let mask = self.sealer.level(space).write_header_mask(&sample).ok()?;
        packet::protect_header(&mut datagram, header_len, pn_len.bytesize(), is_long, mask);

        let size = datagram.len() as u64;
        let in_flight = frames.iter().any(Frame::is_congestion_controlled);

        self.spaces[space.index()].tracker.on_packet_sent(pn, now, size, in_flight, frames, &self.rtt);
        if in_flight {
            self.congestion.on_packet_sent(pn, size, in_flight);
            self.pacer.on_packet_sent(now, size, self.congestion.cwnd(), self.rtt.smoothed_rtt());
        }
        self.spaces[space.index()].pn_generator.generate();

        trace!(?space, pn, size, "packet sent");
        Some(datagram)
    }

    /// Drains control frames, then tries each packet-number space in turn
    /// (Initial, Handshake, App) and sends the first one that produces a
    /// datagram. Returns whether anything was sent.
    pub async fn send_packets(&mut self, now: u64) -> QuicResult<bool> {
        self.drain_control_frames();

        for space in PacketNumberSpace::ALL {
            if self.sealer.level(space).is_dropped() {
                continue;
            }
            if !self.has_pending(space) {
                continue;
            }
            if space == PacketNumberSpace::App {
                let unacked = self.spaces[space.index()].tracker.unacked_len();
                if !self.congestion.allow_send(unacked) {
                    continue;
                }
                if !self.pacer.has_budget(now, self.congestion.cwnd(), self.rtt.smoothed_rtt()) {
                    continue;
                }
            }

            let Some(datagram) = self.pack_packet(space, now) else { continue };
            self.transmission.send_to(&datagram, self.peer_addr).await?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Earliest time any packet-number space wants another send pass: the
    /// soonest of a loss/PTO alarm, an ack-delay timer, or the pacer's next
    /// refill.
    pub fn next_deadline(&self) -> Option<u64> {
        let mut deadline = None;
        let merge = |deadline: &mut Option<u64>, candidate: Option<u64>| {
            if let Some(t) = candidate {
                *deadline = Some(deadline.map_or(t, |d: u64| d.min(t)));
            }
        };

        for space in PacketNumberSpace::ALL {
            let s = &self.spaces[space.index()];
            merge(&mut deadline, s.tracker.alarm());
            merge(&mut deadline, s.ack_generator.alarm());
        }
        merge(&mut deadline, self.pacer.next_send_time(self.congestion.cwnd(), self.rtt.smoothed_rtt()));

        deadline
    }

    /// Address we currently expect to reach the peer at, exposed so callers
    /// can rebind after a migration.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.peer_cid
    }
}

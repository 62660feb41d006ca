//! Framer: the pool of stream ids with pending data plus the queue of
//! ready control frames, grounded on
//! `original_source/src/modules/framer.c`.

use std::collections::{HashSet, VecDeque};

use crate::flowctrl::FlowControl;
use crate::frame::Frame;
use crate::stream::{StreamId, StreamManager};

#[derive(Debug, Default)]
pub struct Framer {
    active: VecDeque<StreamId>,
    active_set: HashSet<StreamId>,
    ctrl_queue: VecDeque<Frame>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` as having data ready for the next outgoing packet. A
    /// stream already active is not duplicated.
    pub fn add_active(&mut self, id: StreamId) {
        if self.active_set.insert(id) {
            self.active.push_back(id);
        }
    }

    pub fn push_ctrl_frame(&mut self, frame: Frame) {
        self.ctrl_queue.push_back(frame);
    }

    pub fn has_pending(&self) -> bool {
        !self.active.is_empty() || !self.ctrl_queue.is_empty()
    }

    /// Pops one active stream id and asks it to generate a frame fitting
    /// `capacity` bytes. Re-queues the stream if it still has data left
    /// after generating; drops it from the active set otherwise (or if the
    /// stream has since been removed).
    pub fn append_stream_frame(&mut self, capacity: usize, streams: &mut StreamManager) -> Option<Frame> {
        let id = self.active.pop_front()?;
        self.active_set.remove(&id);

        let Some(stream) = streams.get_mut(id) else { return None };
        let Some(send) = stream.send.as_mut() else { return None };

        let swnd = stream.flowctrl.get_swnd();
        let frame = send.generate(capacity, swnd);

        if send.unsent_len() > 0 || frame.is_none() {
            // Either nothing fit this round or there's more left; keep it
            // active so a later, larger packet can pick it up again.
            if self.active_set.insert(id) {
                self.active.push_back(id);
            }
        }

        frame.map(Frame::Stream)
    }

    /// Pops one pending control frame whose encoded size fits in `capacity`
    /// bytes, without disturbing the order of frames that don't fit yet.
    pub fn append_ctrl_frame(&mut self, capacity: usize) -> Option<Frame> {
        let front = self.ctrl_queue.front()?;
        let mut buf = Vec::new();
        front.encode(&mut buf);
        if buf.len() > capacity {
            return None;
        }
        self.ctrl_queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Direction, Side};

    #[test]
    fn active_stream_is_not_duplicated() {
        let mut framer = Framer::new();
        let id = StreamId::from_u64(0);
        framer.add_active(id);
        framer.add_active(id);
        assert_eq!(framer.active.len(), 1);
    }

    #[test]
    fn generates_and_requeues_until_drained() {
        let mut framer = Framer::new();
        let mut streams = StreamManager::new(Side::Client, 4096, 8192, 4096, 1_000_000);
        let id = streams.open(Direction::Bidi).unwrap();
        streams.get_mut(id).unwrap().send.as_mut().unwrap().queue(b"hello world");
        streams.get_mut(id).unwrap().send.as_mut().unwrap().close();
        framer.add_active(id);

        // A tiny capacity can't fit even the header; stream stays active.
        assert!(framer.append_stream_frame(2, &mut streams).is_none());
        assert!(framer.has_pending());

        let frame = framer.append_stream_frame(1200, &mut streams).unwrap();
        assert!(matches!(frame, Frame::Stream(_)));
        assert!(!framer.has_pending());
    }

    #[test]
    fn ctrl_frame_waits_for_capacity() {
        let mut framer = Framer::new();
        framer.push_ctrl_frame(Frame::Ping);
        assert!(framer.append_ctrl_frame(0).is_none());
        assert!(framer.append_ctrl_frame(10).is_some());
    }
}

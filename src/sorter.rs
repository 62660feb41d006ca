//! Out-of-order byte sorter: absorbs arbitrary-offset writes and exposes a
//! single in-order consumable byte stream. Used by the stream layer's recv
//! side and by the sealer's per-level handshake read buffers.

use std::collections::HashMap;

/// Maximum offset a sorter will ever accept; bounds the initial gap.
pub const MAX_SIZE: u64 = (1u64 << 63) - 1;

const CLUSTER_SIZE: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Gap {
    start: u64,
    end: u64, // inclusive
}

/// An out-of-order byte buffer with in-order consumption, backed by fixed
/// 4 KiB clusters and an ordered list of unreceived gaps.
#[derive(Debug)]
pub struct Sorter {
    clusters: HashMap<u64, Box<[u8; CLUSTER_SIZE as usize]>>,
    gaps: Vec<Gap>,
    avail_size: u64,
    readed_size: u64,
}

impl Default for Sorter {
    fn default() -> Self {
        Self::new()
    }
}

impl Sorter {
    pub fn new() -> Self {
        Self {
            clusters: HashMap::new(),
            gaps: vec![Gap { start: 0, end: MAX_SIZE }],
            avail_size: 0,
            readed_size: 0,
        }
    }

    /// Splices `data` into the sorter at `offset`. A no-op if `data` is
    /// empty or entirely inside an already-covered region.
    pub fn write(&mut self, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut start = offset;
        let end = offset + data.len() as u64 - 1;

        let Some(start_idx) = self.gaps.iter().position(|g| end >= g.start && start <= g.end) else {
            return;
        };
        if start < self.gaps[start_idx].start {
            start = self.gaps[start_idx].start;
        }

        let mut end_idx = start_idx;
        while end > self.gaps[end_idx].end {
            let Some(next) = self.gaps.get(end_idx + 1) else { break };
            if end < next.start {
                break;
            }
            end_idx += 1;
        }
        let clipped_end = end.min(self.gaps[end_idx].end);

        // Remove the fully-covered gaps between start_idx and end_idx, and
        // shrink/split the boundary gaps so the [start, clipped_end] range
        // is no longer represented as a gap.
        let start_gap = self.gaps[start_idx];
        let end_gap = self.gaps[end_idx];

        let mut replacement = Vec::new();
        if start_gap.start < start {
            replacement.push(Gap { start: start_gap.start, end: start - 1 });
        }
        if clipped_end < end_gap.end {
            replacement.push(Gap { start: clipped_end + 1, end: end_gap.end });
        }
        self.gaps.splice(start_idx..=end_idx, replacement);

        self.avail_size = self.gaps.first().map(|g| g.start).unwrap_or(MAX_SIZE);

        self.write_cluster(start, &data[(start - offset) as usize..(clipped_end - offset + 1) as usize]);
    }

    fn write_cluster(&mut self, mut off: u64, mut data: &[u8]) {
        while !data.is_empty() {
            let cluster_key = off / CLUSTER_SIZE;
            let cluster_off = (off % CLUSTER_SIZE) as usize;
            let cluster_len = (CLUSTER_SIZE as usize - cluster_off).min(data.len());

            let cluster = self
                .clusters
                .entry(cluster_key)
                .or_insert_with(|| Box::new([0u8; CLUSTER_SIZE as usize]));
            cluster[cluster_off..cluster_off + cluster_len].copy_from_slice(&data[..cluster_len]);

            off += cluster_len as u64;
            data = &data[cluster_len..];
        }
    }

    fn read_cluster(&mut self, consume: bool, len: u64, out: &mut Vec<u8>) -> u64 {
        let mut off = self.readed_size;
        let mut remaining = len;
        let mut read = 0u64;

        while remaining != 0 {
            let cluster_key = off / CLUSTER_SIZE;
            let cluster_off = (off % CLUSTER_SIZE) as usize;
            let cluster_len = (CLUSTER_SIZE as usize - cluster_off).min(remaining as usize) as u64;

            let Some(cluster) = self.clusters.get(&cluster_key) else {
                return read;
            };
            out.extend_from_slice(&cluster[cluster_off..cluster_off + cluster_len as usize]);

            off += cluster_len;
            remaining -= cluster_len;
            read += cluster_len;

            if consume && cluster_key != off / CLUSTER_SIZE {
                self.clusters.remove(&cluster_key);
            }
        }
        read
    }

    /// Consumes up to `len` bytes from the front of the readable prefix.
    pub fn read(&mut self, len: u64) -> Vec<u8> {
        let len = len.min(self.readable());
        let mut out = Vec::with_capacity(len as usize);
        let read = self.read_cluster(true, len, &mut out);
        self.readed_size += read;
        out
    }

    /// Like `read` but does not advance the read cursor.
    pub fn peek(&mut self, len: u64) -> Vec<u8> {
        let len = len.min(self.readable());
        let mut out = Vec::with_capacity(len as usize);
        self.read_cluster(false, len, &mut out);
        out
    }

    pub fn readable(&self) -> u64 {
        self.avail_size.saturating_sub(self.readed_size)
    }

    pub fn readed_size(&self) -> u64 {
        self.readed_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_bytes(s: &str) -> Vec<u8> {
        (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap()).collect()
    }

    #[test]
    fn out_of_order_writes_produce_in_order_reads() {
        // Third write's first two bytes (0x10, 0x20) land on offsets 8-9,
        // which the second write already claimed, so only its last two
        // bytes (0x30, 0x04, covering the still-open 10-11 gap) land.
        let mut sorter = Sorter::new();
        sorter.write(12, &hex_bytes("0102030405060708090A"));
        sorter.write(0, &hex_bytes("05060708090A0B0C0D0E"));
        sorter.write(8, &hex_bytes("10203004"));

        assert_eq!(sorter.readable(), 22);
        let out = sorter.read(20);
        assert_eq!(out, hex_bytes("05060708090A0B0C0D0E30040102030405060708"));
    }

    #[test]
    fn write_zero_len_is_noop() {
        let mut sorter = Sorter::new();
        sorter.write(5, &[]);
        assert_eq!(sorter.readable(), 0);
    }

    #[test]
    fn overlapping_rewrite_keeps_first_writer() {
        let mut sorter = Sorter::new();
        sorter.write(0, b"AAAA");
        sorter.write(0, b"BBBB");
        assert_eq!(sorter.read(4), b"AAAA");
    }

    #[test]
    fn write_spanning_multiple_gaps_coalesces() {
        let mut sorter = Sorter::new();
        sorter.write(0, b"A");
        sorter.write(2, b"C");
        sorter.write(0, b"ABC");
        assert_eq!(sorter.readable(), 3);
        assert_eq!(sorter.read(3), b"ABC");
    }

    #[test]
    fn peek_does_not_advance() {
        let mut sorter = Sorter::new();
        sorter.write(0, b"hello");
        let peeked = sorter.peek(5);
        assert_eq!(peeked, b"hello");
        assert_eq!(sorter.readable(), 5);
        assert_eq!(sorter.read(5), b"hello");
        assert_eq!(sorter.readable(), 0);
    }
}

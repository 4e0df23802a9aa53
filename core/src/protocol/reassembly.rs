//! Chunk reassembly
//!
//! Accumulates link frames per message id until the buffer is complete, then
//! hands the concatenated envelope back exactly once. Chunks may arrive in
//! any order, duplicated, or not at all; only completion delivers anything.
//! Buffers that never complete are reclaimed by [`Reassembler::evict_stale`]
//! or a [`Reassembler::clear`] on cache expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::protocol::chunk::Chunk;
use crate::protocol::constants::MAX_MESSAGE_SIZE;

/// Per-message accumulator
struct Buffer {
    chunks: HashMap<u16, Vec<u8>>,
    /// Total chunk count; 0 until the last-flagged chunk fixes it
    total: usize,
    /// Sum of stored chunk data, to bound memory
    size: usize,
    last_update: Instant,
}

impl Buffer {
    fn new() -> Self {
        Self {
            chunks: HashMap::new(),
            total: 0,
            size: 0,
            last_update: Instant::now(),
        }
    }

    fn is_complete(&self) -> bool {
        self.total > 0
            && self.chunks.len() >= self.total
            && (0..self.total).all(|i| self.chunks.contains_key(&(i as u16)))
    }

    fn into_payload(mut self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.size);
        for i in 0..self.total {
            payload.extend_from_slice(&self.chunks.remove(&(i as u16)).expect("index present"));
        }
        payload
    }
}

/// Reassembles chunked envelopes arriving over the unreliable link
pub struct Reassembler {
    buffers: HashMap<[u8; 2], Buffer>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }

    /// Feed one raw link frame. Returns the reassembled envelope when this
    /// frame completes a message, exactly once per message id.
    ///
    /// Malformed frames are dropped silently; the link is expected to
    /// deliver garbage occasionally and that must never surface as a fault.
    pub fn handle(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        let chunk = match Chunk::parse(frame) {
            Some(chunk) => chunk,
            None => {
                debug!("dropping short link frame ({} bytes)", frame.len());
                return None;
            }
        };

        let Chunk {
            message_id,
            sequence,
            is_last,
            data,
        } = chunk;

        let buffer = self.buffers.entry(message_id).or_insert_with(Buffer::new);
        buffer.last_update = Instant::now();

        // Only the last-flagged chunk reveals the total, whenever it arrives.
        if is_last {
            buffer.total = sequence as usize + 1;
        }

        // Duplicates overwrite harmlessly.
        if let Some(old) = buffer.chunks.insert(sequence, data) {
            buffer.size -= old.len();
        }
        buffer.size += buffer.chunks[&sequence].len();

        if buffer.size > MAX_MESSAGE_SIZE {
            warn!(
                message_id = ?message_id,
                "dropping oversized reassembly buffer ({} bytes)",
                buffer.size
            );
            self.buffers.remove(&message_id);
            return None;
        }

        if buffer.is_complete() {
            let buffer = self.buffers.remove(&message_id).expect("buffer present");
            debug!(
                message_id = ?message_id,
                chunks = buffer.total,
                "reassembled message"
            );
            return Some(buffer.into_payload());
        }

        None
    }

    /// Drop all in-flight buffers (cache clear / message expiry)
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Evict buffers that have not seen a chunk for `max_age`. Returns the
    /// number of buffers dropped.
    pub fn evict_stale(&mut self, max_age: Duration) -> usize {
        let before = self.buffers.len();
        self.buffers
            .retain(|_, buffer| buffer.last_update.elapsed() < max_age);
        let evicted = before - self.buffers.len();
        if evicted > 0 {
            debug!("evicted {} stalled reassembly buffers", evicted);
        }
        evicted
    }

    /// Number of in-flight (incomplete) messages
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::chunk::fragment;

    fn frames(payload: &[u8], max: usize) -> Vec<Vec<u8>> {
        fragment(payload, max).iter().map(|c| c.to_bytes()).collect()
    }

    fn frames_with_id(payload: &[u8], max: usize, id: [u8; 2]) -> Vec<Vec<u8>> {
        fragment(payload, max)
            .into_iter()
            .map(|mut c| {
                c.message_id = id;
                c.to_bytes()
            })
            .collect()
    }

    #[test]
    fn test_in_order_reassembly() {
        let mut r = Reassembler::new();
        let frames = frames(b"ABCDEFGHI", 4);

        assert_eq!(r.handle(&frames[0]), None);
        assert_eq!(r.handle(&frames[1]), None);
        assert_eq!(r.handle(&frames[2]), Some(b"ABCDEFGHI".to_vec()));
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_last_chunk_first() {
        // Concrete scenario: 9 bytes at MTU 4, delivered 2, 0, 1.
        let mut r = Reassembler::new();
        let frames = frames(b"ABCDEFGHI", 4);

        assert_eq!(r.handle(&frames[2]), None);
        assert_eq!(r.handle(&frames[0]), None);
        assert_eq!(r.handle(&frames[1]), Some(b"ABCDEFGHI".to_vec()));
    }

    #[test]
    fn test_any_permutation() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(10 * 13).collect();
        let frames = frames(&payload, 13);
        assert_eq!(frames.len(), 10);

        // Reverse order and a rotated order both complete to the original.
        for order in [
            (0..frames.len()).rev().collect::<Vec<_>>(),
            (0..frames.len()).map(|i| (i + 7) % frames.len()).collect(),
        ] {
            let mut r = Reassembler::new();
            let mut result = None;
            for &i in &order {
                let out = r.handle(&frames[i]);
                assert!(
                    result.is_none() || out.is_none(),
                    "completed more than once"
                );
                result = result.or(out);
            }
            assert_eq!(result, Some(payload.clone()));
        }
    }

    #[test]
    fn test_duplicate_chunks_are_idempotent() {
        let mut r = Reassembler::new();
        let frames = frames(b"ABCDEFGHI", 4);

        assert_eq!(r.handle(&frames[0]), None);
        assert_eq!(r.handle(&frames[0]), None);
        assert_eq!(r.handle(&frames[1]), None);
        assert_eq!(r.handle(&frames[1]), None);
        assert_eq!(r.handle(&frames[2]), Some(b"ABCDEFGHI".to_vec()));
    }

    #[test]
    fn test_completion_exactly_once() {
        let mut r = Reassembler::new();
        let frames = frames(b"ABCDEFGHI", 4);

        for frame in &frames {
            r.handle(frame);
        }

        // Late duplicates start a fresh buffer; no second delivery until
        // that buffer is itself complete.
        assert_eq!(r.handle(&frames[0]), None);
        assert_eq!(r.pending(), 1);
        assert_eq!(r.handle(&frames[1]), None);
        assert_eq!(r.handle(&frames[2]), Some(b"ABCDEFGHI".to_vec()));
    }

    #[test]
    fn test_single_chunk_message() {
        let mut r = Reassembler::new();
        let frames = frames(b"tiny", 120);
        assert_eq!(frames.len(), 1);
        assert_eq!(r.handle(&frames[0]), Some(b"tiny".to_vec()));
    }

    #[test]
    fn test_empty_message() {
        let mut r = Reassembler::new();
        let frames = frames(b"", 120);
        assert_eq!(r.handle(&frames[0]), Some(Vec::new()));
    }

    #[test]
    fn test_short_frames_dropped() {
        let mut r = Reassembler::new();
        assert_eq!(r.handle(&[]), None);
        assert_eq!(r.handle(&[1, 2, 3]), None);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_interleaved_messages() {
        let mut r = Reassembler::new();
        let a = frames_with_id(b"first message!", 4, [0xAA, 0x01]);
        let b = frames_with_id(b"second one", 4, [0xBB, 0x02]);

        // Interleave; each message completes independently of the other.
        assert_eq!(r.handle(&a[0]), None);
        assert_eq!(r.handle(&b[0]), None);
        assert_eq!(r.handle(&a[1]), None);
        assert_eq!(r.handle(&b[2]), None);
        assert_eq!(r.handle(&b[1]), Some(b"second one".to_vec()));
        assert_eq!(r.handle(&a[3]), None);
        assert_eq!(r.handle(&a[2]), Some(b"first message!".to_vec()));
    }

    #[test]
    fn test_clear_discards_partials() {
        let mut r = Reassembler::new();
        let frames = frames(b"ABCDEFGHI", 4);

        r.handle(&frames[0]);
        r.handle(&frames[1]);
        r.clear();
        assert_eq!(r.pending(), 0);

        // The straggler opens a new buffer that cannot complete alone.
        assert_eq!(r.handle(&frames[2]), None);
    }

    #[test]
    fn test_evict_stale() {
        let mut r = Reassembler::new();
        let frames = frames(b"ABCDEFGHI", 4);

        r.handle(&frames[0]);
        assert_eq!(r.evict_stale(Duration::from_secs(60)), 0);
        assert_eq!(r.evict_stale(Duration::ZERO), 1);
        assert_eq!(r.pending(), 0);
    }
}

//! Chunk fragmentation for the BLE link
//!
//! Chunk wire format (bit-exact, shared with the Android client):
//!
//! ```text
//! [2B messageID][2B (sequence << 1) | lastFlag, big-endian][payload]
//! ```
//!
//! Fragmentation is stateless: the same envelope can be re-fragmented at any
//! time, with a fresh random message id per call. Pacing between chunk sends
//! is the sender's concern (see the service layer).

use rand::Rng;

use crate::protocol::constants::{CHUNK_HEADER_LEN, MAX_CHUNK_COUNT};

/// One fragment of a serialized envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Message id shared by all chunks of one envelope
    pub message_id: [u8; 2],
    /// 15-bit sequence index, contiguous from 0
    pub sequence: u16,
    /// Set on exactly the final chunk; fixes the total on the receiver
    pub is_last: bool,
    pub data: Vec<u8>,
}

impl Chunk {
    /// Serialize to the link frame format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(CHUNK_HEADER_LEN + self.data.len());
        frame.extend_from_slice(&self.message_id);
        let packed = (self.sequence << 1) | (self.is_last as u16);
        frame.extend_from_slice(&packed.to_be_bytes());
        frame.extend_from_slice(&self.data);
        frame
    }

    /// Parse a link frame. Returns `None` for frames shorter than the
    /// header; malformed input from an unreliable medium is expected and
    /// must not propagate as a fault.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < CHUNK_HEADER_LEN {
            return None;
        }
        let message_id = [frame[0], frame[1]];
        let packed = u16::from_be_bytes([frame[2], frame[3]]);
        Some(Self {
            message_id,
            sequence: packed >> 1,
            is_last: packed & 1 == 1,
            data: frame[CHUNK_HEADER_LEN..].to_vec(),
        })
    }
}

/// Split an envelope into chunks of at most `max_chunk_payload` data bytes.
///
/// The empty envelope still produces a single, last-flagged chunk so the
/// receiver can complete it. Sequence numbers are contiguous from 0 and
/// exactly the final chunk carries the last flag.
///
/// Panics if the envelope needs more chunks than the 15-bit sequence space
/// holds; callers sending over the link must check
/// [`MAX_CHUNK_COUNT`]` * max_chunk_payload` first.
pub fn fragment(envelope: &[u8], max_chunk_payload: usize) -> Vec<Chunk> {
    assert!(max_chunk_payload > 0, "chunk payload size must be nonzero");

    let message_id: [u8; 2] = rand::thread_rng().gen();
    let total = envelope.len().div_ceil(max_chunk_payload).max(1);
    assert!(
        total <= MAX_CHUNK_COUNT,
        "envelope needs {} chunks (sequence space holds {})",
        total,
        MAX_CHUNK_COUNT
    );

    (0..total)
        .map(|i| {
            let start = i * max_chunk_payload;
            let end = (start + max_chunk_payload).min(envelope.len());
            Chunk {
                message_id,
                sequence: i as u16,
                is_last: i == total - 1,
                data: envelope[start..end].to_vec(),
            }
        })
        .collect()
}

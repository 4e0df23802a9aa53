//! Centralized protocol constants
//!
//! All wire-level and timing constants live here so the codec, fragmenter,
//! reassembler and cache agree on them.

/// Maximum length of the mime type and filename fields (single-byte prefix)
pub const MAX_FIELD_LEN: usize = 255;

/// Length of the sender identity digest in the envelope header
pub const SENDER_HASH_LEN: usize = 32;

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length (appended to the ciphertext)
pub const TAG_LEN: usize = 16;

/// Chunk header: 2-byte message id + 2-byte packed sequence/last-flag
pub const CHUNK_HEADER_LEN: usize = 4;

/// Default chunk payload size for the BLE link (MTU minus header overhead)
pub const DEFAULT_MAX_CHUNK_PAYLOAD: usize = 120;

/// The sequence field is 15 bits (the low bit is the last flag)
pub const MAX_CHUNK_COUNT: usize = 1 << 15;

/// Default delay between chunk transmissions, to avoid overrunning the
/// link's buffering. Tune or drop if the transport provides flow control.
pub const CHUNK_SEND_INTERVAL_MS: u64 = 20;

/// Maximum reassembled envelope size (10 MB); larger buffers are dropped
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default time a decoded message stays cached, in seconds
pub const DEFAULT_CACHE_TIME_SECS: u64 = 30;

/// Upper bound on the cache time. Kept below the point where 2-byte message
/// id reuse on the link becomes plausible within one cached message's life.
pub const MAX_CACHE_TIME_SECS: u64 = 300;

/// Default age after which an incomplete reassembly buffer is evicted
pub const REASSEMBLY_STALL_SECS: u64 = 30;

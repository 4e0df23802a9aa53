//! Wire protocol: envelope codec, chunk fragmentation and reassembly
//!
//! The envelope format is shared by both transports. The pub/sub broker
//! carries whole envelopes; the BLE link carries them as 4-byte-headered
//! chunks that the reassembler stitches back together.

pub mod chunk;
pub mod constants;
pub mod envelope;
pub mod reassembly;

pub use chunk::{fragment, Chunk};
pub use envelope::{decode, encode, DecodedMessage};
pub use reassembly::Reassembler;

//! Cryptographic primitives: group key unwrap and AEAD operations

pub mod keys;
pub mod serde_utils;

pub use keys::{hash_device_id, GroupKey};

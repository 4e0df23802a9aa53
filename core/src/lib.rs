//! HoppyShare Core - clipboard and file sharing protocol library
//!
//! This library implements the transport-agnostic pieces of HoppyShare:
//! the authenticated-encrypted envelope codec, the chunked transfer protocol
//! for the constrained BLE link, and the single-slot message cache with
//! expiry. The MQTT client and the BLE radio driver are external
//! collaborators; they hand whole envelopes (MQTT) or link frames (BLE)
//! into the [`service::HoppyshareService`] and drain outbound bytes from it.

pub mod cache;
pub mod crypto;
pub mod protocol;
pub mod service;
pub mod settings;

mod error;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Which transport produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// The always-on pub/sub broker (reliable, ordered, at-least-once)
    Mqtt,
    /// The short-range link (unordered, lossy, small MTU)
    Ble,
}

/// Provisioned device credentials: identity plus the key material needed to
/// join the group. Issued once by the backend and stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub device_id: String,
    /// The group key, RSA-OAEP-wrapped under our public key
    #[serde(with = "crypto::serde_utils::base64_bytes")]
    pub wrapped_group_key: Vec<u8>,
    /// Our RSA private key, PEM-encoded (PKCS#8 or PKCS#1)
    pub private_key_pem: String,
}

impl Credentials {
    /// Default on-disk location: `~/.hoppyshare/credentials.json`
    pub fn default_path() -> std::path::PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".hoppyshare")
            .join("credentials.json")
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Tunable service parameters
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum chunk data bytes per link frame
    pub max_chunk_payload: usize,
    /// Delay between chunk transmissions
    pub chunk_send_interval: std::time::Duration,
    /// How long a received message stays cached
    pub cache_time: std::time::Duration,
    /// Age after which an incomplete reassembly buffer is evicted
    pub reassembly_stall_timeout: std::time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        use protocol::constants::*;
        Self {
            max_chunk_payload: DEFAULT_MAX_CHUNK_PAYLOAD,
            chunk_send_interval: std::time::Duration::from_millis(CHUNK_SEND_INTERVAL_MS),
            cache_time: std::time::Duration::from_secs(DEFAULT_CACHE_TIME_SECS),
            reassembly_stall_timeout: std::time::Duration::from_secs(REASSEMBLY_STALL_SECS),
        }
    }
}

// Re-export key types for convenience
pub use cache::{CacheEvent, CachedMessage, MessageCache};
pub use crypto::GroupKey;
pub use protocol::DecodedMessage;
pub use service::{HoppyshareService, ServiceEvent};
pub use settings::Settings;

use thiserror::Error;

/// HoppyShare error types
#[derive(Error, Debug)]
pub enum Error {
    /// A length-prefixed envelope field exceeded its single-byte limit.
    /// Recoverable: the caller must truncate or reject before sending.
    #[error("{field} is {len} bytes (max 255)")]
    FieldTooLong { field: &'static str, len: usize },

    /// Wire bytes too short or otherwise unparseable.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// AEAD tag verification failed. The plaintext must never be exposed.
    #[error("message authentication failed")]
    AuthenticationFailed,

    /// The device private key could not be parsed at all.
    #[error("invalid private key: {0}")]
    KeyFormat(String),

    /// The private key parsed but is not an RSA key.
    #[error("private key is not an RSA key")]
    NotAnAsymmetricKey,

    /// RSA-OAEP unwrap of the group key failed (wrong key or corrupt blob).
    #[error("failed to unwrap group key: {0}")]
    UnwrapFailed(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to serialize/deserialize: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

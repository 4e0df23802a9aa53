//! Envelope codec
//!
//! Wire format (bit-exact, shared with the Go and Android clients):
//!
//! ```text
//! [1B mimeLen][mimeLen bytes][1B nameLen][nameLen bytes]
//! [32B senderHash][12B nonce][ciphertext + 16B tag]
//! ```
//!
//! The header (everything before the nonce) travels in the clear but is fed
//! to AES-256-GCM as additional authenticated data, so tampering with the
//! mime type, filename or sender hash invalidates the tag.

use crate::crypto::{hash_device_id, GroupKey};
use crate::protocol::constants::{MAX_FIELD_LEN, NONCE_LEN, SENDER_HASH_LEN, TAG_LEN};
use crate::{Error, Result};

/// A successfully decoded envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub mime_type: String,
    pub filename: String,
    pub sender_hash: [u8; SENDER_HASH_LEN],
    pub payload: Vec<u8>,
}

impl DecodedMessage {
    /// Whether this message was sent by the given device.
    ///
    /// The codec never filters own messages itself; callers apply the
    /// send-to-self policy with this.
    pub fn is_from(&self, device_id: &str) -> bool {
        self.sender_hash == hash_device_id(device_id)
    }
}

/// Encode and encrypt a message for transmission.
///
/// Fails with [`Error::FieldTooLong`] if the mime type or filename exceed
/// the single-byte length prefix.
pub fn encode(
    mime_type: &str,
    filename: &str,
    sender_id: &str,
    plaintext: &[u8],
    key: &GroupKey,
) -> Result<Vec<u8>> {
    if mime_type.len() > MAX_FIELD_LEN {
        return Err(Error::FieldTooLong {
            field: "mime type",
            len: mime_type.len(),
        });
    }
    if filename.len() > MAX_FIELD_LEN {
        return Err(Error::FieldTooLong {
            field: "filename",
            len: filename.len(),
        });
    }

    let mut buf =
        Vec::with_capacity(2 + mime_type.len() + filename.len() + SENDER_HASH_LEN + NONCE_LEN);
    buf.push(mime_type.len() as u8);
    buf.extend_from_slice(mime_type.as_bytes());
    buf.push(filename.len() as u8);
    buf.extend_from_slice(filename.as_bytes());
    buf.extend_from_slice(&hash_device_id(sender_id));

    let (nonce, ciphertext) = key.seal(plaintext, &buf)?;

    buf.extend_from_slice(&nonce);
    buf.extend_from_slice(&ciphertext);
    Ok(buf)
}

/// Decrypt and parse an envelope.
///
/// The AAD handed to GCM is the exact header bytes as transmitted, never a
/// re-serialization.
pub fn decode(data: &[u8], key: &GroupKey) -> Result<DecodedMessage> {
    let mut pos = 0usize;

    let mime_len = *data
        .get(pos)
        .ok_or_else(|| Error::Malformed("empty envelope".into()))? as usize;
    pos += 1;
    let mime_bytes = data
        .get(pos..pos + mime_len)
        .ok_or_else(|| Error::Malformed("truncated mime type".into()))?;
    pos += mime_len;

    let name_len = *data
        .get(pos)
        .ok_or_else(|| Error::Malformed("missing filename length".into()))?
        as usize;
    pos += 1;
    let name_bytes = data
        .get(pos..pos + name_len)
        .ok_or_else(|| Error::Malformed("truncated filename".into()))?;
    pos += name_len;

    let sender_hash: [u8; SENDER_HASH_LEN] = data
        .get(pos..pos + SENDER_HASH_LEN)
        .ok_or_else(|| Error::Malformed("truncated sender hash".into()))?
        .try_into()
        .expect("slice length checked");
    pos += SENDER_HASH_LEN;

    let header = &data[..pos];

    let nonce: [u8; NONCE_LEN] = data
        .get(pos..pos + NONCE_LEN)
        .ok_or_else(|| Error::Malformed("truncated nonce".into()))?
        .try_into()
        .expect("slice length checked");
    pos += NONCE_LEN;

    let ciphertext = &data[pos..];
    if ciphertext.len() < TAG_LEN {
        return Err(Error::Malformed("ciphertext shorter than GCM tag".into()));
    }

    let payload = key.open(&nonce, ciphertext, header)?;

    let mime_type = String::from_utf8(mime_bytes.to_vec())
        .map_err(|_| Error::Malformed("mime type is not UTF-8".into()))?;
    let filename = String::from_utf8(name_bytes.to_vec())
        .map_err(|_| Error::Malformed("filename is not UTF-8".into()))?;

    Ok(DecodedMessage {
        mime_type,
        filename,
        sender_hash,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> GroupKey {
        GroupKey::from_bytes(&[0x11; 32])
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let key = test_key();
        let encoded = encode("text/plain", "note.txt", "device-1", b"hello fleet", &key).unwrap();
        let decoded = decode(&encoded, &key).unwrap();

        assert_eq!(decoded.mime_type, "text/plain");
        assert_eq!(decoded.filename, "note.txt");
        assert_eq!(decoded.sender_hash, crate::crypto::hash_device_id("device-1"));
        assert_eq!(decoded.payload, b"hello fleet");
    }

    #[test]
    fn test_empty_filename_and_payload() {
        let key = test_key();
        let encoded = encode("text/plain", "", "device-1", b"", &key).unwrap();
        let decoded = decode(&encoded, &key).unwrap();

        assert_eq!(decoded.filename, "");
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_field_too_long() {
        let key = test_key();
        let long = "x".repeat(256);

        assert!(matches!(
            encode(&long, "f", "d", b"p", &key),
            Err(Error::FieldTooLong { field: "mime type", .. })
        ));
        assert!(matches!(
            encode("text/plain", &long, "d", b"p", &key),
            Err(Error::FieldTooLong { field: "filename", .. })
        ));

        // 255 is still fine
        let max = "x".repeat(255);
        assert!(encode(&max, &max, "d", b"p", &key).is_ok());
    }

    #[test]
    fn test_tamper_detection_every_byte() {
        let key = test_key();
        let encoded = encode("text/plain", "note.txt", "device-1", b"payload", &key).unwrap();

        for i in 0..encoded.len() {
            let mut tampered = encoded.clone();
            tampered[i] ^= 0x01;
            // Flipping a length byte may shift parsing into Malformed
            // territory; everything else must fail authentication. Either
            // way, no decode may succeed.
            assert!(
                decode(&tampered, &key).is_err(),
                "decode succeeded with byte {} flipped",
                i
            );
        }
    }

    #[test]
    fn test_ciphertext_flip_is_authentication_failure() {
        let key = test_key();
        let mut encoded = encode("text/plain", "note.txt", "device-1", b"payload", &key).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x80;

        assert!(matches!(
            decode(&encoded, &key),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_truncated_buffers_are_malformed() {
        let key = test_key();
        let encoded = encode("text/plain", "note.txt", "device-1", b"payload", &key).unwrap();

        for len in [0, 1, 5, 12, 40] {
            assert!(matches!(
                decode(&encoded[..len.min(encoded.len())], &key),
                Err(Error::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let key = test_key();
        let other = GroupKey::from_bytes(&[0x22; 32]);
        let encoded = encode("text/plain", "note.txt", "device-1", b"payload", &key).unwrap();

        assert!(matches!(
            decode(&encoded, &other),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_is_from() {
        let key = test_key();
        let encoded = encode("text/plain", "", "device-1", b"p", &key).unwrap();
        let decoded = decode(&encoded, &key).unwrap();

        assert!(decoded.is_from("device-1"));
        assert!(!decoded.is_from("device-2"));
    }
}

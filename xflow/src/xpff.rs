//! XPFF fingerprint header codec.
//!
//! The `x-xp-forwarded-for` header carries an encrypted device-fingerprint
//! payload bound to the current session. The AEAD key is derived from a fixed
//! shared secret plus the session id, so a header minted for one session is
//! useless for any other.
//!
//! Wire format (hex-encoded, lowercase, no separators):
//! `nonce(12 bytes) || ciphertext || tag(16 bytes)`

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Errors from XPFF encryption and decryption.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum XpffError {
    /// Input is not valid hex or is too short to hold nonce and tag.
    #[error("malformed xpff header")]
    Malformed,

    /// Authentication tag verification failed. The header was tampered with
    /// or was minted for a different session id.
    #[error("xpff integrity check failed")]
    Integrity,

    /// Decrypted payload is not valid UTF-8.
    #[error("xpff plaintext is not utf-8")]
    Encoding,
}

/// Encrypts and decrypts XPFF fingerprint headers.
#[derive(Debug, Clone)]
pub struct XpffCodec {
    base_key: String,
}

impl XpffCodec {
    /// Create a codec over the given shared secret.
    pub fn new(base_key: impl Into<String>) -> Self {
        Self {
            base_key: base_key.into(),
        }
    }

    /// Derive the 32-byte AEAD key: SHA-256(base_key || session_id).
    fn derive_key(&self, session_id: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.base_key.as_bytes());
        hasher.update(session_id.as_bytes());
        hasher.finalize().into()
    }

    /// Encrypt a fingerprint payload for the given session.
    ///
    /// A fresh random nonce is drawn from the OS for every call; nonce reuse
    /// under the same derived key breaks confidentiality and must never occur.
    pub fn encrypt(&self, plaintext: &str, session_id: &str) -> String {
        let key = self.derive_key(session_id);
        let cipher = Aes256Gcm::new_from_slice(&key).expect("key is always 32 bytes");

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        // aes-gcm only fails on plaintext lengths beyond the AES-GCM limit,
        // which a fingerprint JSON document cannot reach.
        let ciphertext = cipher
            .encrypt(&nonce, Payload::from(plaintext.as_bytes()))
            .expect("fingerprint payload within AES-GCM length limit");

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        hex::encode(out)
    }

    /// Decrypt an XPFF header minted for the given session.
    ///
    /// # Errors
    ///
    /// Fails on malformed hex, truncated input, tag mismatch, or non-UTF-8
    /// plaintext. There is no partial decrypt: a tampered header never yields
    /// corrupted plaintext.
    pub fn decrypt(&self, hex_header: &str, session_id: &str) -> Result<String, XpffError> {
        let raw = hex::decode(hex_header).map_err(|_| XpffError::Malformed)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(XpffError::Malformed);
        }

        let key = self.derive_key(session_id);
        let cipher = Aes256Gcm::new_from_slice(&key).expect("key is always 32 bytes");

        let nonce_bytes: [u8; NONCE_LEN] = raw[..NONCE_LEN]
            .try_into()
            .expect("slice length checked above");
        let nonce = Nonce::from(nonce_bytes);

        // The tag rides at the end of the ciphertext; aes-gcm verifies it
        // as part of decryption.
        let plaintext = cipher
            .decrypt(&nonce, Payload::from(&raw[NONCE_LEN..]))
            .map_err(|_| XpffError::Integrity)?;

        String::from_utf8(plaintext).map_err(|_| XpffError::Encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0e6be1f1e21ffc33590b888fd4dc81b19713e570e805d4e5df80a493c9571a05";

    fn codec() -> XpffCodec {
        XpffCodec::new(SECRET)
    }

    #[test]
    fn roundtrip_recovers_plaintext() {
        let payload = r#"{"navigator_properties":{"hasBeenActive":"true"}}"#;
        let header = codec().encrypt(payload, "guest-abc");
        assert_eq!(codec().decrypt(&header, "guest-abc").unwrap(), payload);
    }

    #[test]
    fn header_is_lowercase_hex_with_nonce_and_tag() {
        let header = codec().encrypt("x", "s");
        assert!(header.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // 12-byte nonce + 1-byte ciphertext + 16-byte tag, hex doubles it.
        assert_eq!(header.len(), 2 * (12 + 1 + 16));
    }

    #[test]
    fn wrong_session_id_fails_integrity() {
        let header = codec().encrypt("payload", "session-a");
        let err = codec().decrypt(&header, "session-b").unwrap_err();
        assert!(matches!(err, XpffError::Integrity));
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let header = codec().encrypt("payload", "session");
        let mut raw = hex::decode(&header).unwrap();
        // Flip one bit in the middle of the ciphertext.
        let mid = raw.len() / 2;
        raw[mid] ^= 0x01;
        let err = codec().decrypt(&hex::encode(raw), "session").unwrap_err();
        assert!(matches!(err, XpffError::Integrity));
    }

    #[test]
    fn tampered_tag_fails_integrity() {
        let header = codec().encrypt("payload", "session");
        let mut raw = hex::decode(&header).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let err = codec().decrypt(&hex::encode(raw), "session").unwrap_err();
        assert!(matches!(err, XpffError::Integrity));
    }

    #[test]
    fn truncated_header_is_malformed() {
        assert!(matches!(
            codec().decrypt("deadbeef", "s"),
            Err(XpffError::Malformed)
        ));
    }

    #[test]
    fn non_hex_header_is_malformed() {
        assert!(matches!(
            codec().decrypt("not hex at all!", "s"),
            Err(XpffError::Malformed)
        ));
    }

    #[test]
    fn nonces_are_never_reused() {
        let c = codec();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let header = c.encrypt("same payload", "same session");
            let nonce = header[..24].to_string();
            assert!(seen.insert(nonce), "nonce repeated across encryptions");
        }
    }
}

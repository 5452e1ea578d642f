//! Transcript encryption at rest.
//!
//! AES-256-GCM with a random 96-bit nonce per message; ciphertext is stored
//! as `base64(nonce ‖ ct)`. The configured key is normalized to exactly 32
//! bytes (padded with '0', truncated past 32) so existing deployments with
//! short keys keep working.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

const NONCE_LEN: usize = 12;

pub struct TranscriptCipher {
    cipher: Aes256Gcm,
}

impl TranscriptCipher {
    pub fn new(key: &str) -> Self {
        let normalized: Vec<u8> = key
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(32)
            .collect();
        let cipher = Aes256Gcm::new_from_slice(&normalized).expect("key is exactly 32 bytes");
        Self { cipher }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| anyhow!("transcript encryption failed"))?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let payload = BASE64
            .decode(encoded)
            .context("transcript ciphertext is not valid base64")?;
        anyhow::ensure!(
            payload.len() > NONCE_LEN,
            "transcript ciphertext too short"
        );

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| anyhow!("transcript decryption failed"))?;

        String::from_utf8(plaintext).context("decrypted transcript is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = TranscriptCipher::new("test-key");
        let plaintext = "พยาบาล: ประเมินสัญญาณชีพก่อนค่ะ";
        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_nonce_makes_ciphertexts_differ() {
        let cipher = TranscriptCipher::new("test-key");
        let a = cipher.encrypt("same text").unwrap();
        let b = cipher.encrypt("same text").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_and_long_keys_normalized() {
        let short = TranscriptCipher::new("k");
        let long = TranscriptCipher::new(&"x".repeat(64));
        let round = |c: &TranscriptCipher| {
            let ct = c.encrypt("hello").unwrap();
            c.decrypt(&ct).unwrap()
        };
        assert_eq!(round(&short), "hello");
        assert_eq!(round(&long), "hello");
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let a = TranscriptCipher::new("key-a");
        let b = TranscriptCipher::new("key-b");
        let ct = a.encrypt("secret").unwrap();
        assert!(b.decrypt(&ct).is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let cipher = TranscriptCipher::new("test-key");
        assert!(cipher.decrypt("not base64 !!").is_err());
        assert!(cipher.decrypt("aGVsbG8=").is_err()); // too short for a nonce
    }
}

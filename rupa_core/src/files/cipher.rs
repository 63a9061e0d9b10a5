use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM},
    digest::{digest, SHA256},
    rand::{SecureRandom, SystemRandom},
};

use crate::error::{RupaError, RupaResult};

const NONCE_LEN: usize = 12; // AES-GCM nonce length

/// AES-256-GCM for blobs at rest. Output layout: `nonce || ciphertext || tag`.
#[derive(Clone)]
pub struct FileCipher {
    key: [u8; 32],
    rng: SystemRandom,
}

impl FileCipher {
    /// Derives the 32-byte key from the configured secret with SHA-256.
    pub fn new(secret: &str) -> RupaResult<Self> {
        if secret.trim().is_empty() {
            return Err(RupaError::Config("encryption key must not be empty".into()));
        }
        let hash = digest(&SHA256, secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(hash.as_ref());
        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    fn sealing_key(&self) -> RupaResult<LessSafeKey> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| RupaError::CryptoFailed("failed to create key".into()))?;
        Ok(LessSafeKey::new(unbound))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> RupaResult<Vec<u8>> {
        let key = self.sealing_key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| RupaError::CryptoFailed("failed to generate nonce".into()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut sealed = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut sealed)
            .map_err(|_| RupaError::CryptoFailed("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> RupaResult<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(RupaError::CryptoFailed("ciphertext too short".into()));
        }
        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| RupaError::CryptoFailed("invalid nonce".into()))?;

        let key = self.sealing_key()?;
        let mut content = sealed.to_vec();
        let plain = key
            .open_in_place(nonce, Aad::empty(), &mut content)
            .map_err(|_| RupaError::CryptoFailed("decryption failed".into()))?;
        Ok(plain.to_vec())
    }
}

/// Random key suitable for `FILE_ENCRYPTION_KEY`.
pub fn generate_key() -> RupaResult<String> {
    let rng = SystemRandom::new();
    let mut key_bytes = [0u8; 32];
    rng.fill(&mut key_bytes)
        .map_err(|_| RupaError::CryptoFailed("failed to generate random key".into()))?;
    Ok(URL_SAFE_NO_PAD.encode(key_bytes))
}

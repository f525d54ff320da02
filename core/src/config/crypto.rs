// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Password-based decryption of configuration values.

use base64::engine::general_purpose;
use base64::Engine;
use derivative::Derivative;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use std::num::NonZeroU32;

/// Length of the random salt prepended to every ciphertext.
const SALT_LEN: usize = 16;

/// Length of the derived AES-256 key.
const KEY_LEN: usize = 32;

/// Default number of PBKDF2 rounds.
const DEFAULT_ITERATIONS: NonZeroU32 = match NonZeroU32::new(10_000) {
    Some(iterations) => iterations,
    None => panic!("Iterations must be non-zero"),
};

/// Errors raised while encrypting or decrypting values.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CryptoError {
    /// The ciphertext is not valid base64 or is too short to contain a salt and a nonce.
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// The ciphertext did not authenticate under the configured password.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The plaintext could not be sealed.
    #[error("Encryption failed")]
    EncryptionFailed,

    /// The decrypted bytes are not valid UTF-8.
    #[error("Decrypted value is not valid UTF-8")]
    NotUtf8,

    /// The requested algorithm is not known.
    #[error("Unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),
}

/// Result type for this module.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Turns the payload of an `enc=` configuration value into plaintext.
pub trait Decryptor {
    /// Decrypts `ciphertext`, which has already been stripped of the `enc=` prefix.
    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String>;
}

/// Password-based cipher using PBKDF2-HMAC-SHA256 to derive an AES-256-GCM key.
///
/// Ciphertexts are the base64 encoding of `salt || nonce || sealed data`, where the salt feeds
/// the key derivation and the nonce feeds the AEAD.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PbeCipher {
    /// Password the keys are derived from.
    #[derivative(Debug = "ignore")]
    password: Vec<u8>,

    /// Number of PBKDF2 rounds.
    iterations: NonZeroU32,
}

impl PbeCipher {
    /// Name of the only supported algorithm.
    pub const ALGORITHM: &'static str = "PBKDF2-SHA256-AES256GCM";

    /// Creates a cipher for `algorithm` keyed by `password`.
    pub fn new(algorithm: &str, password: &str) -> CryptoResult<Self> {
        if algorithm != Self::ALGORITHM {
            return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_owned()));
        }
        Ok(Self {
            password: password.as_bytes().to_vec(),
            iterations: DEFAULT_ITERATIONS,
        })
    }

    /// Derives the AEAD key for a given `salt`.
    fn key(&self, salt: &[u8]) -> CryptoResult<LessSafeKey> {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, self.iterations, salt, &self.password, &mut key);
        let key = UnboundKey::new(&AES_256_GCM, &key).map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(LessSafeKey::new(key))
    }

    /// Encrypts `plaintext` into a value suitable for use after an `enc=` prefix.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let salt: [u8; SALT_LEN] = rand::random();
        let nonce: [u8; NONCE_LEN] = rand::random();

        let mut sealed = plaintext.as_bytes().to_vec();
        self.key(&salt)?
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                &mut sealed,
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut raw = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        raw.extend_from_slice(&salt);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);
        Ok(general_purpose::STANDARD.encode(raw))
    }
}

impl Decryptor for PbeCipher {
    fn decrypt(&self, ciphertext: &str) -> CryptoResult<String> {
        let mut raw = general_purpose::STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?;
        if raw.len() < SALT_LEN + NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::InvalidCiphertext("Too short".to_owned()));
        }

        let (header, sealed) = raw.split_at_mut(SALT_LEN + NONCE_LEN);
        let (salt, nonce) = header.split_at(SALT_LEN);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);

        let plain = self
            .key(salt)?
            .open_in_place(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plain.to_vec()).map_err(|_| CryptoError::NotUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_then_decrypt() {
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "the-password").unwrap();
        let encrypted = cipher.encrypt("s3cr3t").unwrap();
        assert_ne!("s3cr3t", encrypted);
        assert_eq!("s3cr3t", cipher.decrypt(&encrypted).unwrap());
    }

    #[test]
    fn test_encrypt_is_salted() {
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "the-password").unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_decrypt_wrong_password() {
        let encrypted =
            PbeCipher::new(PbeCipher::ALGORITHM, "right").unwrap().encrypt("value").unwrap();
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "wrong").unwrap();
        assert_eq!(CryptoError::DecryptionFailed, cipher.decrypt(&encrypted).unwrap_err());
    }

    #[test]
    fn test_decrypt_garbage() {
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "pw").unwrap();
        match cipher.decrypt("not base64!") {
            Err(CryptoError::InvalidCiphertext(_)) => (),
            e => panic!("Unexpected result {:?}", e),
        }
        assert_eq!(
            CryptoError::InvalidCiphertext("Too short".to_owned()),
            cipher.decrypt("YWJj").unwrap_err()
        );
    }

    #[test]
    fn test_unsupported_algorithm() {
        assert_eq!(
            CryptoError::UnsupportedAlgorithm("ROT13".to_owned()),
            PbeCipher::new("ROT13", "pw").unwrap_err()
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "hunter2").unwrap();
        assert!(!format!("{:?}", cipher).contains("hunter2"));
    }
}

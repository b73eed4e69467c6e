//! AES-CBC decryption of envelope payloads.
//!
//! The service encrypts with AES in CBC mode and PKCS#7 padding. The key is a
//! static shared secret provisioned out of band; its length selects AES-128,
//! AES-192 or AES-256. The per-message IV travels in the envelope as 16 ASCII
//! characters and the ciphertext as standard Base64.

use crate::envelope::IV_LEN;
use crate::error::{HistoryError, Result};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use std::env;
use std::fmt;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Environment variable holding the key as raw text.
pub const KEY_ENV: &str = "ECARD_AES_KEY";

/// Environment variable holding the key as hex.
pub const KEY_HEX_ENV: &str = "ECARD_AES_KEY_HEX";

#[derive(Clone)]
enum KeyMaterial {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

/// The shared symmetric key used to open envelopes.
///
/// Key bytes are never printed; `Debug` shows only the key size.
#[derive(Clone)]
pub struct DecryptionKey(KeyMaterial);

impl DecryptionKey {
    /// Builds a key from raw bytes. Accepts 16, 24 or 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let material = match bytes.len() {
            16 => KeyMaterial::Aes128(copy_key(bytes)),
            24 => KeyMaterial::Aes192(copy_key(bytes)),
            32 => KeyMaterial::Aes256(copy_key(bytes)),
            n => {
                return Err(HistoryError::InvalidKey(format!(
                    "expected 16, 24 or 32 bytes, got {}",
                    n
                )))
            }
        };
        Ok(DecryptionKey(material))
    }

    /// Builds a key from hex text, e.g. `000102...0f`.
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| HistoryError::InvalidKey(format!("bad hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Loads the key from the environment.
    ///
    /// `ECARD_AES_KEY` (raw text) wins over `ECARD_AES_KEY_HEX`.
    pub fn from_env() -> Result<Self> {
        if let Ok(raw) = env::var(KEY_ENV) {
            debug!("Loading decryption key from {}", KEY_ENV);
            return Self::from_bytes(raw.as_bytes());
        }
        if let Ok(hex_text) = env::var(KEY_HEX_ENV) {
            debug!("Loading decryption key from {}", KEY_HEX_ENV);
            return Self::from_hex(&hex_text);
        }
        Err(HistoryError::MissingKey)
    }

    /// Key size in bits.
    pub fn bits(&self) -> usize {
        match self.0 {
            KeyMaterial::Aes128(_) => 128,
            KeyMaterial::Aes192(_) => 192,
            KeyMaterial::Aes256(_) => 256,
        }
    }

    /// Decrypts a Base64 ciphertext segment with the given IV segment.
    ///
    /// Returns the plaintext as text. Every failure (bad IV length, bad
    /// Base64, bad block alignment, bad padding, non UTF-8 output) is a
    /// [`HistoryError::DecryptionFailure`].
    pub fn decrypt(&self, iv: &str, ciphertext: &str) -> Result<String> {
        let iv = iv_bytes(iv)?;

        let ciphertext = general_purpose::STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| HistoryError::DecryptionFailure(format!("invalid base64: {}", e)))?;

        let plaintext = match &self.0 {
            KeyMaterial::Aes128(key) => Aes128CbcDec::new_from_slices(key, iv)
                .map_err(invalid_length)?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
            KeyMaterial::Aes192(key) => Aes192CbcDec::new_from_slices(key, iv)
                .map_err(invalid_length)?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
            KeyMaterial::Aes256(key) => Aes256CbcDec::new_from_slices(key, iv)
                .map_err(invalid_length)?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
        }
        .map_err(|_| {
            HistoryError::DecryptionFailure(format!(
                "invalid padding in {} byte ciphertext",
                ciphertext.len()
            ))
        })?;

        debug!(
            "Decrypted {} bytes with AES-{}-CBC",
            plaintext.len(),
            self.bits()
        );

        String::from_utf8(plaintext)
            .map_err(|_| HistoryError::DecryptionFailure("plaintext is not valid UTF-8".into()))
    }

    /// Encrypts `plaintext` and returns a complete envelope string
    /// (`iv` followed by the Base64 ciphertext).
    ///
    /// This is the inverse of [`decrypt`](Self::decrypt) and is mainly useful
    /// for building fixtures.
    pub fn encrypt_envelope(&self, iv: &str, plaintext: &str) -> Result<String> {
        let iv_raw = iv_bytes(iv)?;
        let data = plaintext.as_bytes();

        let ciphertext = match &self.0 {
            KeyMaterial::Aes128(key) => Aes128CbcEnc::new_from_slices(key, iv_raw)
                .map_err(invalid_length)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            KeyMaterial::Aes192(key) => Aes192CbcEnc::new_from_slices(key, iv_raw)
                .map_err(invalid_length)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            KeyMaterial::Aes256(key) => Aes256CbcEnc::new_from_slices(key, iv_raw)
                .map_err(invalid_length)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
        };

        Ok(format!(
            "{}{}",
            iv,
            general_purpose::STANDARD.encode(ciphertext)
        ))
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecryptionKey(AES-{})", self.bits())
    }
}

fn copy_key<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut key = [0u8; N];
    key.copy_from_slice(bytes);
    key
}

fn iv_bytes(iv: &str) -> Result<&[u8]> {
    let bytes = iv.as_bytes();
    if bytes.len() != IV_LEN {
        return Err(HistoryError::DecryptionFailure(format!(
            "IV must be {} bytes, got {}",
            IV_LEN,
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn invalid_length(_: aes::cipher::InvalidLength) -> HistoryError {
    HistoryError::DecryptionFailure("invalid key or IV length".into())
}

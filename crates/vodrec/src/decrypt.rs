// AES-128-CBC segment decryption.

use crate::error::RecoveryError;
use aes::Aes128;
use bytes::Bytes;
use cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-128 keys are exactly 16 bytes.
pub const KEY_LEN: usize = 16;

/// Key material for one encrypted asset: the fetched key plus the playlist
/// IV, if any. When the playlist carries no IV, the segment index supplies
/// it per the HLS convention (big-endian sequence number in a zeroed block).
#[derive(Debug, Clone)]
pub struct SegmentCrypto {
    key: [u8; KEY_LEN],
    iv: Option<[u8; 16]>,
}

impl SegmentCrypto {
    pub fn new(key_data: &[u8], iv_hex: Option<&str>) -> Result<Self, RecoveryError> {
        let key: [u8; KEY_LEN] = key_data.try_into().map_err(|_| {
            RecoveryError::decryption(format!(
                "decryption key has incorrect length: {} bytes (expected {KEY_LEN})",
                key_data.len()
            ))
        })?;
        let iv = iv_hex.map(parse_iv).transpose()?;
        Ok(Self { key, iv })
    }

    /// Decrypts one segment payload. Returns the plaintext with PKCS#7
    /// padding stripped.
    pub fn decrypt(&self, data: Bytes, segment_index: u32) -> Result<Bytes, RecoveryError> {
        let iv = self.iv.unwrap_or_else(|| derive_iv(segment_index));
        let cipher = Aes128CbcDec::new_from_slices(&self.key, &iv).map_err(|e| {
            RecoveryError::decryption(format!("failed to initialize AES decryptor: {e}"))
        })?;

        let mut buffer = data.to_vec();
        let plaintext_len = cipher
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|e| RecoveryError::decryption(format!("decryption failed: {e}")))?
            .len();
        buffer.truncate(plaintext_len);
        Ok(Bytes::from(buffer))
    }
}

fn parse_iv(iv_hex: &str) -> Result<[u8; 16], RecoveryError> {
    let iv_str = iv_hex.trim_start_matches("0x").trim_start_matches("0X");
    let mut iv = [0u8; 16];
    hex::decode_to_slice(iv_str, &mut iv)
        .map_err(|e| RecoveryError::decryption(format!("failed to parse IV '{iv_hex}': {e}")))?;
    Ok(iv)
}

fn derive_iv(segment_index: u32) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&u64::from(segment_index).to_be_bytes());
    iv
}

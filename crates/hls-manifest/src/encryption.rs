// Encryption metadata extracted from a media playlist.

use std::fmt;

/// Supported segment encryption methods. `METHOD=NONE` never produces a
/// descriptor; anything other than AES-128 is a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    Aes128,
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMethod::Aes128 => f.write_str("AES-128"),
        }
    }
}

/// Key reference for a single-key encrypted stream.
///
/// The IV is kept as the playlist's hex literal (`0x...`); decoding happens
/// at decrypt time. An absent IV means the segment index supplies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionDescriptor {
    pub method: EncryptionMethod,
    pub key_uri: String,
    pub iv: Option<String>,
    pub keyformat: Option<String>,
    pub keyformatversions: Option<String>,
}

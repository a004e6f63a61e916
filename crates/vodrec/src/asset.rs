// Asset directory store: one directory per asset identifier, holding the raw
// playlist, encryption sidecars, the content-length index and the segment
// files. The directory is the persisted unit of work; it is mutated
// incrementally across recovery rounds and never deleted by the engine.

use crate::error::RecoveryError;
use hls_manifest::{EncryptionDescriptor, SegmentManifest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub const PLAYLIST_FILE: &str = "playlist.txt";
pub const ENCRYPTION_INFO_FILE: &str = "encryption_info.json";
pub const ENCRYPTION_KEY_FILE: &str = "encryption.key";
pub const CONTENT_LENGTHS_FILE: &str = "content_lengths.json";

/// Characters not allowed in asset directory names.
const INVALID_IDENTIFIER_CHARS: &str = "<>:\"/\\|?*";

/// Mapping from segment index to the plaintext byte size recorded when the
/// segment was last fetched successfully.
pub type ContentLengthIndex = BTreeMap<u32, u64>;

/// Encryption sidecar, written by every metadata pass. The schema stays
/// stable so external collaborators (the merge step) can read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionInfo {
    pub is_encrypted: bool,
    pub method: Option<String>,
    pub key_uri: Option<String>,
    pub key_file: String,
    pub iv: Option<String>,
    pub keyformat: Option<String>,
    pub keyformatversions: Option<String>,
}

impl EncryptionInfo {
    pub fn unencrypted() -> Self {
        Self {
            is_encrypted: false,
            method: None,
            key_uri: None,
            key_file: ENCRYPTION_KEY_FILE.to_string(),
            iv: None,
            keyformat: None,
            keyformatversions: None,
        }
    }

    pub fn from_descriptor(descriptor: &EncryptionDescriptor) -> Self {
        Self {
            is_encrypted: true,
            method: Some(descriptor.method.to_string()),
            key_uri: Some(descriptor.key_uri.clone()),
            key_file: ENCRYPTION_KEY_FILE.to_string(),
            iv: descriptor.iv.clone(),
            keyformat: descriptor.keyformat.clone(),
            keyformatversions: descriptor.keyformatversions.clone(),
        }
    }

    /// The key file is required only when the stream is actually encrypted.
    pub fn requires_key(&self) -> bool {
        self.is_encrypted && self.key_uri.is_some()
    }
}

/// Replaces filesystem-hostile characters in a caller-supplied identifier.
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .trim()
        .chars()
        .map(|c| {
            if INVALID_IDENTIFIER_CHARS.contains(c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Handle to one asset's directory. Carries the asset's source URL so the
/// validator can re-resolve relative playlist references without touching
/// the network.
#[derive(Debug, Clone)]
pub struct AssetDir {
    path: PathBuf,
    source_url: Url,
}

impl AssetDir {
    /// Opens (creating if needed) the directory for `identifier` under
    /// `root`.
    pub async fn open(
        root: &Path,
        identifier: &str,
        source_url: Url,
    ) -> Result<Self, RecoveryError> {
        let path = root.join(sanitize_identifier(identifier));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path, source_url })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.path.join(PLAYLIST_FILE)
    }

    pub fn encryption_info_path(&self) -> PathBuf {
        self.path.join(ENCRYPTION_INFO_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.path.join(ENCRYPTION_KEY_FILE)
    }

    pub fn content_lengths_path(&self) -> PathBuf {
        self.path.join(CONTENT_LENGTHS_FILE)
    }

    pub fn segment_path(&self, index: u32) -> PathBuf {
        self.path.join(format!("segment_{index:05}.ts"))
    }

    pub async fn write_playlist(&self, text: &str) -> Result<(), RecoveryError> {
        atomic_write(&self.playlist_path(), text.as_bytes()).await
    }

    pub async fn read_playlist(&self) -> Result<String, RecoveryError> {
        Ok(tokio::fs::read_to_string(self.playlist_path()).await?)
    }

    /// Re-parses the persisted playlist into a manifest. Fails when the
    /// playlist is missing, unreadable or unparseable; callers treat that
    /// as "metadata pass required".
    pub async fn load_manifest(&self) -> Result<SegmentManifest, RecoveryError> {
        let text = self.read_playlist().await?;
        Ok(hls_manifest::parse(&text, &self.source_url)?)
    }

    pub async fn write_encryption_info(&self, info: &EncryptionInfo) -> Result<(), RecoveryError> {
        let json = serde_json::to_vec_pretty(info)
            .map_err(|e| RecoveryError::Internal {
                reason: format!("failed to serialize encryption info: {e}"),
            })?;
        atomic_write(&self.encryption_info_path(), &json).await
    }

    pub async fn load_encryption_info(&self) -> Result<EncryptionInfo, RecoveryError> {
        let bytes = tokio::fs::read(self.encryption_info_path()).await?;
        serde_json::from_slice(&bytes).map_err(|e| RecoveryError::Internal {
            reason: format!("corrupt {ENCRYPTION_INFO_FILE}: {e}"),
        })
    }

    pub async fn write_key(&self, key: &[u8]) -> Result<(), RecoveryError> {
        atomic_write(&self.key_path(), key).await
    }

    pub async fn read_key(&self) -> Result<Vec<u8>, RecoveryError> {
        Ok(tokio::fs::read(self.key_path()).await?)
    }

    /// Loads the content-length index. Missing or corrupt files yield an
    /// empty index, matching the validator's tolerance for partial assets.
    pub async fn load_content_lengths(&self) -> ContentLengthIndex {
        match tokio::fs::read(self.content_lengths_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                debug!(error = %e, "ignoring corrupt content-length index");
                ContentLengthIndex::new()
            }),
            Err(_) => ContentLengthIndex::new(),
        }
    }

    pub async fn store_content_lengths(
        &self,
        index: &ContentLengthIndex,
    ) -> Result<(), RecoveryError> {
        let json = serde_json::to_vec_pretty(index).map_err(|e| RecoveryError::Internal {
            reason: format!("failed to serialize content lengths: {e}"),
        })?;
        atomic_write(&self.content_lengths_path(), &json).await
    }

    /// Creates an empty content-length index if none exists, so later
    /// passes stop reporting it missing.
    pub async fn ensure_content_lengths(&self) -> Result<(), RecoveryError> {
        if !self.content_lengths_path().exists() {
            self.store_content_lengths(&ContentLengthIndex::new())
                .await?;
        }
        Ok(())
    }

    /// Whether every required metadata artifact is present and well-formed:
    /// a parseable playlist, a readable encryption sidecar, the key file
    /// when the stream is encrypted, and the content-length index.
    pub async fn metadata_complete(&self) -> bool {
        if self.load_manifest().await.is_err() {
            return false;
        }
        let info = match self.load_encryption_info().await {
            Ok(info) => info,
            Err(_) => return false,
        };
        if info.requires_key() && !self.key_path().exists() {
            return false;
        }
        self.content_lengths_path().exists()
    }
}

/// Writes via a temp file in the same directory plus rename, so a failed
/// write can never corrupt a previously good file.
pub async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), RecoveryError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

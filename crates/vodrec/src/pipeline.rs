// Segment fetch pipeline: bounded-concurrency, order-preserving fetches of a
// manifest subset into the asset directory, plus the metadata-only pass.
//
// The pipeline is stateless across invocations and unaware of whether it is
// running a first pass or a retry pass; it just fetches what it is given.

use crate::asset::{AssetDir, ContentLengthIndex, EncryptionInfo};
use crate::config::FetchConfig;
use crate::decrypt::{KEY_LEN, SegmentCrypto};
use crate::error::RecoveryError;
use crate::source::ByteSource;
use futures::StreamExt;
use futures::future::Either;
use futures::stream;
use futures::stream::Stream;
use hls_manifest::{SegmentManifest, SegmentRef};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

/// Per-segment result of one pass. Order matches the input subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fetched, decrypted where applicable, and written atomically.
    Fetched { bytes_written: u64 },
    /// The on-disk file already matches its recorded expected length.
    Skipped,
    /// Fetch, decrypt or write failed; any previously good file is intact.
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }
}

/// Key material plus the running content-length index for one pass.
struct PassState {
    crypto: Option<SegmentCrypto>,
    lengths: Mutex<ContentLengthIndex>,
}

pub struct SegmentPipeline {
    source: Arc<dyn ByteSource>,
    config: FetchConfig,
    token: CancellationToken,
    /// Serializes fetch issuance when a politeness delay is configured.
    gate: tokio::sync::Mutex<()>,
}

impl SegmentPipeline {
    pub fn new(source: Arc<dyn ByteSource>, config: FetchConfig, token: CancellationToken) -> Self {
        Self {
            source,
            config,
            token,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Metadata-only pass: fetches the playlist, persists the raw text and
    /// the encryption sidecars, fetches the key for encrypted streams, and
    /// makes sure the content-length index exists. Never touches a TS
    /// payload.
    pub async fn fill_metadata(
        &self,
        url: &Url,
        dir: &AssetDir,
    ) -> Result<SegmentManifest, RecoveryError> {
        let bytes = self.source.fetch(url, None).await?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| RecoveryError::Internal {
            reason: format!("playlist content is not valid UTF-8: {e}"),
        })?;
        dir.write_playlist(&text).await?;

        let manifest = hls_manifest::parse(&text, url)?;
        let info = match &manifest.encryption {
            Some(descriptor) => EncryptionInfo::from_descriptor(descriptor),
            None => EncryptionInfo::unencrypted(),
        };
        dir.write_encryption_info(&info).await?;

        if let Some(descriptor) = &manifest.encryption {
            let key_url = Url::parse(&descriptor.key_uri).map_err(|e| {
                RecoveryError::invalid_url(&descriptor.key_uri, e.to_string())
            })?;
            let key = self.source.fetch(&key_url, None).await?;
            if key.len() != KEY_LEN {
                return Err(RecoveryError::decryption(format!(
                    "key from {} has incorrect length: {} bytes (expected {KEY_LEN})",
                    descriptor.key_uri,
                    key.len()
                )));
            }
            dir.write_key(&key).await?;
            debug!(key_uri = %descriptor.key_uri, "stored decryption key");
        }

        dir.ensure_content_lengths().await?;
        info!(
            segments = manifest.len(),
            encrypted = manifest.encryption.is_some(),
            "metadata pass complete"
        );
        Ok(manifest)
    }

    /// Runs one full segment pass and returns one outcome per input ref, in
    /// input order. Individual failures never abort the pass. The
    /// content-length index is flushed once the pass completes.
    pub async fn fetch_segments(&self, subset: &[SegmentRef], dir: &AssetDir) -> Vec<FetchOutcome> {
        let outcomes: Vec<FetchOutcome> = self.fetch_stream(subset, dir).collect().await;
        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        info!(
            requested = subset.len(),
            failed,
            "segment pass finished"
        );
        outcomes
    }

    /// Lazy variant of [`fetch_segments`](Self::fetch_segments): outcomes
    /// are yielded as fetches complete, preserving input order, with at
    /// most `concurrency` fetches in flight. Each call is independent of
    /// prior calls.
    pub fn fetch_stream<'a>(
        &'a self,
        subset: &'a [SegmentRef],
        dir: &'a AssetDir,
    ) -> impl Stream<Item = FetchOutcome> + 'a {
        stream::once(async move {
            if subset.is_empty() {
                return Either::Right(stream::iter(Vec::new()));
            }
            let state = match self.begin_pass(dir).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "segment pass failed before dispatch");
                    let reason = e.to_string();
                    return Either::Right(stream::iter(
                        subset
                            .iter()
                            .map(|_| FetchOutcome::Failed {
                                reason: reason.clone(),
                            })
                            .collect::<Vec<_>>(),
                    ));
                }
            };

            let flush_state = Arc::clone(&state);
            let jobs = subset.iter().map(move |segment| {
                let state = Arc::clone(&state);
                async move { self.fetch_one(segment, dir, &state).await }
            });

            Either::Left(
                stream::iter(jobs)
                    .buffered(self.config.concurrency.max(1))
                    .map(Some)
                    .chain(stream::once(async move {
                        let snapshot = flush_state.lengths.lock().clone();
                        if let Err(e) = dir.store_content_lengths(&snapshot).await {
                            warn!(error = %e, "failed to flush content-length index");
                        }
                        None
                    }))
                    .filter_map(|outcome| async move { outcome }),
            )
        })
        .flatten()
    }

    async fn begin_pass(&self, dir: &AssetDir) -> Result<Arc<PassState>, RecoveryError> {
        let info = dir.load_encryption_info().await?;
        let crypto = if info.requires_key() {
            let key = dir.read_key().await.map_err(|_| {
                RecoveryError::decryption("encryption key file missing for encrypted stream")
            })?;
            Some(SegmentCrypto::new(&key, info.iv.as_deref())?)
        } else {
            None
        };
        Ok(Arc::new(PassState {
            crypto,
            lengths: Mutex::new(dir.load_content_lengths().await),
        }))
    }

    async fn fetch_one(
        &self,
        segment: &SegmentRef,
        dir: &AssetDir,
        state: &PassState,
    ) -> FetchOutcome {
        let path = dir.segment_path(segment.index);
        let expected = state.lengths.lock().get(&segment.index).copied();

        // Idempotent re-run: a file already matching its recorded length is
        // never re-fetched.
        if let Some(expected) = expected
            && let Ok(meta) = tokio::fs::metadata(&path).await
            && meta.len() == expected
        {
            trace!(index = segment.index, "segment already valid, skipping");
            return FetchOutcome::Skipped;
        }

        if self.token.is_cancelled() {
            return FetchOutcome::Failed {
                reason: "cancelled before dispatch".to_string(),
            };
        }
        self.pace().await;

        let url = match Url::parse(&segment.uri) {
            Ok(url) => url,
            Err(e) => {
                return FetchOutcome::Failed {
                    reason: format!("invalid segment URL `{}`: {e}", segment.uri),
                };
            }
        };

        let bytes = match self.source.fetch(&url, segment.byte_range.as_ref()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(index = segment.index, url = %url, error = %e, "segment fetch failed");
                return FetchOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let plaintext = match &state.crypto {
            Some(crypto) => match crypto.decrypt(bytes, segment.index) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(index = segment.index, error = %e, "segment decryption failed");
                    return FetchOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            },
            None => bytes,
        };

        if plaintext.is_empty() {
            return FetchOutcome::Failed {
                reason: "empty payload".to_string(),
            };
        }
        if let Some(expected) = expected
            && plaintext.len() as u64 != expected
        {
            return FetchOutcome::Failed {
                reason: format!(
                    "size mismatch: expected {expected} bytes, got {}",
                    plaintext.len()
                ),
            };
        }

        if let Err(e) = crate::asset::atomic_write(&path, &plaintext).await {
            return FetchOutcome::Failed {
                reason: format!("write failed: {e}"),
            };
        }
        state
            .lengths
            .lock()
            .insert(segment.index, plaintext.len() as u64);
        debug!(index = segment.index, size = plaintext.len(), "fetched segment");
        FetchOutcome::Fetched {
            bytes_written: plaintext.len() as u64,
        }
    }

    /// Politeness throttle: serializes a sleep of `delay` before each fetch
    /// is issued, spacing request starts at least `delay` apart.
    async fn pace(&self) {
        if self.config.delay.is_zero() {
            return;
        }
        let _gate = self.gate.lock().await;
        tokio::time::sleep(self.config.delay).await;
    }
}

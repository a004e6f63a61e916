// Recovery coordinator: drives one asset from whatever state its directory
// is in to a verified-complete or verified-failed terminal state, through
// bounded retry rounds.
//
// The state machine is an enum-driven loop with the phase and round counter
// as plain data, which keeps cancellation and testing straightforward.

use crate::asset::AssetDir;
use crate::config::{EngineConfig, RecoveryConfig};
use crate::error::RecoveryError;
use crate::pipeline::SegmentPipeline;
use crate::source::HttpSource;
use crate::validate::{ValidationReport, validate};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Why a recovery invocation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The asset validated complete.
    Completed,
    /// The metadata pass failed outright; metadata acquisition is not
    /// retried within an invocation.
    MetadataUnavailable,
    /// The retry-round budget ran out with segments still failing.
    RoundsExhausted,
    /// A stop signal arrived; honored between rounds.
    Cancelled,
}

/// The one value that crosses the engine boundary per task. Per-segment
/// detail stays in `last_report` for diagnostics.
#[derive(Debug, Clone)]
pub struct RecoveryResult {
    pub is_complete: bool,
    pub rounds_used: u32,
    pub last_report: ValidationReport,
    pub terminal_reason: TerminalReason,
}

#[derive(Debug)]
enum Phase {
    Init,
    FillMetadata,
    Validate,
    Retry,
    Done(TerminalReason),
}

pub struct RecoveryCoordinator {
    pipeline: SegmentPipeline,
    config: RecoveryConfig,
    root: PathBuf,
    token: CancellationToken,
}

impl RecoveryCoordinator {
    pub fn new(
        pipeline: SegmentPipeline,
        config: RecoveryConfig,
        root: PathBuf,
        token: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            config,
            root,
            token,
        }
    }

    /// Wires the production HTTP pipeline from an engine configuration.
    pub fn from_config(
        config: &EngineConfig,
        root: PathBuf,
        token: CancellationToken,
    ) -> Result<Self, RecoveryError> {
        let source = HttpSource::from_config(&config.http, config.fetch.clone(), token.clone())?;
        let pipeline = SegmentPipeline::new(Arc::new(source), config.fetch.clone(), token.clone());
        Ok(Self::new(pipeline, config.recovery.clone(), root, token))
    }

    /// Runs one asset to a terminal state. Infallible by contract: setup
    /// problems (bad URL, unreachable metadata) fold into
    /// `MetadataUnavailable`.
    pub async fn recover(&self, identifier: &str, url: &str) -> RecoveryResult {
        info!(identifier, url, "starting recovery");

        let source_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(identifier, url, error = %e, "invalid playlist URL");
                return Self::terminal(TerminalReason::MetadataUnavailable, 0, ValidationReport::default());
            }
        };
        let dir = match AssetDir::open(&self.root, identifier, source_url.clone()).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(identifier, error = %e, "cannot open asset directory");
                return Self::terminal(TerminalReason::MetadataUnavailable, 0, ValidationReport::default());
            }
        };

        let mut rounds_used = 0u32;
        let mut last_report = ValidationReport::default();
        let mut phase = Phase::Init;

        loop {
            phase = match phase {
                Phase::Init => {
                    if dir.metadata_complete().await {
                        debug!(identifier, "metadata artifacts present, skipping fill");
                        Phase::Validate
                    } else {
                        Phase::FillMetadata
                    }
                }
                Phase::FillMetadata => {
                    match self.pipeline.fill_metadata(&source_url, &dir).await {
                        Ok(_) => Phase::Validate,
                        Err(e) => {
                            warn!(identifier, error = %e, "metadata pass failed");
                            Phase::Done(TerminalReason::MetadataUnavailable)
                        }
                    }
                }
                Phase::Validate => {
                    last_report = validate(&dir).await;
                    if last_report.is_complete() {
                        Phase::Done(TerminalReason::Completed)
                    } else if self.token.is_cancelled() {
                        Phase::Done(TerminalReason::Cancelled)
                    } else if rounds_used < self.config.max_retry_rounds {
                        Phase::Retry
                    } else {
                        Phase::Done(TerminalReason::RoundsExhausted)
                    }
                }
                Phase::Retry => {
                    let subset = last_report.retry_subset();
                    rounds_used += 1;
                    info!(
                        identifier,
                        round = rounds_used,
                        budget = self.config.max_retry_rounds,
                        failed = subset.len(),
                        "retrying failed segments"
                    );
                    self.pipeline.fetch_segments(&subset, &dir).await;
                    Phase::Validate
                }
                Phase::Done(reason) => {
                    let result = Self::terminal(reason, rounds_used, last_report);
                    info!(
                        identifier,
                        complete = result.is_complete,
                        rounds = result.rounds_used,
                        reason = ?result.terminal_reason,
                        "recovery finished"
                    );
                    return result;
                }
            };
        }
    }

    fn terminal(
        reason: TerminalReason,
        rounds_used: u32,
        last_report: ValidationReport,
    ) -> RecoveryResult {
        RecoveryResult {
            is_complete: reason == TerminalReason::Completed,
            rounds_used,
            last_report,
            terminal_reason: reason,
        }
    }
}

// vodrec-engine: retrieves an HLS VOD asset into a locally complete,
// verified set of segment files, converging under partial failure through
// bounded recovery rounds.
//
// The engine owns playlist acquisition, the segment fetch pipeline, the
// completeness validator and the recovery coordinator. Merging segments
// into a container, transferring output and persisting the task queue are
// external collaborators working against the same directory layout.

pub mod asset;
pub mod batch;
pub mod client;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod pipeline;
pub mod recover;
pub mod retry;
pub mod source;
pub mod task;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for easier access
pub use asset::{AssetDir, ContentLengthIndex, EncryptionInfo};
pub use batch::{BatchRunner, BatchStats};
pub use client::build_client;
pub use config::{BatchConfig, EngineConfig, FetchConfig, HttpConfig, RecoveryConfig, RetryPolicy};
pub use error::RecoveryError;
pub use pipeline::{FetchOutcome, SegmentPipeline};
pub use recover::{RecoveryCoordinator, RecoveryResult, TerminalReason};
pub use source::{ByteSource, HttpSource};
pub use task::{MemoryTaskSource, PendingTask, TaskSource, TaskStatus};
pub use validate::{ValidationReport, validate};

// The manifest model is part of the public surface.
pub use hls_manifest::{
    ByteRange, EncryptionDescriptor, EncryptionMethod, ParseError, SegmentManifest, SegmentRef,
};

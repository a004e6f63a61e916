// Completeness validation: a purely local diff of expected vs. actual
// segment files. No network access.

use crate::asset::AssetDir;
use hls_manifest::SegmentRef;
use tracing::{debug, warn};

/// Expected-vs-actual diff for one asset directory.
///
/// `missing` holds segments with no file on disk; `empty` holds segments
/// whose file exists but is not validly present (zero bytes, or a size that
/// contradicts the recorded expected length).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub expected_count: usize,
    pub present_count: usize,
    pub missing: Vec<SegmentRef>,
    pub empty: Vec<SegmentRef>,
}

impl ValidationReport {
    /// Complete iff every expected segment is validly present. An
    /// `expected_count` of zero means the manifest itself was unavailable,
    /// which is never complete.
    pub fn is_complete(&self) -> bool {
        self.expected_count > 0
            && self.present_count == self.expected_count
            && self.missing.is_empty()
            && self.empty.is_empty()
    }

    /// The exact set a retry pass should fetch: missing ∪ empty, in index
    /// order, deduplicated.
    pub fn retry_subset(&self) -> Vec<SegmentRef> {
        let mut subset: Vec<SegmentRef> = self
            .missing
            .iter()
            .chain(self.empty.iter())
            .cloned()
            .collect();
        subset.sort_by_key(|s| s.index);
        subset.dedup_by_key(|s| s.index);
        subset
    }

    pub fn failure_count(&self) -> usize {
        self.missing.len() + self.empty.len()
    }
}

/// Validates the asset directory against its persisted manifest.
///
/// Never fails: an unreadable or unparseable playlist yields
/// `expected_count = 0`, which forces a metadata pass upstream.
pub async fn validate(dir: &AssetDir) -> ValidationReport {
    let manifest = match dir.load_manifest().await {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!(path = %dir.path().display(), error = %e, "manifest unavailable, asset incomplete by convention");
            return ValidationReport::default();
        }
    };

    let lengths = dir.load_content_lengths().await;
    let mut report = ValidationReport {
        expected_count: manifest.len(),
        ..Default::default()
    };

    for segment in &manifest.segments {
        let path = dir.segment_path(segment.index);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(_) => {
                report.missing.push(segment.clone());
                continue;
            }
        };
        report.present_count += 1;

        let size = meta.len();
        if size == 0 {
            report.empty.push(segment.clone());
        } else if let Some(&expected) = lengths.get(&segment.index)
            && size != expected
        {
            debug!(
                index = segment.index,
                size, expected, "segment size contradicts recorded length"
            );
            report.empty.push(segment.clone());
        }
    }

    if !report.is_complete() {
        warn!(
            expected = report.expected_count,
            present = report.present_count,
            missing = report.missing.len(),
            empty = report.empty.len(),
            "validation found incomplete asset"
        );
    }
    report
}

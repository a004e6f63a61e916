// Segment manifest data model.

use crate::encryption::EncryptionDescriptor;

/// A sub-resource byte range (`#EXT-X-BYTERANGE` with an explicit offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

/// One entry of a parsed playlist: the segment's position in playback order
/// and its fully resolved URL.
///
/// The index doubles as the on-disk name (`segment_<index>.ts`, zero-padded).
/// Indices are contiguous from 0. A URI may legitimately repeat; repeated
/// entries are distinct fetch targets with the same content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub index: u32,
    pub uri: String,
    pub byte_range: Option<ByteRange>,
}

/// The parsed, resolved, in-memory form of a media playlist.
///
/// Carries at most one encryption descriptor; multi-key rotation is not
/// supported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentManifest {
    pub segments: Vec<SegmentRef>,
    pub encryption: Option<EncryptionDescriptor>,
}

impl SegmentManifest {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: u32) -> Option<&SegmentRef> {
        self.segments.get(index as usize)
    }
}

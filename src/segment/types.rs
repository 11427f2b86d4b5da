//! Core types for the reference segment

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment_{}", self.0)
    }
}

/// Documents per postings block
pub const BLOCK_SIZE: usize = 128;

/// Posting list metadata stored in the term dictionary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingListMeta {
    /// Offset in the postings data
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
    /// Number of documents containing the term
    pub doc_frequency: u32,
}

/// Segment-level metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: SegmentId,
    /// Size of the document number space, deleted documents included
    pub doc_count: u32,
    /// Number of non-deleted documents
    pub live_doc_count: u32,
    /// Size of the postings data in bytes
    pub size_bytes: u64,
}

impl SegmentMeta {
    pub fn delete_ratio(&self) -> f64 {
        if self.doc_count == 0 {
            0.0
        } else {
            1.0 - (self.live_doc_count as f64 / self.doc_count as f64)
        }
    }
}

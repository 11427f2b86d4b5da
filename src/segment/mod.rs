//! Reference segment implementation
//!
//! An immutable in-memory segment with an FST term dictionary per field and
//! block-compressed postings. It implements [`crate::index::Reader`] and is
//! what the tests and benchmarks search over.
//!
//! # Architecture
//!
//! - `SegmentWriter`: buffers documents and writes a segment
//! - `SegmentReader`: immutable segment serving term and postings lookups
//! - `SegmentReaderBuilder`: reassembles a reader from serialized parts

mod postings;
mod reader;
mod term_dict;
mod types;
mod writer;

pub use postings::*;
pub use reader::*;
pub use term_dict::*;
pub use types::*;
pub use writer::*;

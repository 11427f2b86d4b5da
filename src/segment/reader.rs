//! Immutable segment reader
//!
//! A segment holds one term dictionary per field, a shared postings area and
//! the set of live document numbers. It is the reference implementation of
//! [`Reader`].

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use bytes::Bytes;
use roaring::RoaringBitmap;

use super::postings::PostingsReader;
use super::term_dict::TermDictionary;
use super::types::{PostingListMeta, SegmentId, SegmentMeta};
use crate::index::{Reader, TermMatcher};
use crate::postings::{BitmapPostings, BoxPostings, DocNo, EmptyPostings, RangePostings};
use crate::Result;

/// Immutable segment reader backed by in-memory data
pub struct SegmentReader {
    meta: SegmentMeta,
    /// Term dictionary per field
    fields: BTreeMap<Bytes, TermDictionary>,
    postings: PostingsReader,
    live_docs: RoaringBitmap,
}

impl SegmentReader {
    /// Assemble a reader from already validated parts
    pub fn from_parts(
        meta: SegmentMeta,
        fields: BTreeMap<Bytes, TermDictionary>,
        postings: PostingsReader,
        live_docs: RoaringBitmap,
    ) -> Self {
        Self {
            meta,
            fields,
            postings,
            live_docs,
        }
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn id(&self) -> SegmentId {
        self.meta.id
    }

    /// Number of live documents
    pub fn live_doc_count(&self) -> u32 {
        self.live_docs.len() as u32
    }

    pub fn is_live(&self, docno: DocNo) -> bool {
        self.live_docs.contains(docno.as_u32())
    }

    /// Field names in ascending order
    pub fn field_names(&self) -> impl Iterator<Item = &Bytes> {
        self.fields.keys()
    }

    /// The term dictionary of a field
    pub fn field(&self, field: &[u8]) -> Option<&TermDictionary> {
        self.fields.get(field)
    }

    /// Number of unique (field, term) pairs
    pub fn term_count(&self) -> usize {
        self.fields.values().map(TermDictionary::len).sum()
    }

    /// Postings metadata for a term
    pub fn posting_meta(&self, field: &[u8], term: &[u8]) -> io::Result<Option<&PostingListMeta>> {
        match self.fields.get(field) {
            Some(dict) => dict.get(term),
            None => Ok(None),
        }
    }

    /// Number of live documents containing the term
    pub fn doc_frequency(&self, field: &[u8], term: &[u8]) -> io::Result<u32> {
        Ok(self
            .posting_meta(field, term)?
            .map(|m| m.doc_frequency)
            .unwrap_or(0))
    }
}

impl Reader for SegmentReader {
    fn match_field(&self, field: &[u8], matcher: TermMatcher<'_>) -> Result<Vec<Bytes>> {
        match self.fields.get(field) {
            Some(dict) => Ok(dict.matching_terms(matcher)?),
            None => Ok(Vec::new()),
        }
    }

    fn postings(&self, field: &[u8], term: &[u8]) -> Result<BoxPostings<'_>> {
        match self.posting_meta(field, term)? {
            Some(meta) => Ok(Box::new(self.postings.get_postings(meta)?)),
            None => Ok(Box::new(EmptyPostings)),
        }
    }

    fn all_documents(&self) -> Result<BoxPostings<'_>> {
        // Live docs are validated to lie below doc_count, so equal sizes
        // means nothing was deleted.
        if self.live_docs.len() == self.meta.doc_count as u64 {
            Ok(Box::new(RangePostings::universe(self.meta.doc_count)))
        } else {
            Ok(Box::new(BitmapPostings::borrowed(&self.live_docs)))
        }
    }

    /// Live documents only; deleted docnos are outside the universe
    fn doc_count(&self) -> u32 {
        self.live_doc_count()
    }
}

impl fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentReader")
            .field("meta", &self.meta)
            .field("fields", &self.fields.len())
            .field("terms", &self.term_count())
            .field("postings_bytes", &self.postings.len())
            .finish()
    }
}

/// Builder for creating segment readers from serialized data
#[derive(Default)]
pub struct SegmentReaderBuilder {
    meta: Option<SegmentMeta>,
    fields: Vec<(Bytes, Vec<u8>, Vec<PostingListMeta>)>,
    postings_data: Option<Vec<u8>>,
    live_docs: Option<RoaringBitmap>,
}

impl SegmentReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meta(mut self, meta: SegmentMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Add the serialized term dictionary of one field
    pub fn with_field(
        mut self,
        field: impl AsRef<[u8]>,
        fst_data: Vec<u8>,
        metadata: Vec<PostingListMeta>,
    ) -> Self {
        self.fields
            .push((Bytes::copy_from_slice(field.as_ref()), fst_data, metadata));
        self
    }

    pub fn with_postings(mut self, data: Vec<u8>) -> Self {
        self.postings_data = Some(data);
        self
    }

    /// Live documents; all of `0..doc_count` when not set
    pub fn with_live_docs(mut self, live_docs: RoaringBitmap) -> Self {
        self.live_docs = Some(live_docs);
        self
    }

    pub fn build(self) -> io::Result<SegmentReader> {
        let mut meta = self
            .meta
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Missing segment meta"))?;

        let postings_data = self
            .postings_data
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Missing postings data"))?;

        let mut fields = BTreeMap::new();
        for (field, fst_data, metadata) in self.fields {
            let dict = TermDictionary::new(fst_data, metadata)?;
            if fields.insert(field.clone(), dict).is_some() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Duplicate field {:?}", String::from_utf8_lossy(&field)),
                ));
            }
        }

        let live_docs = match self.live_docs {
            Some(live_docs) => {
                if live_docs.max().is_some_and(|max| max >= meta.doc_count) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Live document beyond segment doc count",
                    ));
                }
                live_docs
            }
            None => {
                let mut live_docs = RoaringBitmap::new();
                live_docs.insert_range(0..meta.doc_count);
                live_docs
            }
        };

        meta.live_doc_count = live_docs.len() as u32;
        meta.size_bytes = postings_data.len() as u64;

        Ok(SegmentReader::from_parts(
            meta,
            fields,
            PostingsReader::new(postings_data),
            live_docs,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::{collect_docs, Postings};
    use crate::segment::{PostingsWriter, TermDictionaryBuilder};

    struct TestData {
        postings: Vec<u8>,
        fst_data: Vec<u8>,
        metadata: Vec<PostingListMeta>,
    }

    fn write_test_data() -> TestData {
        let mut postings_writer = PostingsWriter::new();
        let mut term_builder = TermDictionaryBuilder::new();

        postings_writer.start_posting_list();
        postings_writer.add(DocNo(0)).unwrap();
        postings_writer.add(DocNo(2)).unwrap();
        term_builder.add("hello", postings_writer.finish_posting_list());

        postings_writer.start_posting_list();
        postings_writer.add(DocNo(1)).unwrap();
        postings_writer.add(DocNo(2)).unwrap();
        term_builder.add("world", postings_writer.finish_posting_list());

        let dict = term_builder.build().unwrap();
        TestData {
            postings: postings_writer.into_data(),
            fst_data: dict.fst_bytes().to_vec(),
            metadata: dict.metadata().to_vec(),
        }
    }

    fn create_test_segment() -> SegmentReader {
        let data = write_test_data();
        SegmentReaderBuilder::new()
            .with_meta(SegmentMeta {
                id: SegmentId::new(1),
                doc_count: 3,
                ..Default::default()
            })
            .with_field("body", data.fst_data, data.metadata)
            .with_postings(data.postings)
            .build()
            .unwrap()
    }

    fn ids(postings: BoxPostings<'_>) -> Vec<u32> {
        let mut postings = postings;
        collect_docs(&mut postings)
            .unwrap()
            .into_iter()
            .map(DocNo::as_u32)
            .collect()
    }

    #[test]
    fn test_segment_reader_basic() {
        let reader = create_test_segment();

        assert_eq!(reader.id(), SegmentId::new(1));
        assert_eq!(reader.doc_count(), 3);
        assert_eq!(reader.live_doc_count(), 3);
        assert_eq!(reader.meta().live_doc_count, 3);
        assert_eq!(reader.term_count(), 2);

        assert!(reader.posting_meta(b"body", b"hello").unwrap().is_some());
        assert!(reader.posting_meta(b"body", b"foo").unwrap().is_none());
        assert!(reader.posting_meta(b"title", b"hello").unwrap().is_none());

        assert_eq!(reader.doc_frequency(b"body", b"hello").unwrap(), 2);
        assert_eq!(reader.doc_frequency(b"body", b"foo").unwrap(), 0);
    }

    #[test]
    fn test_segment_reader_postings() {
        let reader = create_test_segment();

        assert_eq!(ids(reader.postings(b"body", b"hello").unwrap()), vec![0, 2]);
        assert_eq!(ids(reader.postings(b"body", b"world").unwrap()), vec![1, 2]);
        assert!(ids(reader.postings(b"body", b"nope").unwrap()).is_empty());
        assert!(ids(reader.postings(b"nope", b"hello").unwrap()).is_empty());
        assert_eq!(ids(reader.all_documents().unwrap()), vec![0, 1, 2]);
    }

    #[test]
    fn test_segment_reader_match_field() {
        let reader = create_test_segment();
        let terms = reader.match_field(b"body", TermMatcher::Any).unwrap();
        assert_eq!(terms, vec![Bytes::from_static(b"hello"), Bytes::from_static(b"world")]);
        assert!(reader
            .match_field(b"title", TermMatcher::Any)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_live_docs_restrict_universe() {
        let data = write_test_data();
        let live: RoaringBitmap = [0u32, 2].into_iter().collect();
        let reader = SegmentReaderBuilder::new()
            .with_meta(SegmentMeta {
                doc_count: 3,
                ..Default::default()
            })
            .with_field("body", data.fst_data, data.metadata)
            .with_postings(data.postings)
            .with_live_docs(live)
            .build()
            .unwrap();

        assert_eq!(reader.live_doc_count(), 2);
        assert_eq!(reader.meta().doc_count, 3);
        assert!(!reader.is_live(DocNo(1)));
        let mut all = reader.all_documents().unwrap();
        assert_eq!(all.cost(), 2);
        let all = ids(all);
        assert_eq!(all, vec![0, 2]);
        assert_eq!(reader.doc_count() as usize, all.len());
    }

    #[test]
    fn test_builder_validation() {
        let missing_meta = SegmentReaderBuilder::new().with_postings(Vec::new()).build();
        assert_eq!(missing_meta.unwrap_err().kind(), io::ErrorKind::InvalidInput);

        let live: RoaringBitmap = [5u32].into_iter().collect();
        let out_of_range = SegmentReaderBuilder::new()
            .with_meta(SegmentMeta {
                doc_count: 3,
                ..Default::default()
            })
            .with_postings(Vec::new())
            .with_live_docs(live)
            .build();
        assert_eq!(out_of_range.unwrap_err().kind(), io::ErrorKind::InvalidData);

        let bad_fst = SegmentReaderBuilder::new()
            .with_meta(SegmentMeta::default())
            .with_postings(Vec::new())
            .with_field("body", vec![0xFF; 4], Vec::new())
            .build();
        assert!(bad_fst.is_err());
    }

    #[test]
    fn test_truncated_postings_fail_on_access() {
        let data = write_test_data();
        let reader = SegmentReaderBuilder::new()
            .with_meta(SegmentMeta {
                doc_count: 3,
                ..Default::default()
            })
            .with_field("body", data.fst_data, data.metadata)
            .with_postings(data.postings[..2].to_vec())
            .build()
            .unwrap();

        // The dictionary is intact, so construction and lookups succeed
        assert_eq!(reader.match_field(b"body", TermMatcher::Any).unwrap().len(), 2);
        let err = reader.postings(b"body", b"world").err().unwrap();
        assert!(err.is_reader_scoped());
    }
}

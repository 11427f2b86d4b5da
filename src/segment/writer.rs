//! Segment writer for creating new immutable segments
//!
//! Documents are buffered as (field, term) pairs. Writing sorts the terms
//! of every field, encodes postings for live documents only, and builds one
//! FST dictionary per field.

use std::collections::BTreeMap;
use std::io;

use bytes::Bytes;
use roaring::RoaringBitmap;
use tracing::debug;

use super::postings::{PostingsReader, PostingsWriter};
use super::reader::SegmentReader;
use super::term_dict::TermDictionaryBuilder;
use super::types::{PostingListMeta, SegmentId, SegmentMeta};
use crate::postings::DocNo;

/// Serialized term dictionary of one field
#[derive(Clone, Debug)]
pub struct FieldTerms {
    pub field: Bytes,
    pub fst_data: Vec<u8>,
    pub metadata: Vec<PostingListMeta>,
}

/// Result of writing a segment
#[derive(Debug)]
pub struct SegmentWriteResult {
    /// The created segment reader
    pub reader: SegmentReader,
    /// Postings data
    pub postings_data: Vec<u8>,
    /// Term dictionaries, by ascending field name
    pub fields: Vec<FieldTerms>,
    pub live_docs: RoaringBitmap,
}

/// Buffers documents and writes them out as one segment
#[derive(Debug)]
pub struct SegmentWriter {
    segment_id: SegmentId,
    /// field -> term -> ascending docnos
    terms: BTreeMap<Bytes, BTreeMap<Bytes, Vec<DocNo>>>,
    doc_count: u32,
    deleted: RoaringBitmap,
}

impl SegmentWriter {
    pub fn new(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            terms: BTreeMap::new(),
            doc_count: 0,
            deleted: RoaringBitmap::new(),
        }
    }

    /// Add a document made of (field, term) pairs and return its docno.
    /// Repeated pairs within one document are indexed once.
    pub fn add_document<I, F, T>(&mut self, pairs: I) -> io::Result<DocNo>
    where
        I: IntoIterator<Item = (F, T)>,
        F: AsRef<[u8]>,
        T: AsRef<[u8]>,
    {
        let docno = DocNo(self.doc_count);
        let next = self.doc_count.checked_add(1).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Segment document limit reached")
        })?;

        for (field, term) in pairs {
            let docs = self
                .terms
                .entry(Bytes::copy_from_slice(field.as_ref()))
                .or_default()
                .entry(Bytes::copy_from_slice(term.as_ref()))
                .or_default();
            if docs.last() != Some(&docno) {
                docs.push(docno);
            }
        }

        self.doc_count = next;
        Ok(docno)
    }

    /// Mark a document deleted. Returns false if it does not exist or was
    /// already deleted.
    pub fn delete(&mut self, docno: DocNo) -> bool {
        docno.as_u32() < self.doc_count && self.deleted.insert(docno.as_u32())
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn live_doc_count(&self) -> u32 {
        self.doc_count - self.deleted.len() as u32
    }

    /// Write the buffered documents as an immutable segment
    pub fn write(&self) -> io::Result<SegmentWriteResult> {
        let mut live_docs = RoaringBitmap::new();
        live_docs.insert_range(0..self.doc_count);
        live_docs -= &self.deleted;

        let mut postings_writer = PostingsWriter::new();
        let mut fields = Vec::with_capacity(self.terms.len());
        let mut dictionaries = BTreeMap::new();

        for (field, terms) in &self.terms {
            let mut term_builder = TermDictionaryBuilder::with_capacity(terms.len());
            let mut term_count = 0usize;

            for (term, docs) in terms {
                // Deleted documents are dropped from postings
                let mut live = docs.iter().filter(|d| live_docs.contains(d.as_u32())).peekable();
                if live.peek().is_none() {
                    continue;
                }

                postings_writer.start_posting_list();
                for &docno in live {
                    postings_writer.add(docno)?;
                }
                term_builder.add(term.to_vec(), postings_writer.finish_posting_list());
                term_count += 1;
            }

            if term_count == 0 {
                continue;
            }

            let dict = term_builder.build()?;
            fields.push(FieldTerms {
                field: field.clone(),
                fst_data: dict.fst_bytes().to_vec(),
                metadata: dict.metadata().to_vec(),
            });
            dictionaries.insert(field.clone(), dict);
        }

        let postings_data = postings_writer.into_data();

        let meta = SegmentMeta {
            id: self.segment_id,
            doc_count: self.doc_count,
            live_doc_count: live_docs.len() as u32,
            size_bytes: postings_data.len() as u64,
        };

        debug!(
            segment = %meta.id,
            docs = meta.doc_count,
            live = meta.live_doc_count,
            fields = fields.len(),
            bytes = meta.size_bytes,
            "wrote segment"
        );

        let reader = SegmentReader::from_parts(
            meta,
            dictionaries,
            PostingsReader::new(postings_data.clone()),
            live_docs.clone(),
        );

        Ok(SegmentWriteResult {
            reader,
            postings_data,
            fields,
            live_docs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Reader, TermMatcher};
    use crate::postings::collect_docs;
    use crate::segment::SegmentReaderBuilder;

    fn ids(reader: &SegmentReader, field: &str, term: &str) -> Vec<u32> {
        let mut postings = reader.postings(field.as_bytes(), term.as_bytes()).unwrap();
        collect_docs(&mut postings)
            .unwrap()
            .into_iter()
            .map(DocNo::as_u32)
            .collect()
    }

    fn writer() -> SegmentWriter {
        let mut writer = SegmentWriter::new(SegmentId::new(7));
        writer
            .add_document([("fruit", "apple"), ("color", "red")])
            .unwrap();
        writer
            .add_document([("fruit", "banana"), ("color", "yellow")])
            .unwrap();
        writer
            .add_document([("fruit", "apple"), ("fruit", "apple"), ("color", "green")])
            .unwrap();
        writer
    }

    #[test]
    fn test_write_segment() {
        let result = writer().write().unwrap();
        let reader = &result.reader;

        assert_eq!(reader.id(), SegmentId::new(7));
        assert_eq!(reader.doc_count(), 3);
        assert_eq!(reader.term_count(), 5);
        assert_eq!(ids(reader, "fruit", "apple"), vec![0, 2]);
        assert_eq!(ids(reader, "color", "yellow"), vec![1]);
        assert_eq!(result.fields.len(), 2);
        assert_eq!(result.fields[0].field, Bytes::from_static(b"color"));
    }

    #[test]
    fn test_deletes_are_dropped() {
        let mut writer = writer();
        assert!(writer.delete(DocNo(1)));
        assert!(!writer.delete(DocNo(1)));
        assert!(!writer.delete(DocNo(9)));
        assert_eq!(writer.live_doc_count(), 2);

        let result = writer.write().unwrap();
        let reader = &result.reader;
        assert_eq!(reader.meta().doc_count, 3);
        assert_eq!(reader.live_doc_count(), 2);
        assert_eq!(reader.doc_count(), 2);
        assert!(ids(reader, "fruit", "banana").is_empty());
        assert!(reader
            .match_field(b"fruit", TermMatcher::Exact(b"banana"))
            .unwrap()
            .is_empty());

        let mut all = reader.all_documents().unwrap();
        let all: Vec<u32> = collect_docs(&mut all)
            .unwrap()
            .into_iter()
            .map(DocNo::as_u32)
            .collect();
        assert_eq!(all, vec![0, 2]);
        assert_eq!(reader.doc_count() as usize, all.len());
    }

    #[test]
    fn test_written_data_reloads() {
        let result = writer().write().unwrap();

        let mut builder = SegmentReaderBuilder::new()
            .with_meta(result.reader.meta().clone())
            .with_postings(result.postings_data.clone())
            .with_live_docs(result.live_docs.clone());
        for field in &result.fields {
            builder = builder.with_field(&field.field, field.fst_data.clone(), field.metadata.clone());
        }
        let reloaded = builder.build().unwrap();

        assert_eq!(reloaded.meta(), result.reader.meta());
        assert_eq!(ids(&reloaded, "fruit", "apple"), vec![0, 2]);
        assert_eq!(
            reloaded.match_field(b"color", TermMatcher::Any).unwrap(),
            result.reader.match_field(b"color", TermMatcher::Any).unwrap()
        );
    }

    #[test]
    fn test_empty_segment() {
        let result = SegmentWriter::new(SegmentId::default()).write().unwrap();
        assert_eq!(result.reader.doc_count(), 0);
        assert!(result.fields.is_empty());
        let mut all = result.reader.all_documents().unwrap();
        assert!(collect_docs(&mut all).unwrap().is_empty());
    }
}

//! Term dictionary using FST (Finite State Transducer)
//!
//! One FST per field maps each term to an index into a metadata array
//! locating its posting list. Regexp matching runs the automaton over the
//! FST itself, so subtrees no term can match through are never visited.

use std::io;

use bytes::Bytes;
use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use super::types::PostingListMeta;
use crate::index::TermMatcher;

fn invalid(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Term dictionary backed by FST
pub struct TermDictionary {
    /// FST mapping term -> index in metadata array
    fst: Map<Vec<u8>>,
    /// Metadata for each term (parallel to FST output values)
    metadata: Vec<PostingListMeta>,
}

impl TermDictionary {
    /// Create a term dictionary from FST data and metadata
    pub fn new(fst_data: Vec<u8>, metadata: Vec<PostingListMeta>) -> io::Result<Self> {
        let fst = Map::new(fst_data).map_err(invalid)?;
        Ok(Self { fst, metadata })
    }

    /// Look up a term and return its postings metadata
    pub fn get(&self, term: &[u8]) -> io::Result<Option<&PostingListMeta>> {
        self.fst.get(term).map(|idx| self.meta_at(idx)).transpose()
    }

    pub fn contains(&self, term: &[u8]) -> bool {
        self.fst.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Terms selected by `matcher`, in ascending byte order
    pub fn matching_terms(&self, matcher: TermMatcher<'_>) -> io::Result<Vec<Bytes>> {
        match matcher {
            TermMatcher::Exact(term) => Ok(self
                .get(term)?
                .map(|_| vec![Bytes::copy_from_slice(term)])
                .unwrap_or_default()),
            TermMatcher::Regexp(automaton) => {
                self.collect_terms(self.fst.search(automaton).into_stream())
            }
            TermMatcher::Any => self.collect_terms(self.fst.stream()),
        }
    }

    /// Get the raw FST data (for serialization)
    pub fn fst_bytes(&self) -> &[u8] {
        self.fst.as_fst().as_bytes()
    }

    /// Get the metadata array (for serialization)
    pub fn metadata(&self) -> &[PostingListMeta] {
        &self.metadata
    }

    fn meta_at(&self, idx: u64) -> io::Result<&PostingListMeta> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.metadata.get(i))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("term metadata index {idx} out of range"),
                )
            })
    }

    fn collect_terms<S>(&self, mut stream: S) -> io::Result<Vec<Bytes>>
    where
        S: for<'a> Streamer<'a, Item = (&'a [u8], u64)>,
    {
        let mut terms = Vec::new();
        while let Some((key, idx)) = stream.next() {
            self.meta_at(idx)?;
            terms.push(Bytes::copy_from_slice(key));
        }
        Ok(terms)
    }
}

/// Builder for term dictionaries
pub struct TermDictionaryBuilder {
    terms: Vec<(Vec<u8>, PostingListMeta)>,
}

impl TermDictionaryBuilder {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    /// Add a term with its postings metadata
    pub fn add(&mut self, term: impl Into<Vec<u8>>, meta: PostingListMeta) {
        self.terms.push((term.into(), meta));
    }

    /// Build the term dictionary; duplicate terms are an error
    pub fn build(mut self) -> io::Result<TermDictionary> {
        // FST requires sorted input
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fst_builder = MapBuilder::memory();
        let mut metadata = Vec::with_capacity(self.terms.len());

        for (idx, (term, meta)) in self.terms.into_iter().enumerate() {
            fst_builder.insert(&term, idx as u64).map_err(invalid)?;
            metadata.push(meta);
        }

        let fst_data = fst_builder.into_inner().map_err(invalid)?;

        TermDictionary::new(fst_data, metadata)
    }
}

impl Default for TermDictionaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::RegexpAutomaton;

    fn meta(offset: u64, doc_frequency: u32) -> PostingListMeta {
        PostingListMeta {
            offset,
            length: 10,
            doc_frequency,
        }
    }

    fn fruit_dict() -> TermDictionary {
        let mut builder = TermDictionaryBuilder::new();
        builder.add("grape", meta(20, 3));
        builder.add("apple", meta(0, 10));
        builder.add("banana", meta(10, 20));
        builder.add("pineapple", meta(30, 1));
        builder.build().unwrap()
    }

    fn strings(terms: Vec<Bytes>) -> Vec<String> {
        terms
            .into_iter()
            .map(|t| String::from_utf8(t.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_term_dictionary_builder() {
        let dict = fruit_dict();

        assert_eq!(dict.len(), 4);
        assert!(dict.contains(b"apple"));
        assert!(dict.contains(b"banana"));
        assert!(!dict.contains(b"date"));

        let apple_meta = dict.get(b"apple").unwrap().unwrap();
        assert_eq!(apple_meta.offset, 0);
        assert_eq!(apple_meta.doc_frequency, 10);
        assert!(dict.get(b"date").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_terms_fail() {
        let mut builder = TermDictionaryBuilder::new();
        builder.add("apple", meta(0, 1));
        builder.add("apple", meta(10, 1));
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_matching_terms() {
        let dict = fruit_dict();
        let automaton = RegexpAutomaton::compile(b".*ple").unwrap();

        assert_eq!(
            strings(dict.matching_terms(TermMatcher::Regexp(&automaton)).unwrap()),
            vec!["apple", "pineapple"]
        );
        assert_eq!(
            strings(dict.matching_terms(TermMatcher::Any).unwrap()),
            vec!["apple", "banana", "grape", "pineapple"]
        );
        assert_eq!(
            strings(dict.matching_terms(TermMatcher::Exact(b"grape")).unwrap()),
            vec!["grape"]
        );
        assert!(dict
            .matching_terms(TermMatcher::Exact(b"kiwi"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_metadata_mismatch_is_an_error() {
        let dict = fruit_dict();
        let truncated =
            TermDictionary::new(dict.fst_bytes().to_vec(), dict.metadata()[..1].to_vec()).unwrap();

        assert!(truncated.get(b"banana").is_err());
        assert!(truncated.matching_terms(TermMatcher::Any).is_err());
    }

    #[test]
    fn test_invalid_fst_data() {
        assert!(TermDictionary::new(vec![1, 2, 3], Vec::new()).is_err());
    }
}

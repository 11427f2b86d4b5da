//! Reader contract consumed by the query engine
//!
//! A reader is one immutable segment. The engine only needs to enumerate the
//! terms of a field, open the postings of a term, and walk the reader's
//! universe of document numbers for negation.

use std::sync::Arc;

use bytes::Bytes;

use crate::automaton::RegexpAutomaton;
use crate::postings::BoxPostings;
use crate::Result;

/// How a reader should select terms of a field
#[derive(Clone, Copy, Debug)]
pub enum TermMatcher<'a> {
    /// The single term equal to the bytes, if present
    Exact(&'a [u8]),
    /// Every term the automaton accepts
    Regexp(&'a RegexpAutomaton),
    /// Every term of the field
    Any,
}

impl TermMatcher<'_> {
    /// Point test for readers that scan rather than seek
    pub fn matches(&self, term: &[u8]) -> bool {
        match self {
            TermMatcher::Exact(value) => *value == term,
            TermMatcher::Regexp(automaton) => automaton.matches(term),
            TermMatcher::Any => true,
        }
    }
}

/// Immutable segment handle.
///
/// Implementations must return terms in ascending byte order and postings as
/// strictly increasing reader-local document numbers. Any failure to
/// read dictionary or postings data is reported as an error, never as an
/// empty result.
pub trait Reader: Send + Sync {
    /// Terms of `field` selected by `matcher`, in ascending order.
    /// A missing field yields no terms.
    fn match_field(&self, field: &[u8], matcher: TermMatcher<'_>) -> Result<Vec<Bytes>>;

    /// Postings of an exact term. A missing term yields an empty stream.
    fn postings(&self, field: &[u8], term: &[u8]) -> Result<BoxPostings<'_>>;

    /// Every document of this reader
    fn all_documents(&self) -> Result<BoxPostings<'_>>;

    /// Size of the universe: the number of documents `all_documents` yields
    fn doc_count(&self) -> u32;
}

impl<R: Reader + ?Sized> Reader for &R {
    fn match_field(&self, field: &[u8], matcher: TermMatcher<'_>) -> Result<Vec<Bytes>> {
        (**self).match_field(field, matcher)
    }

    fn postings(&self, field: &[u8], term: &[u8]) -> Result<BoxPostings<'_>> {
        (**self).postings(field, term)
    }

    fn all_documents(&self) -> Result<BoxPostings<'_>> {
        (**self).all_documents()
    }

    fn doc_count(&self) -> u32 {
        (**self).doc_count()
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn match_field(&self, field: &[u8], matcher: TermMatcher<'_>) -> Result<Vec<Bytes>> {
        (**self).match_field(field, matcher)
    }

    fn postings(&self, field: &[u8], term: &[u8]) -> Result<BoxPostings<'_>> {
        (**self).postings(field, term)
    }

    fn all_documents(&self) -> Result<BoxPostings<'_>> {
        (**self).all_documents()
    }

    fn doc_count(&self) -> u32 {
        (**self).doc_count()
    }
}

impl<R: Reader + ?Sized> Reader for Arc<R> {
    fn match_field(&self, field: &[u8], matcher: TermMatcher<'_>) -> Result<Vec<Bytes>> {
        (**self).match_field(field, matcher)
    }

    fn postings(&self, field: &[u8], term: &[u8]) -> Result<BoxPostings<'_>> {
        (**self).postings(field, term)
    }

    fn all_documents(&self) -> Result<BoxPostings<'_>> {
        (**self).all_documents()
    }

    fn doc_count(&self) -> u32 {
        (**self).doc_count()
    }
}

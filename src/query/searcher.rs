//! Query searchers
//!
//! A [`Searcher`] binds a query to an ordered list of readers. Construction
//! resolves everything that depends on reader dictionaries (regexp and field
//! expansion) and fails as a whole if any reader cannot be enumerated. After
//! that, postings for reader `i` are opened on demand and composed lazily;
//! nothing is cached between calls, so asking twice yields the same stream.

use std::fmt;

use bytes::Bytes;
use roaring::RoaringBitmap;
use tracing::{debug, trace};

use super::ast::Query;
use crate::config::SearchSettings;
use crate::error::SearchError;
use crate::index::{Reader, TermMatcher};
use crate::postings::{
    collect_bitmap, collect_docs, BoxPostings, ConjunctionPostings, DisjunctionPostings, DocNo,
    EmptyPostings,
};
use crate::Result;

/// Reader-independent shape of a query, with expansions resolved per reader
#[derive(Debug)]
enum Plan {
    All,
    Empty,
    Term {
        field: Bytes,
        value: Bytes,
    },
    /// Terms of a field enumerated from each reader, indexed like the readers
    Expanded {
        field: Bytes,
        terms: Vec<Vec<Bytes>>,
    },
    Conjunction {
        required: Vec<Plan>,
        excluded: Vec<Plan>,
    },
    Disjunction(Vec<Plan>),
    Negation(Box<Plan>),
}

impl Plan {
    fn build<R: Reader>(query: &Query, readers: &[R], settings: &SearchSettings) -> Result<Self> {
        Ok(match query.canonical() {
            Query::All => Plan::All,
            Query::Term { field, value } => Plan::Term {
                field: field.clone(),
                value: value.clone(),
            },
            Query::Regexp(regexp) => Self::expand(
                regexp.field(),
                TermMatcher::Regexp(regexp.automaton()),
                readers,
                settings,
            )?,
            Query::Field { field } => Self::expand(field, TermMatcher::Any, readers, settings)?,
            Query::Conjunction(children) => {
                let mut required = Vec::new();
                let mut excluded = Vec::new();
                for child in children {
                    match child.canonical() {
                        Query::Negation(inner) => {
                            excluded.push(Self::build(inner, readers, settings)?)
                        }
                        positive => required.push(Self::build(positive, readers, settings)?),
                    }
                }
                if required.is_empty() {
                    required.push(Plan::All);
                }
                Plan::Conjunction { required, excluded }
            }
            Query::Disjunction(children) if children.is_empty() => Plan::Empty,
            Query::Disjunction(children) => Plan::Disjunction(
                children
                    .iter()
                    .map(|c| Self::build(c, readers, settings))
                    .collect::<Result<_>>()?,
            ),
            Query::Negation(child) => {
                Plan::Negation(Box::new(Self::build(child, readers, settings)?))
            }
        })
    }

    fn expand<R: Reader>(
        field: &Bytes,
        matcher: TermMatcher<'_>,
        readers: &[R],
        settings: &SearchSettings,
    ) -> Result<Self> {
        let mut terms = Vec::with_capacity(readers.len());
        for (idx, reader) in readers.iter().enumerate() {
            let matched = reader
                .match_field(field, matcher)
                .map_err(|e| e.in_reader(idx))?;
            if let Some(limit) = settings.max_expanded_terms {
                if matched.len() > limit {
                    return Err(SearchError::TooManyTerms {
                        field: String::from_utf8_lossy(field).into_owned(),
                        limit,
                    }
                    .in_reader(idx));
                }
            }
            trace!(
                field = %String::from_utf8_lossy(field),
                reader = idx,
                terms = matched.len(),
                "expanded field terms"
            );
            terms.push(matched);
        }
        Ok(Plan::Expanded {
            field: field.clone(),
            terms,
        })
    }

    fn open<'r, R: Reader>(&self, reader: &'r R, idx: usize) -> Result<BoxPostings<'r>> {
        match self {
            Plan::All => reader.all_documents(),
            Plan::Empty => Ok(Box::new(EmptyPostings)),
            Plan::Term { field, value } => reader.postings(field, value),
            Plan::Expanded { field, terms } => {
                let terms = terms.get(idx).map(Vec::as_slice).unwrap_or_default();
                match terms {
                    [] => Ok(Box::new(EmptyPostings)),
                    [term] => reader.postings(field, term),
                    _ => {
                        let children = terms
                            .iter()
                            .map(|term| reader.postings(field, term))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(Box::new(DisjunctionPostings::new(children)))
                    }
                }
            }
            Plan::Conjunction { required, excluded } => {
                let mut required = required
                    .iter()
                    .map(|p| p.open(reader, idx))
                    .collect::<Result<Vec<_>>>()?;
                let excluded = excluded
                    .iter()
                    .map(|p| p.open(reader, idx))
                    .collect::<Result<Vec<_>>>()?;
                if required.len() == 1 && excluded.is_empty() {
                    return Ok(required.remove(0));
                }
                Ok(Box::new(ConjunctionPostings::new(required, excluded)))
            }
            Plan::Disjunction(children) => {
                let mut children = children
                    .iter()
                    .map(|p| p.open(reader, idx))
                    .collect::<Result<Vec<_>>>()?;
                if children.len() == 1 {
                    return Ok(children.remove(0));
                }
                Ok(Box::new(DisjunctionPostings::new(children)))
            }
            Plan::Negation(child) => Ok(Box::new(ConjunctionPostings::complement(
                reader.all_documents()?,
                child.open(reader, idx)?,
            ))),
        }
    }
}

/// A query bound to an ordered set of readers
pub struct Searcher<'r, R> {
    readers: &'r [R],
    plan: Plan,
}

impl<'r, R: Reader> Searcher<'r, R> {
    pub(crate) fn new(query: &Query, readers: &'r [R], settings: &SearchSettings) -> Result<Self> {
        debug!(
            query = %query,
            query_type = query.query_type(),
            readers = readers.len(),
            "building searcher"
        );
        let plan = Plan::build(query, readers, settings)?;
        Ok(Self { readers, plan })
    }

    /// Number of readers this searcher spans
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Lazy postings of the matching documents of reader `index`.
    ///
    /// Document numbers are local to that reader. Each call opens a fresh
    /// stream.
    pub fn postings(&self, index: usize) -> Result<BoxPostings<'r>> {
        let reader = self
            .readers
            .get(index)
            .ok_or(SearchError::ReaderOutOfRange {
                index,
                len: self.readers.len(),
            })?;
        self.plan.open(reader, index)
    }

    /// Matching documents of reader `index`, in ascending order
    pub fn collect(&self, index: usize) -> Result<Vec<DocNo>> {
        collect_docs(&mut self.postings(index)?)
    }

    /// Matching documents of reader `index` as a bitmap
    pub fn bitmap(&self, index: usize) -> Result<RoaringBitmap> {
        collect_bitmap(&mut self.postings(index)?)
    }
}

impl<R> fmt::Debug for Searcher<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("readers", &self.readers.len())
            .field("plan", &self.plan)
            .finish()
    }
}

//! Query executor for running a query across a set of readers
//!
//! The executor builds one searcher for the query and materializes the
//! matches of every reader into a bitmap. A reader whose postings cannot be
//! read fails alone: its error is recorded and the other readers' results
//! stay valid.

use std::time::Instant;

use roaring::RoaringBitmap;
use tracing::{debug, warn};

use crate::config::SearchSettings;
use crate::error::SearchError;
use crate::index::Reader;
use crate::query::{Query, QueryDef};
use crate::Result;

/// Outcome for one reader, in reader order
#[derive(Debug)]
pub struct ReaderResult {
    /// Index of the reader in the slice passed to the executor
    pub reader: usize,
    pub outcome: Result<RoaringBitmap>,
}

/// Execution statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub readers: usize,
    pub readers_failed: usize,
    /// Matches summed over the readers that succeeded
    pub docs_matched: u64,
    /// Universe sizes summed over the readers that succeeded
    pub docs_searched: u64,
    /// Execution time in microseconds
    pub execution_time_us: u64,
}

/// Query execution result
#[derive(Debug)]
pub struct ExecutionResult {
    pub readers: Vec<ReaderResult>,
    pub stats: ExecutionStats,
}

impl ExecutionResult {
    /// Matches of a reader, if it succeeded
    pub fn matches(&self, reader: usize) -> Option<&RoaringBitmap> {
        self.readers
            .get(reader)
            .and_then(|r| r.outcome.as_ref().ok())
    }

    /// Readers that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (usize, &SearchError)> {
        self.readers
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.reader, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.stats.readers_failed == 0
    }
}

/// Runs queries with a fixed set of search settings
#[derive(Clone, Debug, Default)]
pub struct Executor {
    settings: SearchSettings,
}

impl Executor {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Build a query from its wire form using these settings' regexp limits
    pub fn decode(&self, def: QueryDef) -> Result<Query> {
        def.into_query(&self.settings.regexp)
    }

    /// Execute a query against every reader.
    ///
    /// Returns an error only when the searcher cannot be built. Failures
    /// while reading postings are reported per reader in the result.
    pub fn execute<R: Reader>(&self, query: &Query, readers: &[R]) -> Result<ExecutionResult> {
        let start = Instant::now();
        let searcher = query.searcher_with(readers, &self.settings)?;

        let mut stats = ExecutionStats {
            readers: searcher.len(),
            ..Default::default()
        };
        let mut results = Vec::with_capacity(searcher.len());

        for idx in 0..searcher.len() {
            let outcome = searcher.bitmap(idx);
            match &outcome {
                Ok(bitmap) => {
                    stats.docs_matched += bitmap.len();
                    stats.docs_searched += u64::from(readers[idx].doc_count());
                }
                Err(e) => {
                    warn!(reader = idx, query = %query, error = %e, "reader failed during search");
                    stats.readers_failed += 1;
                }
            }
            results.push(ReaderResult {
                reader: idx,
                outcome,
            });
        }

        stats.execution_time_us = start.elapsed().as_micros() as u64;
        debug!(
            "Executed {} over {} readers: {} of {} docs matched, {} failed",
            query.query_type(),
            stats.readers,
            stats.docs_matched,
            stats.docs_searched,
            stats.readers_failed
        );

        Ok(ExecutionResult {
            readers: results,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NegationScope, RegexpSettings};
    use crate::segment::{SegmentId, SegmentReader, SegmentReaderBuilder, SegmentWriter};

    fn segment(id: u64, docs: &[&[(&str, &str)]]) -> SegmentReader {
        let mut writer = SegmentWriter::new(SegmentId::new(id));
        for doc in docs {
            writer.add_document(doc.iter().copied()).unwrap();
        }
        writer.write().unwrap().reader
    }

    /// Segment whose dictionary points at postings that are gone
    fn broken_segment() -> SegmentReader {
        let mut writer = SegmentWriter::new(SegmentId::new(9));
        writer.add_document([("fruit", "apple")]).unwrap();
        let result = writer.write().unwrap();

        let field = &result.fields[0];
        SegmentReaderBuilder::new()
            .with_meta(result.reader.meta().clone())
            .with_field(&field.field, field.fst_data.clone(), field.metadata.clone())
            .with_postings(Vec::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_execute_across_readers() {
        let readers = vec![
            segment(1, &[&[("fruit", "apple")], &[("fruit", "banana")]]),
            segment(2, &[&[("fruit", "grape")], &[("fruit", "apple")]]),
        ];
        let executor = Executor::default();
        let result = executor
            .execute(&Query::term("fruit", "apple"), &readers)
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.stats.readers, 2);
        assert_eq!(result.stats.docs_matched, 2);
        assert_eq!(result.stats.docs_searched, 4);
        assert_eq!(result.matches(0).unwrap().iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(result.matches(1).unwrap().iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let readers = vec![
            segment(1, &[&[("fruit", "apple")]]),
            broken_segment(),
            segment(3, &[&[("fruit", "kiwi")], &[("fruit", "apple")]]),
        ];
        let result = Executor::default()
            .execute(&Query::term("fruit", "apple"), &readers)
            .unwrap();

        assert!(!result.is_complete());
        assert_eq!(result.stats.readers_failed, 1);
        assert_eq!(result.stats.docs_matched, 2);
        assert_eq!(result.stats.docs_searched, 3);
        assert!(result.matches(1).is_none());
        assert_eq!(result.matches(2).unwrap().len(), 1);

        let failures: Vec<_> = result.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert!(failures[0].1.is_reader_scoped());
    }

    #[test]
    fn test_construction_errors_fail_the_query() {
        let readers = vec![segment(1, &[&[("fruit", "apple")]])];
        let executor = Executor::new(
            SearchSettings::default().with_negation_scope(NegationScope::RequirePositiveSibling),
        );
        let err = executor
            .execute(&Query::negation(Query::term("fruit", "apple")), &readers)
            .unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
    }

    #[test]
    fn test_decode_uses_settings() {
        let def: QueryDef =
            serde_json::from_str(r#"{"type": "regexp", "field": "f", "pattern": "((a))"}"#).unwrap();
        let strict = Executor::new(
            SearchSettings::default()
                .with_regexp(RegexpSettings::default().with_nest_limit(1)),
        );
        assert!(strict.decode(def.clone()).is_err());
        assert!(Executor::default().decode(def).is_ok());
    }
}

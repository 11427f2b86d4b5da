//! Error types for regexp compilation and query search

use std::io;

use thiserror::Error;

/// Failure to turn a pattern into a regexp automaton.
///
/// Only ever produced while a regexp query is being constructed (or decoded),
/// never while a search is running.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("regexp pattern is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("invalid regexp syntax: {0}")]
    Syntax(#[from] Box<regex_syntax::Error>),

    #[error("cannot build regexp automaton: {0}")]
    Build(String),
}

/// Main error type for query construction and execution
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Reader access error: {0}")]
    ReaderAccess(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Reader index {index} out of range for searcher over {len} readers")]
    ReaderOutOfRange { index: usize, len: usize },

    #[error("Expansion of field {field:?} exceeded {limit} terms")]
    TooManyTerms { field: String, limit: usize },

    /// A failure attributed to one reader while building a searcher
    #[error("Reader {index}: {source}")]
    Reader {
        index: usize,
        #[source]
        source: Box<SearchError>,
    },
}

/// Result type alias for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    /// Build a reader access error for data that failed validation
    pub fn corrupt(msg: impl Into<String>) -> Self {
        SearchError::ReaderAccess(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
    }

    pub(crate) fn in_reader(self, index: usize) -> Self {
        SearchError::Reader {
            index,
            source: Box::new(self),
        }
    }

    /// Check if this error is confined to a single reader.
    ///
    /// Reader scoped failures leave sibling readers' results valid, so a caller
    /// may choose to skip the reader instead of failing the whole search.
    /// Errors from `Searcher::postings(i)` belong to reader `i`; errors from
    /// searcher construction name their reader through [`reader_index`].
    ///
    /// [`reader_index`]: SearchError::reader_index
    pub fn is_reader_scoped(&self) -> bool {
        matches!(
            self,
            SearchError::ReaderAccess(_) | SearchError::Reader { .. }
        )
    }

    /// Index of the reader a construction failure came from
    pub fn reader_index(&self) -> Option<usize> {
        match self {
            SearchError::Reader { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SearchError::ReaderOutOfRange { index: 3, len: 2 };
        assert_eq!(
            err.to_string(),
            "Reader index 3 out of range for searcher over 2 readers"
        );

        let err = SearchError::Configuration("bad".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad");
    }

    #[test]
    fn test_reader_scoped_errors() {
        assert!(SearchError::corrupt("truncated postings").is_reader_scoped());
        let too_many = SearchError::TooManyTerms {
            field: "f".to_string(),
            limit: 1,
        };
        assert!(!too_many.is_reader_scoped());
        assert_eq!(too_many.reader_index(), None);

        let err = too_many.in_reader(4);
        assert!(err.is_reader_scoped());
        assert_eq!(err.reader_index(), Some(4));
        assert_eq!(
            err.to_string(),
            "Reader 4: Expansion of field \"f\" exceeded 1 terms"
        );
        assert!(!SearchError::Configuration("x".to_string()).is_reader_scoped());
        assert!(!SearchError::ReaderOutOfRange { index: 0, len: 0 }.is_reader_scoped());
    }
}

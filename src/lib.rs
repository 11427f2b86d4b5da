//! Query execution core for segment-based inverted indexes
//!
//! Queries are immutable trees over opaque byte fields and terms. A query is
//! bound to a set of segment readers to produce a [`Searcher`], which yields
//! lazy, strictly increasing postings per reader. Regexp queries compile to
//! a DFA once and are matched against each segment's term dictionary.

pub mod automaton;
pub mod config;
pub mod error;
pub mod executor;
pub mod index;
pub mod postings;
pub mod query;
pub mod segment;

pub use automaton::RegexpAutomaton;
pub use config::{NegationScope, RegexpSettings, SearchSettings};
pub use error::{CompileError, Result, SearchError};
pub use executor::{ExecutionResult, ExecutionStats, Executor, ReaderResult};
pub use index::{Reader, TermMatcher};
pub use postings::{BoxPostings, DocNo, Postings};
pub use query::{Query, QueryDef, RegexpQuery, Searcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

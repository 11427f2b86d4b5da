//! Query algebra and searchers
//!
//! Queries are immutable trees built from terms, regexps, field presence and
//! boolean combinators:
//!
//! ```
//! use segquery::Query;
//!
//! let query = Query::conjunction([
//!     Query::term("city", "berlin"),
//!     Query::negation(Query::regexp("name", "a.*").unwrap()),
//! ]);
//! assert_eq!(
//!     query.to_string(),
//!     "conjunction(term(city, berlin), negation(regexp(name, a.*)))"
//! );
//! ```
//!
//! A query is bound to readers with [`Query::searcher`], which produces a
//! [`Searcher`] exposing lazy postings per reader.

pub mod ast;
pub mod codec;
pub mod searcher;

pub use ast::{Query, RegexpQuery};
pub use codec::QueryDef;
pub use searcher::Searcher;

//! Query algebra
//!
//! `Query` is a closed set of variants. Trees are immutable once built, own
//! their children, and are cheap to clone and share across threads and
//! searches.
//!
//! Equality is structural up to canonicalization: a conjunction or
//! disjunction with a single child is the same query as that child, and an
//! empty conjunction is the same query as [`Query::All`]. Hashing follows the
//! same rule, so a `Query` can key a result cache.

use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::automaton::RegexpAutomaton;
use crate::config::{NegationScope, RegexpSettings, SearchSettings};
use crate::error::SearchError;
use crate::index::Reader;
use crate::query::codec::QueryDef;
use crate::query::searcher::Searcher;
use crate::Result;

static MATCH_ALL: Query = Query::All;

/// A search over the documents of one or more readers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "QueryDef", into = "QueryDef")]
pub enum Query {
    /// Documents containing exactly `value` in `field`
    Term { field: Bytes, value: Bytes },
    /// Documents containing a term of the field matched by a pattern
    Regexp(RegexpQuery),
    /// Documents containing any term in `field`
    Field { field: Bytes },
    /// Documents matching every child; no children matches everything
    Conjunction(Vec<Query>),
    /// Documents matching at least one child; no children matches nothing
    Disjunction(Vec<Query>),
    /// Documents of the reader not matching the child.
    ///
    /// Outside a conjunction this walks the reader's whole universe, so its
    /// cost grows with the segment size rather than with the match count.
    /// Deeply nested negations multiply that cost.
    Negation(Box<Query>),
    /// Every document of the reader
    All,
}

/// Regexp query: the automaton is derived from the pattern and never part of
/// the query's identity.
#[derive(Clone, Debug)]
pub struct RegexpQuery {
    field: Bytes,
    pattern: Bytes,
    automaton: RegexpAutomaton,
}

impl RegexpQuery {
    pub fn new(field: impl AsRef<[u8]>, pattern: impl AsRef<[u8]>) -> Result<Self> {
        Self::with_settings(field, pattern, &RegexpSettings::default())
    }

    pub fn with_settings(
        field: impl AsRef<[u8]>,
        pattern: impl AsRef<[u8]>,
        settings: &RegexpSettings,
    ) -> Result<Self> {
        let pattern = Bytes::copy_from_slice(pattern.as_ref());
        let automaton = RegexpAutomaton::compile_with(&pattern, settings)?;
        Ok(Self {
            field: Bytes::copy_from_slice(field.as_ref()),
            pattern,
            automaton,
        })
    }

    pub fn field(&self) -> &Bytes {
        &self.field
    }

    pub fn pattern(&self) -> &Bytes {
        &self.pattern
    }

    pub fn automaton(&self) -> &RegexpAutomaton {
        &self.automaton
    }
}

impl PartialEq for RegexpQuery {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.pattern == other.pattern
    }
}

impl Eq for RegexpQuery {}

impl Hash for RegexpQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.pattern.hash(state);
    }
}

impl Query {
    /// Exact term match
    pub fn term(field: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        Query::Term {
            field: Bytes::copy_from_slice(field.as_ref()),
            value: Bytes::copy_from_slice(value.as_ref()),
        }
    }

    /// Regexp match; fails immediately if the pattern does not compile
    pub fn regexp(field: impl AsRef<[u8]>, pattern: impl AsRef<[u8]>) -> Result<Self> {
        RegexpQuery::new(field, pattern).map(Query::Regexp)
    }

    /// Regexp match with explicit compilation limits
    pub fn regexp_with(
        field: impl AsRef<[u8]>,
        pattern: impl AsRef<[u8]>,
        settings: &RegexpSettings,
    ) -> Result<Self> {
        RegexpQuery::with_settings(field, pattern, settings).map(Query::Regexp)
    }

    /// Documents having at least one term in `field`
    pub fn field(field: impl AsRef<[u8]>) -> Self {
        Query::Field {
            field: Bytes::copy_from_slice(field.as_ref()),
        }
    }

    pub fn conjunction(children: impl IntoIterator<Item = Query>) -> Self {
        Query::Conjunction(children.into_iter().collect())
    }

    pub fn disjunction(children: impl IntoIterator<Item = Query>) -> Self {
        Query::Disjunction(children.into_iter().collect())
    }

    pub fn negation(child: Query) -> Self {
        Query::Negation(Box::new(child))
    }

    pub fn all() -> Self {
        Query::All
    }

    /// The query this one is equivalent to once singleton boolean nodes are
    /// replaced by their child and an empty conjunction by `All`.
    pub fn canonical(&self) -> &Query {
        match self {
            Query::Conjunction(children) | Query::Disjunction(children) if children.len() == 1 => {
                children[0].canonical()
            }
            Query::Conjunction(children) if children.is_empty() => &MATCH_ALL,
            _ => self,
        }
    }

    /// Query type name for logging
    pub fn query_type(&self) -> &'static str {
        match self {
            Query::Term { .. } => "term",
            Query::Regexp(_) => "regexp",
            Query::Field { .. } => "field",
            Query::Conjunction(_) => "conjunction",
            Query::Disjunction(_) => "disjunction",
            Query::Negation(_) => "negation",
            Query::All => "all",
        }
    }

    /// Check the tree against structural limits before any reader is touched
    pub fn validate(&self, settings: &SearchSettings) -> Result<()> {
        self.validate_node(settings, 1, false)
    }

    fn validate_node(&self, settings: &SearchSettings, depth: usize, bounded: bool) -> Result<()> {
        if depth > settings.max_depth {
            return Err(SearchError::Configuration(format!(
                "query depth exceeds maximum of {}",
                settings.max_depth
            )));
        }

        match self.canonical() {
            Query::Conjunction(children) => {
                let has_positive = children
                    .iter()
                    .any(|c| !matches!(c.canonical(), Query::Negation(_)));
                for child in children {
                    child.validate_node(settings, depth + 1, has_positive)?;
                }
            }
            Query::Disjunction(children) => {
                for child in children {
                    child.validate_node(settings, depth + 1, false)?;
                }
            }
            Query::Negation(child) => {
                if settings.negation_scope == NegationScope::RequirePositiveSibling && !bounded {
                    return Err(SearchError::Configuration(format!(
                        "{} must appear in a conjunction with a non-negated sibling",
                        self.canonical()
                    )));
                }
                child.validate_node(settings, depth + 1, false)?;
            }
            Query::Term { .. } | Query::Regexp(_) | Query::Field { .. } | Query::All => {}
        }
        Ok(())
    }

    /// Build a searcher over `readers` with default settings
    pub fn searcher<'r, R: Reader>(&self, readers: &'r [R]) -> Result<Searcher<'r, R>> {
        self.searcher_with(readers, &SearchSettings::default())
    }

    /// Build a searcher over `readers`.
    ///
    /// Fails without a partial searcher if the query is invalid for the
    /// settings or any reader's dictionary cannot be enumerated.
    pub fn searcher_with<'r, R: Reader>(
        &self,
        readers: &'r [R],
        settings: &SearchSettings,
    ) -> Result<Searcher<'r, R>> {
        self.validate(settings)?;
        Searcher::new(self, readers, settings)
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical(), other.canonical()) {
            (
                Query::Term { field, value },
                Query::Term {
                    field: other_field,
                    value: other_value,
                },
            ) => field == other_field && value == other_value,
            (Query::Regexp(a), Query::Regexp(b)) => a == b,
            (Query::Field { field }, Query::Field { field: other_field }) => field == other_field,
            (Query::Conjunction(a), Query::Conjunction(b))
            | (Query::Disjunction(a), Query::Disjunction(b)) => a == b,
            (Query::Negation(a), Query::Negation(b)) => a == b,
            (Query::All, Query::All) => true,
            _ => false,
        }
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let query = self.canonical();
        std::mem::discriminant(query).hash(state);
        match query {
            Query::Term { field, value } => {
                field.hash(state);
                value.hash(state);
            }
            Query::Regexp(regexp) => regexp.hash(state),
            Query::Field { field } => field.hash(state),
            Query::Conjunction(children) | Query::Disjunction(children) => children.hash(state),
            Query::Negation(child) => child.hash(state),
            Query::All => {}
        }
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, name: &str, children: &[Query]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lossy = |b: &Bytes| String::from_utf8_lossy(b).into_owned();
        match self {
            Query::Term { field, value } => write!(f, "term({}, {})", lossy(field), lossy(value)),
            Query::Regexp(regexp) => write!(
                f,
                "regexp({}, {})",
                lossy(&regexp.field),
                lossy(&regexp.pattern)
            ),
            Query::Field { field } => write!(f, "field({})", lossy(field)),
            Query::Conjunction(children) => write_children(f, "conjunction", children),
            Query::Disjunction(children) => write_children(f, "disjunction", children),
            Query::Negation(child) => write!(f, "negation({child})"),
            Query::All => f.write_str("all()"),
        }
    }
}

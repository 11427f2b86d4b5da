//! Serializable query definitions
//!
//! `Query` serializes through [`QueryDef`], which carries the field and the
//! pattern of a regexp but never its automaton. Decoding recompiles the
//! pattern, so a definition with an invalid pattern fails to decode.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::ast::{Query, RegexpQuery};
use crate::config::RegexpSettings;
use crate::error::SearchError;
use crate::Result;

/// Wire form of a query tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryDef {
    Term { field: Bytes, value: Bytes },
    Regexp { field: Bytes, pattern: Bytes },
    Field { field: Bytes },
    Conjunction { queries: Vec<QueryDef> },
    Disjunction { queries: Vec<QueryDef> },
    Negation { query: Box<QueryDef> },
    All,
}

impl QueryDef {
    /// Build the query, compiling regexps with `settings`
    pub fn into_query(self, settings: &RegexpSettings) -> Result<Query> {
        Ok(match self {
            QueryDef::Term { field, value } => Query::Term { field, value },
            QueryDef::Regexp { field, pattern } => {
                Query::Regexp(RegexpQuery::with_settings(field, pattern, settings)?)
            }
            QueryDef::Field { field } => Query::Field { field },
            QueryDef::Conjunction { queries } => Query::Conjunction(
                queries
                    .into_iter()
                    .map(|q| q.into_query(settings))
                    .collect::<Result<_>>()?,
            ),
            QueryDef::Disjunction { queries } => Query::Disjunction(
                queries
                    .into_iter()
                    .map(|q| q.into_query(settings))
                    .collect::<Result<_>>()?,
            ),
            QueryDef::Negation { query } => Query::negation(query.into_query(settings)?),
            QueryDef::All => Query::All,
        })
    }
}

impl From<&Query> for QueryDef {
    fn from(query: &Query) -> Self {
        match query {
            Query::Term { field, value } => QueryDef::Term {
                field: field.clone(),
                value: value.clone(),
            },
            Query::Regexp(regexp) => QueryDef::Regexp {
                field: regexp.field().clone(),
                pattern: regexp.pattern().clone(),
            },
            Query::Field { field } => QueryDef::Field {
                field: field.clone(),
            },
            Query::Conjunction(children) => QueryDef::Conjunction {
                queries: children.iter().map(QueryDef::from).collect(),
            },
            Query::Disjunction(children) => QueryDef::Disjunction {
                queries: children.iter().map(QueryDef::from).collect(),
            },
            Query::Negation(child) => QueryDef::Negation {
                query: Box::new(QueryDef::from(child.as_ref())),
            },
            Query::All => QueryDef::All,
        }
    }
}

impl From<Query> for QueryDef {
    fn from(query: Query) -> Self {
        QueryDef::from(&query)
    }
}

impl TryFrom<QueryDef> for Query {
    type Error = SearchError;

    fn try_from(def: QueryDef) -> Result<Self> {
        def.into_query(&RegexpSettings::default())
    }
}

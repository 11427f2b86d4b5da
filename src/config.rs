//! Search and regexp compilation settings

use serde::{Deserialize, Serialize};

/// Where a negation query may appear in a query tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegationScope {
    /// Negation may appear anywhere, including at the top level.
    /// Readers must be able to enumerate their full universe.
    #[default]
    Unrestricted,
    /// Negation may only appear as a child of a conjunction that also has
    /// at least one non-negated child bounding the universe.
    RequirePositiveSibling,
}

/// Regexp compilation limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegexpSettings {
    /// Maximum heap size of the final DFA, in bytes
    pub dfa_size_limit: Option<usize>,
    /// Maximum heap used during determinization, in bytes
    pub determinize_size_limit: Option<usize>,
    /// Maximum nesting depth of groups and repetitions
    pub nest_limit: u32,
}

impl Default for RegexpSettings {
    fn default() -> Self {
        Self {
            dfa_size_limit: Some(10 * (1 << 20)),
            determinize_size_limit: Some(10 * (1 << 20)),
            nest_limit: 250,
        }
    }
}

impl RegexpSettings {
    /// Set the maximum DFA size
    pub fn with_dfa_size_limit(mut self, limit: Option<usize>) -> Self {
        self.dfa_size_limit = limit;
        self
    }

    /// Set the determinization memory limit
    pub fn with_determinize_size_limit(mut self, limit: Option<usize>) -> Self {
        self.determinize_size_limit = limit;
        self
    }

    /// Set the parser nesting limit
    pub fn with_nest_limit(mut self, limit: u32) -> Self {
        self.nest_limit = limit;
        self
    }
}

/// Settings applied when a query is turned into a searcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    pub negation_scope: NegationScope,
    /// Upper bound on terms a single regexp or field query may expand to
    /// within one reader. `None` disables the check.
    pub max_expanded_terms: Option<usize>,
    /// Maximum depth of the query tree
    pub max_depth: usize,
    /// Limits used when decoding regexp queries
    pub regexp: RegexpSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            negation_scope: NegationScope::Unrestricted,
            max_expanded_terms: None,
            max_depth: 64,
            regexp: RegexpSettings::default(),
        }
    }
}

impl SearchSettings {
    /// Set the negation scope
    pub fn with_negation_scope(mut self, scope: NegationScope) -> Self {
        self.negation_scope = scope;
        self
    }

    /// Set the expansion limit for regexp and field queries
    pub fn with_max_expanded_terms(mut self, limit: Option<usize>) -> Self {
        self.max_expanded_terms = limit;
        self
    }

    /// Set the maximum query depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the regexp limits
    pub fn with_regexp(mut self, regexp: RegexpSettings) -> Self {
        self.regexp = regexp;
        self
    }
}

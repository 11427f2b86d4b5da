//! Regexp automata for term dictionary matching
//!
//! A pattern is parsed with `regex-syntax`, anchored at both ends and
//! determinized into a dense byte-level DFA. A term matches only when the
//! whole term is accepted, the same way a dictionary regexp behaves.
//!
//! The automaton plugs into `fst` streams: dictionary subtrees whose prefix
//! drives the DFA into its dead state are skipped without being visited.

use std::fmt;
use std::sync::Arc;

use regex_automata::dfa::{dense, Automaton as _, StartKind};
use regex_automata::nfa::thompson;
use regex_automata::util::primitives::StateID;
use regex_automata::{Anchored, Input, MatchKind};
use regex_syntax::hir::{Hir, Look};
use regex_syntax::ParserBuilder;

use crate::config::RegexpSettings;
use crate::error::CompileError;

/// Compiled full-match automaton for one regexp pattern.
///
/// Cloning is cheap: the DFA tables are shared.
#[derive(Clone)]
pub struct RegexpAutomaton {
    dfa: Arc<dense::DFA<Vec<u32>>>,
    start: StateID,
}

impl RegexpAutomaton {
    /// Compile a pattern with default limits
    pub fn compile(pattern: &[u8]) -> Result<Self, CompileError> {
        Self::compile_with(pattern, &RegexpSettings::default())
    }

    /// Compile a pattern with explicit limits
    pub fn compile_with(pattern: &[u8], settings: &RegexpSettings) -> Result<Self, CompileError> {
        let pattern = std::str::from_utf8(pattern)?;
        let hir = ParserBuilder::new()
            .nest_limit(settings.nest_limit)
            .build()
            .parse(pattern)
            .map_err(Box::new)?;

        // Dictionary terms are matched whole, so leading `^` / trailing `$`
        // in the pattern are redundant but harmless.
        let anchored = Hir::concat(vec![Hir::look(Look::Start), hir, Hir::look(Look::End)]);

        let nfa = thompson::Compiler::new()
            .configure(thompson::Config::new().nfa_size_limit(settings.dfa_size_limit))
            .build_from_hir(&anchored)
            .map_err(|e| CompileError::Build(e.to_string()))?;

        let dfa = dense::Builder::new()
            .configure(
                dense::Config::new()
                    .start_kind(StartKind::Anchored)
                    // Keep every thread alive so `a|ab` still accepts "ab".
                    .match_kind(MatchKind::All)
                    .dfa_size_limit(settings.dfa_size_limit)
                    .determinize_size_limit(settings.determinize_size_limit),
            )
            .build_from_nfa(&nfa)
            .map_err(|e| CompileError::Build(e.to_string()))?;

        let start = dfa
            .start_state_forward(&Input::new("").anchored(Anchored::Yes))
            .map_err(|e| CompileError::Build(e.to_string()))?;

        Ok(Self {
            dfa: Arc::new(dfa),
            start,
        })
    }

    /// Point test: does the whole term match the pattern
    pub fn matches(&self, term: &[u8]) -> bool {
        let mut state = self.start;
        for &byte in term {
            state = self.dfa.next_state(state, byte);
            if self.dfa.is_dead_state(state) {
                return false;
            }
        }
        self.accepts(state)
    }

    /// Heap memory used by the DFA tables
    pub fn memory_usage(&self) -> usize {
        self.dfa.memory_usage()
    }

    // Match states are delayed by one transition, so acceptance is decided
    // on the end-of-input transition.
    fn accepts(&self, state: StateID) -> bool {
        self.dfa.is_match_state(self.dfa.next_eoi_state(state))
    }
}

impl fst::Automaton for RegexpAutomaton {
    type State = StateID;

    fn start(&self) -> StateID {
        self.start
    }

    fn is_match(&self, state: &StateID) -> bool {
        self.accepts(*state)
    }

    fn can_match(&self, state: &StateID) -> bool {
        !self.dfa.is_dead_state(*state) && !self.dfa.is_quit_state(*state)
    }

    fn accept(&self, state: &StateID, byte: u8) -> StateID {
        self.dfa.next_state(*state, byte)
    }
}

impl fmt::Debug for RegexpAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexpAutomaton")
            .field("memory_usage", &self.memory_usage())
            .finish()
    }
}

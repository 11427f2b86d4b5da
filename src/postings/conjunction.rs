//! Intersection of postings streams with optional exclusions

use super::{forward_target, BoxPostings, Cursor, DocNo, Postings};
use crate::Result;

/// Documents present in every required stream and absent from every
/// excluded stream.
///
/// Required streams are leapfrogged: the cheapest one leads and the others
/// `seek` to its candidate, so the work is bounded by the most selective
/// stream rather than the largest. Excluded streams are only ever advanced
/// to the current candidate, which turns a negated child into a single pass
/// difference instead of a complement against the universe.
///
/// With no required streams the intersection is empty. Callers wanting the
/// "everything except" semantics pass the reader universe as the only
/// required stream.
pub struct ConjunctionPostings<'a> {
    required: Vec<Cursor<'a>>,
    excluded: Vec<Cursor<'a>>,
    last: Option<DocNo>,
}

impl<'a> ConjunctionPostings<'a> {
    pub fn new(required: Vec<BoxPostings<'a>>, excluded: Vec<BoxPostings<'a>>) -> Self {
        let mut required: Vec<_> = required.into_iter().map(Cursor::new).collect();
        required.sort_by_key(|c| c.cost());
        Self {
            required,
            excluded: excluded.into_iter().map(Cursor::new).collect(),
            last: None,
        }
    }

    /// Complement of `excluded` within `universe`
    pub fn complement(universe: BoxPostings<'a>, excluded: BoxPostings<'a>) -> Self {
        Self::new(vec![universe], vec![excluded])
    }

    /// Starting from a lead candidate, find the first document every required
    /// stream agrees on that no excluded stream contains.
    fn align(&mut self, mut candidate: DocNo) -> Result<Option<DocNo>> {
        'candidate: loop {
            let mut i = 1;
            while i < self.required.len() {
                match self.required[i].advance_to(candidate)? {
                    None => return Ok(None),
                    Some(doc) if doc > candidate => match self.required[0].advance_to(doc)? {
                        None => return Ok(None),
                        Some(lead) => {
                            candidate = lead;
                            i = 1;
                        }
                    },
                    Some(_) => i += 1,
                }
            }

            for excluded in &mut self.excluded {
                if excluded.advance_to(candidate)? == Some(candidate) {
                    match self.required[0].advance()? {
                        None => return Ok(None),
                        Some(next) => {
                            candidate = next;
                            continue 'candidate;
                        }
                    }
                }
            }

            return Ok(Some(candidate));
        }
    }

    fn emit(&mut self, doc: Option<DocNo>) -> Option<DocNo> {
        if doc.is_some() {
            self.last = doc;
        }
        doc
    }
}

impl Postings for ConjunctionPostings<'_> {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        let Some(lead) = self.required.first_mut() else {
            return Ok(None);
        };
        let doc = match lead.advance()? {
            Some(candidate) => self.align(candidate)?,
            None => None,
        };
        Ok(self.emit(doc))
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        let Some(target) = forward_target(self.last, target) else {
            return Ok(None);
        };
        let Some(lead) = self.required.first_mut() else {
            return Ok(None);
        };
        let doc = match lead.advance_to(target)? {
            Some(candidate) => self.align(candidate)?,
            None => None,
        };
        Ok(self.emit(doc))
    }

    fn cost(&self) -> u64 {
        self.required.iter().map(Cursor::cost).min().unwrap_or(0)
    }
}

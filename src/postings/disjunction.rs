//! Union of postings streams

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{forward_target, BoxPostings, DocNo, Postings};
use crate::Result;

/// Documents present in at least one child stream.
///
/// Children are merged through a min-heap keyed by their current document;
/// a document contributed by several children is returned once.
pub struct DisjunctionPostings<'a> {
    children: Vec<BoxPostings<'a>>,
    heap: BinaryHeap<Reverse<(DocNo, usize)>>,
    started: bool,
    last: Option<DocNo>,
}

impl<'a> DisjunctionPostings<'a> {
    pub fn new(children: Vec<BoxPostings<'a>>) -> Self {
        let heap = BinaryHeap::with_capacity(children.len());
        Self {
            children,
            heap,
            started: false,
            last: None,
        }
    }

    fn start(&mut self, target: Option<DocNo>) -> Result<()> {
        self.started = true;
        for (idx, child) in self.children.iter_mut().enumerate() {
            let doc = match target {
                Some(target) => child.seek(target)?,
                None => child.next_doc()?,
            };
            if let Some(doc) = doc {
                self.heap.push(Reverse((doc, idx)));
            }
        }
        Ok(())
    }

    /// Pop the smallest document and advance every child positioned on it
    fn pop_min(&mut self) -> Result<Option<DocNo>> {
        let Some(Reverse((doc, idx))) = self.heap.pop() else {
            return Ok(None);
        };
        self.refill(idx)?;
        while let Some(&Reverse((next, idx))) = self.heap.peek() {
            if next != doc {
                break;
            }
            self.heap.pop();
            self.refill(idx)?;
        }
        self.last = Some(doc);
        Ok(Some(doc))
    }

    fn refill(&mut self, idx: usize) -> Result<()> {
        if let Some(doc) = self.children[idx].next_doc()? {
            self.heap.push(Reverse((doc, idx)));
        }
        Ok(())
    }
}

impl Postings for DisjunctionPostings<'_> {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        if !self.started {
            self.start(None)?;
        }
        self.pop_min()
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        let Some(target) = forward_target(self.last, target) else {
            return Ok(None);
        };
        if !self.started {
            self.start(Some(target))?;
            return self.pop_min();
        }
        while let Some(&Reverse((doc, idx))) = self.heap.peek() {
            if doc >= target {
                break;
            }
            self.heap.pop();
            if let Some(doc) = self.children[idx].seek(target)? {
                self.heap.push(Reverse((doc, idx)));
            }
        }
        self.pop_min()
    }

    fn cost(&self) -> u64 {
        self.children.iter().map(|c| c.cost()).sum::<u64>() + self.heap.len() as u64
    }
}

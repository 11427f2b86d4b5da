//! Lazy postings streams and the set-algebra combinators over them
//!
//! A postings stream is a fallible cursor over strictly increasing document
//! numbers of one reader. Combinators never materialize their inputs: an
//! intersection leapfrogs with `seek`, a union merges through a heap, and a
//! complement walks the universe once while skipping the excluded stream.

mod conjunction;
mod disjunction;

use std::borrow::Cow;
use std::fmt;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use conjunction::ConjunctionPostings;
pub use disjunction::DisjunctionPostings;

/// Dense document number within a reader (0..doc_count)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocNo(pub u32);

impl DocNo {
    pub const MAX: DocNo = DocNo(u32::MAX);

    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// The next document number, `None` at `DocNo::MAX`
    pub fn successor(self) -> Option<DocNo> {
        self.0.checked_add(1).map(DocNo)
    }
}

impl fmt::Display for DocNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cursor over a sorted, duplicate-free postings list.
///
/// Both methods return documents that have not been returned before, in
/// strictly increasing order. `Ok(None)` means the stream is exhausted; an
/// error means the reader could not produce the data and the stream must not
/// be used further.
pub trait Postings {
    /// Advance to the next document
    fn next_doc(&mut self) -> Result<Option<DocNo>>;

    /// Advance to the first unreturned document `>= target`
    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        while let Some(doc) = self.next_doc()? {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Upper bound on the number of documents this stream yields
    fn cost(&self) -> u64;
}

/// Boxed postings stream borrowing reader data for `'a`
pub type BoxPostings<'a> = Box<dyn Postings + 'a>;

impl<P: Postings + ?Sized> Postings for Box<P> {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        (**self).next_doc()
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        (**self).seek(target)
    }

    fn cost(&self) -> u64 {
        (**self).cost()
    }
}

/// Drain a stream into a vector
pub fn collect_docs<P: Postings + ?Sized>(postings: &mut P) -> Result<Vec<DocNo>> {
    let mut docs = Vec::new();
    while let Some(doc) = postings.next_doc()? {
        docs.push(doc);
    }
    Ok(docs)
}

/// Drain a stream into a bitmap
pub fn collect_bitmap<P: Postings + ?Sized>(postings: &mut P) -> Result<RoaringBitmap> {
    let mut bitmap = RoaringBitmap::new();
    while let Some(doc) = postings.next_doc()? {
        bitmap.insert(doc.as_u32());
    }
    Ok(bitmap)
}

/// Stream with no documents
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyPostings;

impl Postings for EmptyPostings {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        Ok(None)
    }

    fn seek(&mut self, _target: DocNo) -> Result<Option<DocNo>> {
        Ok(None)
    }

    fn cost(&self) -> u64 {
        0
    }
}

/// Every document in `[start, end)`; the universe of a dense reader
#[derive(Clone, Debug)]
pub struct RangePostings {
    next: u32,
    end: u32,
}

impl RangePostings {
    pub fn new(start: u32, end: u32) -> Self {
        Self { next: start, end }
    }

    /// The universe `0..doc_count`
    pub fn universe(doc_count: u32) -> Self {
        Self::new(0, doc_count)
    }
}

impl Postings for RangePostings {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        if self.next >= self.end {
            return Ok(None);
        }
        let doc = DocNo(self.next);
        self.next += 1;
        Ok(Some(doc))
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        self.next = self.next.max(target.0);
        self.next_doc()
    }

    fn cost(&self) -> u64 {
        self.end.saturating_sub(self.next) as u64
    }
}

/// Stream over an in-memory sorted list
#[derive(Clone, Debug)]
pub struct VecPostings {
    docs: Vec<DocNo>,
    pos: usize,
}

impl VecPostings {
    /// Sorts and deduplicates the input
    pub fn new(mut docs: Vec<DocNo>) -> Self {
        docs.sort_unstable();
        docs.dedup();
        Self { docs, pos: 0 }
    }

    pub fn from_u32s(docs: impl IntoIterator<Item = u32>) -> Self {
        Self::new(docs.into_iter().map(DocNo).collect())
    }
}

impl Postings for VecPostings {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        let doc = self.docs.get(self.pos).copied();
        if doc.is_some() {
            self.pos += 1;
        }
        Ok(doc)
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        self.pos += self.docs[self.pos..].partition_point(|&d| d < target);
        self.next_doc()
    }

    fn cost(&self) -> u64 {
        (self.docs.len() - self.pos) as u64
    }
}

/// Stream over a roaring bitmap, borrowed or owned
#[derive(Clone, Debug)]
pub struct BitmapPostings<'a> {
    bitmap: Cow<'a, RoaringBitmap>,
    /// Rank of the next document to return
    pos: u64,
}

impl<'a> BitmapPostings<'a> {
    pub fn borrowed(bitmap: &'a RoaringBitmap) -> Self {
        Self {
            bitmap: Cow::Borrowed(bitmap),
            pos: 0,
        }
    }

    pub fn owned(bitmap: RoaringBitmap) -> BitmapPostings<'static> {
        BitmapPostings {
            bitmap: Cow::Owned(bitmap),
            pos: 0,
        }
    }
}

impl Postings for BitmapPostings<'_> {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        let doc = self.bitmap.select(self.pos as u32).map(DocNo);
        if doc.is_some() {
            self.pos += 1;
        }
        Ok(doc)
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        if let Some(prev) = target.0.checked_sub(1) {
            // rank(x) counts values <= x
            self.pos = self.pos.max(self.bitmap.rank(prev));
        }
        self.next_doc()
    }

    fn cost(&self) -> u64 {
        self.bitmap.len().saturating_sub(self.pos)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    Unstarted,
    At(DocNo),
    Exhausted,
}

/// Postings stream that remembers its current document.
///
/// Combinators use it so a child positioned at or past a target is not moved.
pub(crate) struct Cursor<'a> {
    inner: BoxPostings<'a>,
    state: CursorState,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(inner: BoxPostings<'a>) -> Self {
        Self {
            inner,
            state: CursorState::Unstarted,
        }
    }

    pub(crate) fn cost(&self) -> u64 {
        match self.state {
            CursorState::Exhausted => 0,
            _ => self.inner.cost(),
        }
    }

    /// Move past the current document
    pub(crate) fn advance(&mut self) -> Result<Option<DocNo>> {
        if self.state == CursorState::Exhausted {
            return Ok(None);
        }
        let doc = self.inner.next_doc()?;
        self.state = doc.map_or(CursorState::Exhausted, CursorState::At);
        Ok(doc)
    }

    /// Position on the first document `>= target`, staying put if already there
    pub(crate) fn advance_to(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        match self.state {
            CursorState::Exhausted => Ok(None),
            CursorState::At(doc) if doc >= target => Ok(Some(doc)),
            _ => {
                let doc = self.inner.seek(target)?;
                self.state = doc.map_or(CursorState::Exhausted, CursorState::At);
                Ok(doc)
            }
        }
    }
}

/// Target for a combinator's own `seek`, never at or before the last returned document
pub(crate) fn forward_target(last: Option<DocNo>, target: DocNo) -> Option<DocNo> {
    match last {
        Some(last) if last >= target => last.successor(),
        _ => Some(target),
    }
}

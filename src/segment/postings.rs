//! Postings format with block-based compression
//!
//! A posting list is laid out as:
//! - block count (vbyte)
//! - one skip entry per block: max docno (vbyte), block offset (u64 LE)
//! - blocks: doc count (vbyte) followed by bitpacked docno deltas
//!
//! Deltas run across block boundaries, so the first delta of a block is
//! relative to the previous block's max docno. Skip entries let `seek` jump
//! straight to the first block that can hold the target.

use std::io;

use super::types::{PostingListMeta, BLOCK_SIZE};
use crate::postings::{DocNo, Postings};
use crate::Result;

fn corrupt(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn eof(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, msg.to_string())
}

/// Variable-byte encoding for integers
pub fn encode_vbyte(value: u32, output: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            output.push(byte | 0x80); // High bit marks the last byte
            break;
        } else {
            output.push(byte);
        }
    }
}

/// Decode a variable-byte encoded integer
pub fn decode_vbyte(input: &[u8], pos: &mut usize) -> io::Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = input.get(*pos) else {
            return Err(eof("Unexpected end of vbyte"));
        };
        *pos += 1;

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 != 0 {
            return Ok(result);
        }

        shift += 7;
        if shift > 28 {
            return Err(corrupt("VByte value too large"));
        }
    }
}

fn read_u64(input: &[u8], pos: &mut usize) -> io::Result<u64> {
    let bytes: [u8; 8] = pos
        .checked_add(8)
        .and_then(|end| input.get(*pos..end))
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| eof("Unexpected end of skip entry"))?;
    *pos += 8;
    Ok(u64::from_le_bytes(bytes))
}

/// Bitpack a block of integers using the width of the largest value
pub fn bitpack_encode(values: &[u32], output: &mut Vec<u8>) {
    let Some(max_val) = values.iter().copied().max() else {
        output.push(0); // 0 bits needed
        return;
    };
    let bits_needed = if max_val == 0 {
        1
    } else {
        32 - max_val.leading_zeros()
    } as u8;

    output.push(bits_needed);

    let mut current_byte: u64 = 0;
    let mut bits_in_current = 0;

    for &value in values {
        current_byte |= (value as u64) << bits_in_current;
        bits_in_current += bits_needed as u32;

        while bits_in_current >= 8 {
            output.push(current_byte as u8);
            current_byte >>= 8;
            bits_in_current -= 8;
        }
    }

    if bits_in_current > 0 {
        output.push(current_byte as u8);
    }
}

/// Decode `count` bitpacked integers
pub fn bitpack_decode(input: &[u8], pos: &mut usize, count: usize) -> io::Result<Vec<u32>> {
    let Some(&bits_needed) = input.get(*pos) else {
        return Err(eof("Unexpected end of bitpack"));
    };
    *pos += 1;
    let bits_needed = bits_needed as u32;

    if bits_needed == 0 {
        return Ok(vec![0; count]);
    }
    if bits_needed > 32 {
        return Err(corrupt("Bitpack width exceeds 32 bits"));
    }

    let total_bits = count as u64 * bits_needed as u64;
    let bytes_needed = total_bits.div_ceil(8) as usize;

    if *pos + bytes_needed > input.len() {
        return Err(eof("Not enough bytes for bitpack"));
    }

    let mut values = Vec::with_capacity(count);
    let mut current: u64 = 0;
    let mut bits_available = 0;
    let mask = (1u64 << bits_needed) - 1;

    for _ in 0..count {
        while bits_available < bits_needed {
            current |= (input[*pos] as u64) << bits_available;
            *pos += 1;
            bits_available += 8;
        }

        values.push((current & mask) as u32);
        current >>= bits_needed;
        bits_available -= bits_needed;
    }

    Ok(values)
}

/// Skip data for one block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkipEntry {
    /// Maximum docno in this block
    pub max_docno: DocNo,
    /// Offset of the block from the start of the block area
    pub block_offset: u64,
}

/// Writer for posting lists
pub struct PostingsWriter {
    /// Encoded blocks of the current list
    block_data: Vec<u8>,
    /// Skip entries of the current list
    skip_entries: Vec<SkipEntry>,
    /// Docnos not yet flushed
    current_block: Vec<DocNo>,
    /// Last docno added to the current list
    last_docno: Option<DocNo>,
    /// Delta base for the next block
    block_base: u32,
    doc_frequency: u32,
    /// Final output data
    data: Vec<u8>,
}

impl PostingsWriter {
    pub fn new() -> Self {
        Self {
            block_data: Vec::new(),
            skip_entries: Vec::new(),
            current_block: Vec::with_capacity(BLOCK_SIZE),
            last_docno: None,
            block_base: 0,
            doc_frequency: 0,
            data: Vec::new(),
        }
    }

    /// Start writing a new posting list
    pub fn start_posting_list(&mut self) {
        self.block_data.clear();
        self.skip_entries.clear();
        self.current_block.clear();
        self.last_docno = None;
        self.block_base = 0;
        self.doc_frequency = 0;
    }

    /// Add a document to the current list; docnos must strictly increase
    pub fn add(&mut self, docno: DocNo) -> io::Result<()> {
        if self.last_docno.is_some_and(|last| last >= docno) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("docno {docno} added out of order"),
            ));
        }
        self.last_docno = Some(docno);
        self.doc_frequency += 1;
        self.current_block.push(docno);

        if self.current_block.len() >= BLOCK_SIZE {
            self.flush_block();
        }
        Ok(())
    }

    /// Finish writing a posting list and return its metadata
    pub fn finish_posting_list(&mut self) -> PostingListMeta {
        self.flush_block();

        let offset = self.data.len() as u64;

        encode_vbyte(self.skip_entries.len() as u32, &mut self.data);
        for skip in &self.skip_entries {
            encode_vbyte(skip.max_docno.as_u32(), &mut self.data);
            self.data.extend_from_slice(&skip.block_offset.to_le_bytes());
        }
        self.data.extend_from_slice(&self.block_data);

        PostingListMeta {
            offset,
            length: self.data.len() as u64 - offset,
            doc_frequency: self.doc_frequency,
        }
    }

    /// Take the data (consuming the writer)
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn flush_block(&mut self) {
        let Some(&max_docno) = self.current_block.last() else {
            return;
        };

        self.skip_entries.push(SkipEntry {
            max_docno,
            block_offset: self.block_data.len() as u64,
        });

        encode_vbyte(self.current_block.len() as u32, &mut self.block_data);

        let mut deltas = Vec::with_capacity(self.current_block.len());
        let mut prev = self.block_base;
        for docno in &self.current_block {
            deltas.push(docno.as_u32() - prev);
            prev = docno.as_u32();
        }
        bitpack_encode(&deltas, &mut self.block_data);

        self.block_base = max_docno.as_u32();
        self.current_block.clear();
    }
}

impl Default for PostingsWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader over the postings data of a segment
#[derive(Debug)]
pub struct PostingsReader {
    data: Vec<u8>,
}

impl PostingsReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Open the posting list described by `meta`
    pub fn get_postings(&self, meta: &PostingListMeta) -> io::Result<PostingIterator<'_>> {
        let slice = usize::try_from(meta.offset)
            .ok()
            .zip(usize::try_from(meta.length).ok())
            .and_then(|(start, len)| Some(start..start.checked_add(len)?))
            .and_then(|range| self.data.get(range))
            .ok_or_else(|| corrupt("Posting list extends beyond data"))?;

        PostingIterator::new(slice, meta.doc_frequency)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lazy cursor over one posting list
pub struct PostingIterator<'a> {
    data: &'a [u8],
    /// Position in data where blocks start (after skip entries)
    blocks_start: usize,
    /// Current position in data
    pos: usize,
    skip_entries: Vec<SkipEntry>,
    /// Index of the next block to decode
    next_block: usize,
    current_block: Vec<DocNo>,
    /// Position within current block
    block_pos: usize,
    /// Delta base for the next block
    last_docno: u32,
    /// Upper bound on documents not yet returned
    remaining: u64,
}

impl<'a> PostingIterator<'a> {
    /// Parse the list header. Blocks are decoded on demand.
    pub fn new(data: &'a [u8], doc_frequency: u32) -> io::Result<Self> {
        let mut pos = 0;
        let block_count = decode_vbyte(data, &mut pos)? as usize;
        if block_count > data.len() {
            return Err(corrupt("Block count exceeds posting list size"));
        }

        let mut skip_entries = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let max_docno = DocNo(decode_vbyte(data, &mut pos)?);
            let block_offset = read_u64(data, &mut pos)?;
            skip_entries.push(SkipEntry {
                max_docno,
                block_offset,
            });
        }

        Ok(Self {
            data,
            blocks_start: pos,
            pos,
            skip_entries,
            next_block: 0,
            current_block: Vec::with_capacity(BLOCK_SIZE),
            block_pos: 0,
            last_docno: 0,
            remaining: doc_frequency as u64,
        })
    }

    pub fn block_count(&self) -> usize {
        self.skip_entries.len()
    }

    fn load_next_block(&mut self) -> io::Result<bool> {
        let Some(expected_max) = self.skip_entries.get(self.next_block).map(|s| s.max_docno) else {
            return Ok(false);
        };

        let count = decode_vbyte(self.data, &mut self.pos)? as usize;
        if count == 0 || count > BLOCK_SIZE {
            return Err(corrupt("Invalid postings block length"));
        }
        let deltas = bitpack_decode(self.data, &mut self.pos, count)?;

        self.current_block.clear();
        let mut docno = self.last_docno;
        for (i, delta) in deltas.into_iter().enumerate() {
            let first_of_list = self.next_block == 0 && i == 0;
            if delta == 0 && !first_of_list {
                return Err(corrupt("Postings are not strictly increasing"));
            }
            docno = docno
                .checked_add(delta)
                .ok_or_else(|| corrupt("Docno overflow in postings block"))?;
            self.current_block.push(DocNo(docno));
        }

        if DocNo(docno) != expected_max {
            return Err(corrupt("Postings block does not match its skip entry"));
        }

        self.last_docno = docno;
        self.block_pos = 0;
        self.next_block += 1;
        Ok(true)
    }

    fn jump_to(&mut self, block: usize) -> io::Result<()> {
        let offset = self.skip_entries[block].block_offset;
        self.pos = usize::try_from(offset)
            .ok()
            .and_then(|o| self.blocks_start.checked_add(o))
            .ok_or_else(|| corrupt("Block offset out of range"))?;
        self.last_docno = block
            .checked_sub(1)
            .map_or(0, |prev| self.skip_entries[prev].max_docno.as_u32());
        self.next_block = block;
        self.current_block.clear();
        self.block_pos = 0;
        Ok(())
    }

    fn exhaust(&mut self) {
        self.next_block = self.skip_entries.len();
        self.current_block.clear();
        self.block_pos = 0;
        self.remaining = 0;
    }
}

impl Postings for PostingIterator<'_> {
    fn next_doc(&mut self) -> Result<Option<DocNo>> {
        if self.block_pos >= self.current_block.len() && !self.load_next_block()? {
            return Ok(None);
        }
        let doc = self.current_block[self.block_pos];
        self.block_pos += 1;
        self.remaining = self.remaining.saturating_sub(1);
        Ok(Some(doc))
    }

    fn seek(&mut self, target: DocNo) -> Result<Option<DocNo>> {
        let in_current = self.block_pos < self.current_block.len()
            && self.current_block.last().is_some_and(|&max| max >= target);

        if !in_current {
            let found = self.skip_entries[self.next_block..]
                .iter()
                .position(|s| s.max_docno >= target);
            match found {
                None => {
                    self.exhaust();
                    return Ok(None);
                }
                // The next block is read in order, only the rest of the
                // current one is dropped.
                Some(0) => {
                    self.current_block.clear();
                    self.block_pos = 0;
                }
                Some(n) => self.jump_to(self.next_block + n)?,
            }
        }

        while let Some(doc) = self.next_doc()? {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn cost(&self) -> u64 {
        self.remaining
    }
}

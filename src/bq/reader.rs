//! Memory-mapped reader for BQ files
//!
//! Records in a BQ file have a fixed size, so any record can be addressed by
//! its 0-based index without scanning the file. The splitter relies on this:
//! a record index is the identifier of a record and copying a record is a
//! plain byte copy out of the map.

use std::fs::File;
use std::ops::Range;
use std::path::Path;

use bitnuc::BitSize;
use bytemuck::cast_slice;
use memmap2::Mmap;

use super::header::{BinseqHeader, SIZE_HEADER};
use super::RecordIndex;
use crate::error::{HeaderError, ReadError, Result};

/// Configuration for binary sequence record layout
///
/// Translates the sequence lengths of the header into the number of u64 words
/// each record occupies on disk.
#[derive(Clone, Copy, Debug)]
pub struct RecordConfig {
    /// The primary sequence length in base pairs
    slen: u64,
    /// The number of u64 words needed to store the primary sequence
    schunk: u64,
    /// The number of u64 words needed to store the extended sequence
    xchunk: u64,
    /// The bitsize of the record
    bitsize: BitSize,
    /// Whether flags are present
    flags: bool,
}
impl RecordConfig {
    #[must_use]
    pub fn new(slen: usize, xlen: usize, bitsize: BitSize, flags: bool) -> Self {
        let (schunk, xchunk) = match bitsize {
            BitSize::Two => (slen.div_ceil(32), xlen.div_ceil(32)),
            BitSize::Four => (slen.div_ceil(16), xlen.div_ceil(16)),
        };
        Self {
            slen: slen as u64,
            schunk: schunk as u64,
            xchunk: xchunk as u64,
            bitsize,
            flags,
        }
    }

    #[must_use]
    pub fn from_header(header: &BinseqHeader) -> Self {
        Self::new(
            header.slen as usize,
            header.xlen as usize,
            header.bits,
            header.flags,
        )
    }

    #[must_use]
    pub fn slen(&self) -> usize {
        self.slen as usize
    }

    /// Returns the full record size in u64 words: schunk + xchunk (+ 1 flag)
    #[must_use]
    pub fn record_size_u64(&self) -> usize {
        if self.flags {
            (self.schunk + self.xchunk + 1) as usize
        } else {
            (self.schunk + self.xchunk) as usize
        }
    }

    /// Returns the full record size in bytes
    #[must_use]
    pub fn record_size_bytes(&self) -> usize {
        8 * self.record_size_u64()
    }
}

/// A reference to a binary sequence record in a memory-mapped file
#[derive(Clone, Copy)]
pub struct RefRecord<'a> {
    /// The u64 words of the record, flag included
    buffer: &'a [u64],
    config: RecordConfig,
}
impl<'a> RefRecord<'a> {
    #[must_use]
    pub fn new(buffer: &'a [u64], config: RecordConfig) -> Self {
        debug_assert_eq!(buffer.len(), config.record_size_u64());
        Self { buffer, config }
    }

    #[must_use]
    pub fn flag(&self) -> Option<u64> {
        self.config.flags.then(|| self.buffer[0])
    }

    /// The **encoded** primary sequence
    #[must_use]
    pub fn sbuf(&self) -> &[u64] {
        let start = usize::from(self.config.flags);
        &self.buffer[start..start + self.config.schunk as usize]
    }

    /// Decodes the primary sequence into the provided buffer
    pub fn decode_s(&self, dbuf: &mut Vec<u8>) -> Result<()> {
        self.config
            .bitsize
            .decode(self.sbuf(), self.config.slen(), dbuf)?;
        Ok(())
    }
}

/// A memory-mapped reader for BQ files
///
/// Every split job opens its own `MmapReader`; nothing about a reader is
/// shared between worker threads.
pub struct MmapReader {
    /// Memory mapped file contents
    mmap: Mmap,

    /// File header containing format information
    header: BinseqHeader,

    /// Configuration defining the layout of records in the file
    config: RecordConfig,
}

impl MmapReader {
    /// Opens and memory-maps a BQ file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be opened
    /// * The file is not a regular file
    /// * The file header is invalid
    /// * The record section is not a whole number of records
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile.into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };

        let header = BinseqHeader::from_buffer(&mmap)?;
        let config = RecordConfig::from_header(&header);
        if config.record_size_bytes() == 0 {
            return Err(HeaderError::EmptyRecordLayout.into());
        }

        if !(mmap.len() - SIZE_HEADER).is_multiple_of(config.record_size_bytes()) {
            return Err(ReadError::FileTruncation(mmap.len()).into());
        }

        Ok(Self {
            mmap,
            header,
            config,
        })
    }

    /// Returns the total number of records in the file
    #[must_use]
    pub fn num_records(&self) -> usize {
        (self.mmap.len() - SIZE_HEADER) / self.config.record_size_bytes()
    }

    #[must_use]
    pub fn header(&self) -> BinseqHeader {
        self.header
    }

    /// Returns the identifiers of all records in file order
    ///
    /// The iterator is lazy and borrows the reader; iterating again requires
    /// another call.
    pub fn identifiers(&self) -> impl Iterator<Item = RecordIndex> + '_ {
        (0..self.num_records() as u64).map(RecordIndex)
    }

    /// Returns the raw on-disk bytes of a record, flag included
    pub fn record_bytes(&self, idx: usize) -> Result<&[u8]> {
        let range = self.byte_range(idx..idx + 1)?;
        Ok(&self.mmap[range])
    }

    /// Returns a reference to a specific record
    pub fn get(&self, idx: usize) -> Result<RefRecord<'_>> {
        let range = self.byte_range(idx..idx + 1)?;
        let buffer = cast_slice(&self.mmap[range]);
        Ok(RefRecord::new(buffer, self.config))
    }

    fn byte_range(&self, range: Range<usize>) -> Result<Range<usize>> {
        if range.end > self.num_records() {
            return Err(ReadError::OutOfRange(range.end - 1, self.num_records()).into());
        }
        let rsize = self.config.record_size_bytes();
        let lbound = SIZE_HEADER + (range.start * rsize);
        let rbound = lbound + ((range.end - range.start) * rsize);
        Ok(lbound..rbound)
    }
}

//! # bq
//!
//! *.bq files are BINSEQ variants for **fixed-length** records.
//!
//! This module contains the reader, the writer and the [`Format`] implementation
//! the splitter uses to repack records into chunk files.
//!
//! ## BQ file format
//!
//! A BQ file consists of two sections:
//!
//! 1. Fixed-size header (32 bytes)
//! 2. Record data section
//!
//! ### Header Format (32 bytes total)
//!
//! | Offset | Size (bytes) | Name     | Description                  | Type   |
//! | ------ | ------------ | -------- | ---------------------------- | ------ |
//! | 0      | 4            | magic    | Magic number (0x51455342)    | uint32 |
//! | 4      | 1            | format   | Format version (currently 1) | uint8  |
//! | 5      | 4            | slen     | Sequence length (primary)    | uint32 |
//! | 9      | 4            | xlen     | Sequence length (secondary)  | uint32 |
//! | 13     | 1            | bits     | Bits per nucleotide (2 or 4) | uint8  |
//! | 14     | 1            | flags    | Records carry a flag word    | uint8  |
//! | 15     | 17           | reserved | Reserved for future use      | bytes  |
//!
//! ### Record Format
//!
//! Each record consists of:
//!
//! 1. Flag field (8 bytes, uint64), present when the header enables flags
//! 2. Primary sequence data (ceil(slen/32) \* 8 bytes for 2-bit encoding)
//! 3. Secondary sequence data (ceil(xlen/32) \* 8 bytes), empty when xlen is 0
//!
//! Since every record has the same size, the record at index `i` starts at
//! byte `32 + i * record_size` and the number of records is
//! `(file_size - 32) / record_size`.
//!
//! ## Record identifiers
//!
//! A record is identified by its 0-based position, [`RecordIndex`]. Repacking a
//! selection of indices copies the encoded words of each record verbatim, so
//! chunk files decode to exactly the same sequences and flags as the source.

mod header;
mod reader;
mod writer;

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub use header::{BinseqHeader, BinseqHeaderBuilder, RESERVED, SIZE_HEADER};
pub use reader::{MmapReader, RecordConfig, RefRecord};
pub use writer::{write_buffer, write_flag, BinseqWriter, Encoder};

use crate::error::{Result, SplitError};
use crate::format::{Format, FormatReader};

/// Position of a record within a BQ file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordIndex(pub u64);

impl fmt::Display for RecordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The BQ container format
#[derive(Debug, Clone, Copy, Default)]
pub struct Bq;

impl Bq {
    /// Extension of BQ files
    pub const EXTENSION: &'static str = "bq";
}

impl FormatReader for MmapReader {
    type Id = RecordIndex;

    fn num_records(&self) -> usize {
        MmapReader::num_records(self)
    }

    fn identifiers(&self) -> impl Iterator<Item = RecordIndex> + '_ {
        MmapReader::identifiers(self)
    }
}

impl Format for Bq {
    type Id = RecordIndex;
    type Reader = MmapReader;
    type Writer = BinseqWriter<BufWriter<File>>;

    fn default_extension(&self) -> &'static str {
        Self::EXTENSION
    }

    fn open_reader(&self, path: &Path) -> Result<MmapReader> {
        MmapReader::new(path)
    }

    fn create_writer(&self, path: &Path, source: &MmapReader) -> Result<Self::Writer> {
        let handle = File::create(path).map(BufWriter::new)?;
        BinseqWriter::new(handle, source.header())
    }

    fn copy_selected(
        &self,
        source: &MmapReader,
        dest: &mut Self::Writer,
        ids: &[RecordIndex],
    ) -> Result<usize> {
        let num_records = source.num_records();
        for id in ids {
            let idx = usize::try_from(id.0).unwrap_or(usize::MAX);
            if idx >= num_records {
                return Err(SplitError::UnknownIdentifier(id.to_string()).into());
            }
            dest.write_raw(source.record_bytes(idx)?)?;
        }
        Ok(ids.len())
    }

    fn finish(&self, writer: Self::Writer) -> Result<()> {
        let file = writer
            .finish()?
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;

    fn write_fixture(path: &Path, sequences: &[&[u8]]) -> Result<()> {
        let header = BinseqHeaderBuilder::new()
            .slen(sequences[0].len() as u32)
            .build()?;
        let handle = File::create(path).map(BufWriter::new)?;
        let mut writer = BinseqWriter::new(handle, header)?;
        for (flag, seq) in sequences.iter().enumerate() {
            writer.write_record(Some(flag as u64), seq)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[test]
    fn test_identifiers_in_file_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ids.bq");
        write_fixture(&path, &[b"ACGT", b"CCCC", b"GGGG"])?;

        let reader = Bq.open_reader(&path)?;
        assert_eq!(FormatReader::num_records(&reader), 3);
        let ids: Vec<_> = FormatReader::identifiers(&reader).collect();
        assert_eq!(ids, vec![RecordIndex(0), RecordIndex(1), RecordIndex(2)]);
        Ok(())
    }

    #[test]
    fn test_copy_selected_preserves_records() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source_path = dir.path().join("source.bq");
        let dest_path = dir.path().join("dest.bq");
        write_fixture(&source_path, &[b"AAAA", b"CCCC", b"GGGG", b"TTTT"])?;

        let source = Bq.open_reader(&source_path)?;
        let mut dest = Bq.create_writer(&dest_path, &source)?;
        let copied = Bq.copy_selected(&source, &mut dest, &[RecordIndex(1), RecordIndex(3)])?;
        Bq.finish(dest)?;
        assert_eq!(copied, 2);

        let chunk = MmapReader::new(&dest_path)?;
        assert_eq!(chunk.header(), source.header());
        assert_eq!(chunk.num_records(), 2);
        assert_eq!(chunk.record_bytes(0)?, source.record_bytes(1)?);
        assert_eq!(chunk.record_bytes(1)?, source.record_bytes(3)?);

        let mut dbuf = Vec::new();
        let record = chunk.get(1)?;
        record.decode_s(&mut dbuf)?;
        assert_eq!(dbuf, b"TTTT");
        assert_eq!(record.flag(), Some(3));
        Ok(())
    }

    #[test]
    fn test_copy_unknown_identifier() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source_path = dir.path().join("source.bq");
        write_fixture(&source_path, &[b"AAAA", b"CCCC"])?;

        let source = Bq.open_reader(&source_path)?;
        let mut dest = Bq.create_writer(&dir.path().join("dest.bq"), &source)?;
        let result = Bq.copy_selected(&source, &mut dest, &[RecordIndex(0), RecordIndex(2)]);
        assert!(matches!(
            result,
            Err(Error::SplitError(SplitError::UnknownIdentifier(ref id))) if id == "2"
        ));
        Ok(())
    }

    #[test]
    fn test_truncated_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("truncated.bq");
        write_fixture(&path, &[b"AAAA", b"CCCC"])?;

        let len = std::fs::metadata(&path)?.len();
        let handle = std::fs::OpenOptions::new().write(true).open(&path)?;
        handle.set_len(len - 3)?;

        assert!(matches!(
            MmapReader::new(&path),
            Err(Error::ReadError(crate::error::ReadError::FileTruncation(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_copy_selected_paired_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source_path = dir.path().join("paired.bq");
        let dest_path = dir.path().join("dest.bq");

        // flag word + one primary word + two extended words
        let header = BinseqHeaderBuilder::new().slen(8).xlen(40).build()?;
        let handle = File::create(&source_path).map(BufWriter::new)?;
        let mut writer = BinseqWriter::new(handle, header)?;
        for fill in 1..=3u8 {
            writer.write_raw(&[fill; 32])?;
        }
        writer.finish()?;

        let source = Bq.open_reader(&source_path)?;
        assert_eq!(source.num_records(), 3);
        let mut dest = Bq.create_writer(&dest_path, &source)?;
        Bq.copy_selected(&source, &mut dest, &[RecordIndex(2), RecordIndex(0)])?;
        Bq.finish(dest)?;

        let chunk = MmapReader::new(&dest_path)?;
        assert_eq!(chunk.header().xlen, 40);
        assert_eq!(chunk.record_bytes(0)?, &[3u8; 32]);
        assert_eq!(chunk.record_bytes(1)?, &[1u8; 32]);
        Ok(())
    }
}

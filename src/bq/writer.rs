//! Binary sequence writer module
//!
//! Writes BQ files either from nucleotide sequences, which are encoded with
//! [`bitnuc`], or from records that are already encoded, which are copied to
//! the output unchanged. The second path is what chunk extraction uses.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use super::reader::RecordConfig;
use super::BinseqHeader;
use crate::error::{Result, WriteError};

/// Writes a single flag value to a writer in little-endian format
pub fn write_flag<W: Write>(writer: &mut W, flag: u64) -> Result<()> {
    writer.write_u64::<LittleEndian>(flag)?;
    Ok(())
}

/// Writes a buffer of u64 values to a writer in little-endian format
pub fn write_buffer<W: Write>(writer: &mut W, ebuf: &[u64]) -> Result<()> {
    ebuf.iter()
        .try_for_each(|&x| writer.write_u64::<LittleEndian>(x))?;
    Ok(())
}

/// Encodes nucleotide sequences into the packed representation of the header
///
/// The buffer is reused across calls to avoid repeated allocations.
#[derive(Clone)]
pub struct Encoder {
    header: BinseqHeader,
    sbuffer: Vec<u64>,
}
impl Encoder {
    #[must_use]
    pub fn new(header: BinseqHeader) -> Self {
        Self {
            header,
            sbuffer: Vec::default(),
        }
    }

    /// Encodes a single sequence
    pub fn encode_single(&mut self, primary: &[u8]) -> Result<&[u64]> {
        if primary.len() != self.header.slen as usize {
            return Err(WriteError::UnexpectedSequenceLength {
                expected: self.header.slen,
                got: primary.len(),
            }
            .into());
        }
        self.sbuffer.clear();
        self.header.bits.encode(primary, &mut self.sbuffer)?;
        Ok(&self.sbuffer)
    }
}

/// Writer for BQ files
///
/// The header is written on construction. Records are appended either with
/// [`write_record`](Self::write_record), which encodes a nucleotide sequence,
/// or with [`write_raw`](Self::write_raw), which copies an encoded record.
pub struct BinseqWriter<W: Write> {
    inner: W,
    encoder: Encoder,
    config: RecordConfig,
}
impl<W: Write> BinseqWriter<W> {
    pub fn new(mut inner: W, header: BinseqHeader) -> Result<Self> {
        header.write_bytes(&mut inner)?;
        Ok(Self {
            inner,
            encoder: Encoder::new(header),
            config: RecordConfig::from_header(&header),
        })
    }

    /// Encodes and writes a single-end record
    ///
    /// The flag is ignored when the header has flags disabled.
    pub fn write_record(&mut self, flag: Option<u64>, primary: &[u8]) -> Result<()> {
        let has_flag = self.encoder.header.flags;
        let sbuffer = self.encoder.encode_single(primary)?;
        if has_flag {
            write_flag(&mut self.inner, flag.unwrap_or(0))?;
        }
        write_buffer(&mut self.inner, sbuffer)?;
        Ok(())
    }

    /// Writes an already encoded record exactly as given
    ///
    /// The record must have the on-disk size implied by the header.
    pub fn write_raw(&mut self, record: &[u8]) -> Result<()> {
        let expected = self.config.record_size_bytes();
        if record.len() != expected {
            return Err(WriteError::UnexpectedRecordSize {
                expected,
                got: record.len(),
            }
            .into());
        }
        self.inner.write_all(record)?;
        Ok(())
    }

    #[must_use]
    pub fn header(&self) -> BinseqHeader {
        self.encoder.header
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes the writer and returns the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

//! Chunk planning
//!
//! The planner reads every record identifier of the source once, in file
//! order, and cuts the list into contiguous slices of `chunk_size`
//! identifiers. The whole partition is decided here, before any chunk file is
//! written, so every chunk's membership and output path are fixed no matter
//! in which order the executor later completes them.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::SplitConfig;
use crate::error::{Result, SplitError};
use crate::format::{Format, FormatReader};

/// Minimum number of digits of the chunk index in output file names.
pub const INDEX_WIDTH: usize = 5;

/// One unit of work: a contiguous slice of the source destined for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor<I> {
    /// Position of the chunk in the partition, starting at 0
    pub index: usize,
    /// Identifiers of the records in the chunk, in source order
    pub identifiers: Vec<I>,
    /// Destination of the chunk
    pub output_path: PathBuf,
}

impl<I> ChunkDescriptor<I> {
    /// Number of records in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// Naming scheme of chunk files: `{dir}/{base}.{index}.{ext}`.
#[derive(Debug, Clone)]
pub struct ChunkNaming {
    output_dir: PathBuf,
    base_name: String,
    extension: String,
}

impl ChunkNaming {
    pub fn new<P: Into<PathBuf>, B: Into<String>, E: Into<String>>(
        output_dir: P,
        base_name: B,
        extension: E,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_name: base_name.into(),
            extension: extension.into(),
        }
    }

    /// Resolves the naming scheme of a split of `source` in `format`.
    pub fn for_source<F: Format>(format: &F, source: &Path, config: &SplitConfig) -> Self {
        Self::new(
            config.get_output_dir(),
            config.base_name_for(source),
            config.extension_for(source, format.default_extension()),
        )
    }

    /// Path of chunk `index` in a partition of `total_chunks` chunks.
    ///
    /// The index is zero-padded to [`INDEX_WIDTH`] digits, or wider when the
    /// partition needs more digits, so that all names of a split have the
    /// same width and sort in chunk order.
    #[must_use]
    pub fn path(&self, index: usize, total_chunks: usize) -> PathBuf {
        let width = index_width(total_chunks);
        let name = format!("{}.{index:0width$}.{}", self.base_name, self.extension);
        self.output_dir.join(name)
    }
}

fn index_width(total_chunks: usize) -> usize {
    let largest = total_chunks.saturating_sub(1);
    let digits = largest.checked_ilog10().map_or(1, |d| d as usize + 1);
    digits.max(INDEX_WIDTH)
}

/// Cuts `identifiers` into contiguous chunks of `chunk_size` identifiers.
///
/// All chunks hold exactly `chunk_size` identifiers except possibly the last,
/// which holds the remainder. An empty list yields no chunks. A `chunk_size`
/// of 0 is treated as 1.
pub fn partition<I>(
    identifiers: Vec<I>,
    chunk_size: usize,
    naming: &ChunkNaming,
) -> Vec<ChunkDescriptor<I>> {
    let chunk_size = chunk_size.max(1);
    let total_chunks = identifiers.len().div_ceil(chunk_size);
    let mut remaining = identifiers.into_iter();
    (0..total_chunks)
        .map(|index| ChunkDescriptor {
            index,
            identifiers: remaining.by_ref().take(chunk_size).collect(),
            output_path: naming.path(index, total_chunks),
        })
        .collect()
}

/// Plans the split of `source` into chunk descriptors.
///
/// Opens the source once and reads all of its identifiers. Fails with
/// [`SplitError::SourceUnreadable`] when the source cannot be opened and with
/// [`SplitError::IdentifierMismatch`] when the number of identifiers differs
/// from the record count the source declares.
pub fn plan<F: Format>(
    format: &F,
    source: &Path,
    config: &SplitConfig,
) -> Result<Vec<ChunkDescriptor<F::Id>>> {
    let reader = format
        .open_reader(source)
        .map_err(|e| SplitError::SourceUnreadable {
            path: source.to_path_buf(),
            source: Box::new(e),
        })?;

    let expected = reader.num_records();
    let mut identifiers = Vec::with_capacity(expected);
    identifiers.extend(reader.identifiers());
    if identifiers.len() != expected {
        return Err(SplitError::IdentifierMismatch {
            expected,
            found: identifiers.len(),
        }
        .into());
    }
    debug!(records = expected, "read identifiers of {}", source.display());

    let naming = ChunkNaming::for_source(format, source, config);
    let descriptors = partition(identifiers, config.get_chunk_size(), &naming);
    info!(
        records = expected,
        chunk_size = config.get_chunk_size(),
        chunks = descriptors.len(),
        "planned split of {}",
        source.display()
    );
    Ok(descriptors)
}

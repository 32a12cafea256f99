use std::path::PathBuf;

use crate::execute::ChunkFailure;

/// Custom Result type for bqsplit operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the bqsplit library, encompassing all possible error cases
/// that can occur while reading, repacking, or splitting BINSEQ files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to binary sequence header processing
    HeaderError(#[from] HeaderError),
    /// Errors that occur while assembling a header
    BuilderError(#[from] BuilderError),
    /// Errors that occur during read operations
    ReadError(#[from] ReadError),
    /// Errors that occur during write operations
    WriteError(#[from] WriteError),
    /// Errors raised while planning or executing a split
    SplitError(#[from] SplitError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Errors from the bitnuc nucleotide processing library
    BitnucError(#[from] bitnuc::Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to processing and validating binary sequence headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The bit size byte in the header is neither 2 nor 4
    #[error("Invalid bit size: {0}")]
    InvalidBitSize(u8),

    /// The header describes records that occupy zero bytes
    #[error("Header describes empty records (no sequence and no flag)")]
    EmptyRecordLayout,

    /// The buffer holding the header is smaller than the header itself
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The expected number of bytes according to the header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),
}

/// Errors that can occur while building a header
#[derive(thiserror::Error, Debug)]
pub enum BuilderError {
    /// The primary sequence length was never set
    #[error("Missing sequence length in header builder")]
    MissingSlen,
}

/// Errors that can occur while reading binary sequence data
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The file being read is not a regular file (e.g., it might be a directory or special file)
    #[error("File is not regular")]
    IncompatibleFile,

    /// The file appears to be truncated or corrupted
    ///
    /// # Arguments
    /// * `usize` - The size of the file in bytes
    #[error(
        "Number of bytes in file does not match expectation - possibly truncated at byte pos {0}"
    )]
    FileTruncation(usize),

    /// Attempted to access a record index that is beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested record index
    /// * Second `usize` - The number of records in the file
    #[error("Requested record index ({0}) is out of record range ({1})")]
    OutOfRange(usize, usize),
}

/// Errors that can occur while writing binary sequence data
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// The length of the sequence being written does not match what was specified in the header
    #[error("Sequence length ({got}) does not match the header ({expected})")]
    UnexpectedSequenceLength { expected: u32, got: usize },

    /// A pre-encoded record does not have the size the header implies
    #[error("Encoded record is {got} bytes but the header requires {expected}")]
    UnexpectedRecordSize { expected: usize, got: usize },
}

/// Errors raised by the chunk planner and the parallel executor
#[derive(thiserror::Error, Debug)]
pub enum SplitError {
    /// The source file could not be opened or its header could not be parsed
    #[error("Unable to read source file {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// A chunk file could not be created, written, or finalized
    #[error("Unable to write chunk file {}: {source}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The number of records seen does not match the number expected
    #[error("Identifier mismatch: expected {expected} records but found {found}")]
    IdentifierMismatch { expected: usize, found: usize },

    /// The copy step was asked for a record the source does not contain
    #[error("Record {0} is not present in the source file")]
    UnknownIdentifier(String),

    /// A worker terminated abnormally while processing a chunk
    #[error("Worker failed on chunk {index}: {reason}")]
    WorkerFailure { index: usize, reason: String },

    /// One or more chunks failed; the remaining chunk files were still written
    #[error("{} of {total} chunks failed", .failures.len())]
    ChunksFailed {
        failures: Vec<ChunkFailure>,
        total: usize,
    },
}

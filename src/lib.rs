//! # bqsplit
//!
//! Splits a BINSEQ `.bq` file into smaller chunk files of a fixed number of
//! records, writing the chunks in parallel.
//!
//! A split has two phases:
//!
//! 1. [`plan`] reads every record identifier of the source once and cuts the
//!    list into contiguous [`ChunkDescriptor`]s, each with its output path.
//! 2. [`execute`] hands the descriptors to a pool of worker threads. Every
//!    worker opens its own reader and writer and copies its chunk's records
//!    unchanged.
//!
//! [`split`] runs both phases and reports progress to a [`ProgressSink`].
//!
//! ```no_run
//! # use bqsplit::{bq::Bq, split, NoProgress, Result, SplitConfig};
//! # use std::path::Path;
//! # fn main() -> Result<()> {
//! let config = SplitConfig::default().chunk_size(25_000).output_dir("chunks");
//! let summary = split(Bq, Path::new("reads.bq"), &config, NoProgress)?;
//! println!("wrote {} chunks", summary.num_chunks());
//! # Ok(())
//! # }
//! ```
//!
//! Container formats plug in through the [`Format`] trait; [`bq::Bq`] is the
//! one shipped with this crate.

pub mod bq;
mod config;
mod error;
mod execute;
mod format;
mod plan;
mod progress;
mod split;

pub use config::SplitConfig;
pub use error::{BuilderError, Error, HeaderError, ReadError, Result, SplitError, WriteError};
pub use execute::{
    execute, extract_chunk, ChunkFailure, ChunkOutcome, ChunkResult, ChunkState, Execution,
};
pub use format::{Format, FormatReader};
pub use plan::{partition, plan, ChunkDescriptor, ChunkNaming, INDEX_WIDTH};
pub use progress::{LogProgress, NoProgress, Progress, ProgressFn, ProgressSink};
pub use split::{run, split, SplitSummary};

//! End-to-end split: plan, execute, report.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::SplitConfig;
use crate::error::{Result, SplitError};
use crate::execute::{execute, ChunkResult};
use crate::format::Format;
use crate::plan::{plan, ChunkDescriptor};
use crate::progress::{Progress, ProgressSink};

/// What a successful split produced.
#[derive(Debug, Clone, Default)]
pub struct SplitSummary {
    /// One entry per chunk file, ordered by chunk index
    pub chunks: Vec<ChunkResult>,
    /// Number of records written across all chunk files
    pub total_records: u64,
}

impl SplitSummary {
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }
}

/// Executes a planned split and feeds completed chunks to `sink`.
///
/// Every descriptor is processed even when some of them fail. If any chunk
/// failed, the failures are returned together as
/// [`SplitError::ChunksFailed`] once all chunks have finished.
pub fn run<F, S>(
    format: F,
    source: &Path,
    descriptors: Vec<ChunkDescriptor<F::Id>>,
    max_workers: usize,
    sink: S,
) -> Result<SplitSummary>
where
    F: Format + 'static,
    S: ProgressSink,
{
    let total = descriptors.len();
    let total_planned: u64 = descriptors.iter().map(|d| d.len() as u64).sum();
    let mut progress = Progress::new(sink, total);
    progress.start(total_planned);
    let mut chunks = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for outcome in execute(format, source, descriptors, max_workers) {
        match outcome {
            Ok(chunk) => {
                debug!(
                    index = chunk.index,
                    records = chunk.record_count,
                    "wrote {}",
                    chunk.output_path.display()
                );
                progress.record(&chunk);
                chunks.push(chunk);
            }
            Err(failure) => {
                warn!(
                    index = failure.index,
                    "chunk {} failed: {}",
                    failure.output_path.display(),
                    failure.error
                );
                failures.push(failure);
            }
        }
    }
    let total_records = progress.completed();
    progress.finish();

    if !failures.is_empty() {
        failures.sort_by_key(|f| f.index);
        return Err(SplitError::ChunksFailed { failures, total }.into());
    }

    chunks.sort_by_key(|c| c.index);
    Ok(SplitSummary {
        chunks,
        total_records,
    })
}

/// Splits `source` into chunk files as described by `config`.
///
/// The output directory is created if needed. Planning happens entirely
/// before the first chunk file is written, so an unreadable source fails
/// without producing any output.
pub fn split<F, S>(format: F, source: &Path, config: &SplitConfig, sink: S) -> Result<SplitSummary>
where
    F: Format + 'static,
    S: ProgressSink,
{
    let output_dir = config.get_output_dir();
    fs::create_dir_all(output_dir).map_err(|e| SplitError::OutputWriteFailure {
        path: output_dir.to_path_buf(),
        source: Box::new(e.into()),
    })?;

    let descriptors = plan(&format, source, config)?;
    let summary = run(format, source, descriptors, config.get_threads(), sink)?;
    info!(
        chunks = summary.num_chunks(),
        records = summary.total_records,
        "split {} into {}",
        source.display(),
        output_dir.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::bq::{BinseqHeaderBuilder, BinseqWriter, Bq};
    use crate::progress::NoProgress;
    use crate::Error;
    use std::fs::File;
    use std::io::BufWriter;

    fn write_source(path: &Path, num_records: usize) -> Result<()> {
        let header = BinseqHeaderBuilder::new().slen(4).build()?;
        let handle = File::create(path).map(BufWriter::new)?;
        let mut writer = BinseqWriter::new(handle, header)?;
        for idx in 0..num_records {
            writer.write_record(Some(idx as u64), b"ACGT")?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_split_summary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("reads.bq");
        write_source(&source, 5)?;

        let config = SplitConfig::default()
            .chunk_size(2)
            .threads(3)
            .output_dir(dir.path().join("out"));
        let summary = split(Bq, &source, &config, NoProgress)?;

        assert_eq!(summary.num_chunks(), 3);
        assert_eq!(summary.total_records, 5);
        let indices: Vec<usize> = summary.chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(
            summary.chunks[2].output_path,
            dir.path().join("out").join("reads.00002.bq")
        );
        Ok(())
    }

    #[test]
    fn test_run_reports_all_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("reads.bq");
        write_source(&source, 4)?;

        let config = SplitConfig::default()
            .chunk_size(1)
            .output_dir(dir.path().join("missing-dir"));
        // planned into a directory that was never created
        let descriptors = plan(&Bq, &source, &config)?;
        let result = run(Bq, &source, descriptors, 2, NoProgress);

        match result {
            Err(Error::SplitError(SplitError::ChunksFailed { failures, total })) => {
                assert_eq!(total, 4);
                let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
                assert_eq!(indices, vec![0, 1, 2, 3]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }
}

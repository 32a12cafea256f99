//! Parallel chunk extraction
//!
//! Every [`ChunkDescriptor`] becomes an independent job. Jobs are queued up
//! front and pulled by a fixed number of worker threads; each job opens its
//! own reader on the source and its own writer on the chunk file, so no file
//! handle is ever shared between threads. Workers report back over a channel
//! and the consuming side, an [`Execution`], yields one [`ChunkOutcome`] per
//! chunk in completion order.
//!
//! A failing chunk does not stop the others: all queued chunks are processed
//! and failures are yielded alongside successes. Dropping an `Execution`
//! early waits for the queued jobs to drain.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result, SplitError};
use crate::format::Format;
use crate::plan::ChunkDescriptor;

/// A chunk file that was written completely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub output_path: PathBuf,
    /// Number of records copied into the chunk file
    pub record_count: usize,
}

/// A chunk that could not be written.
///
/// The chunk file may exist in a partial state; it is not removed.
#[derive(Debug)]
pub struct ChunkFailure {
    pub index: usize,
    pub output_path: PathBuf,
    pub error: Error,
}

/// Outcome of one chunk job.
pub type ChunkOutcome = std::result::Result<ChunkResult, ChunkFailure>;

/// Lifecycle of a chunk: `Pending -> Submitted -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Submitted,
    Running,
    Completed,
    Failed,
}

impl ChunkState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

enum WorkerEvent {
    Started(usize),
    Finished(ChunkOutcome),
}

/// Writes one chunk file.
///
/// Opens a fresh reader on `source`, replaces any existing file at the
/// descriptor's output path and copies exactly the descriptor's records into
/// it. The writer is finalized on every path, including when the copy fails.
pub fn extract_chunk<F: Format>(
    format: &F,
    source: &Path,
    descriptor: &ChunkDescriptor<F::Id>,
) -> Result<ChunkResult> {
    let output_path = &descriptor.output_path;
    let output_failure = |e: Error| -> Error {
        SplitError::OutputWriteFailure {
            path: output_path.clone(),
            source: Box::new(e),
        }
        .into()
    };

    let reader = format
        .open_reader(source)
        .map_err(|e| SplitError::SourceUnreadable {
            path: source.to_path_buf(),
            source: Box::new(e),
        })?;

    remove_existing(output_path).map_err(|e| output_failure(e.into()))?;
    let mut writer = format
        .create_writer(output_path, &reader)
        .map_err(output_failure)?;

    let copied = match format.copy_selected(&reader, &mut writer, &descriptor.identifiers) {
        Ok(copied) => copied,
        Err(e) => {
            if let Err(close) = format.finish(writer) {
                warn!("Failed to close {}: {close}", output_path.display());
            }
            return Err(match e {
                Error::SplitError(_) => e,
                other => output_failure(other),
            });
        }
    };
    format.finish(writer).map_err(output_failure)?;

    if copied != descriptor.len() {
        return Err(SplitError::IdentifierMismatch {
            expected: descriptor.len(),
            found: copied,
        }
        .into());
    }

    Ok(ChunkResult {
        index: descriptor.index,
        output_path: output_path.clone(),
        record_count: copied,
    })
}

/// Removes a file, treating a missing file as success.
fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Runs one job, converting a panic into a failed chunk.
fn run_job<F: Format>(
    format: &F,
    source: &Path,
    descriptor: &ChunkDescriptor<F::Id>,
) -> ChunkOutcome {
    let index = descriptor.index;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        extract_chunk(format, source, descriptor)
    }));
    let error = match result {
        Ok(Ok(chunk)) => return Ok(chunk),
        Ok(Err(error)) => error,
        Err(payload) => SplitError::WorkerFailure {
            index,
            reason: panic_message(payload.as_ref()),
        }
        .into(),
    };
    Err(ChunkFailure {
        index,
        output_path: descriptor.output_path.clone(),
        error,
    })
}

fn worker_loop<F: Format>(
    format: &F,
    source: &Path,
    jobs: &Mutex<Receiver<ChunkDescriptor<F::Id>>>,
    events: &Sender<WorkerEvent>,
) {
    loop {
        // The lock is released before the job runs
        let job = jobs.lock().recv();
        let Ok(descriptor) = job else {
            break;
        };
        if events.send(WorkerEvent::Started(descriptor.index)).is_err() {
            break;
        }
        let outcome = run_job(format, source, &descriptor);
        if events.send(WorkerEvent::Finished(outcome)).is_err() {
            break;
        }
    }
}

/// Starts extracting every descriptor on a pool of `max_workers` threads.
///
/// `max_workers` is clamped to at least 1 and to at most the number of
/// descriptors. The returned [`Execution`] yields one outcome per descriptor
/// as chunks complete.
pub fn execute<F>(
    format: F,
    source: &Path,
    descriptors: Vec<ChunkDescriptor<F::Id>>,
    max_workers: usize,
) -> Execution
where
    F: Format + 'static,
{
    let num_chunks = descriptors.len();
    let mut chunks: Vec<TrackedChunk> = descriptors
        .iter()
        .map(|d| TrackedChunk {
            index: d.index,
            output_path: d.output_path.clone(),
            state: ChunkState::Pending,
        })
        .collect();
    let positions = chunks
        .iter()
        .enumerate()
        .map(|(position, chunk)| (chunk.index, position))
        .collect();

    let (job_tx, job_rx) = mpsc::channel();
    for (descriptor, chunk) in descriptors.into_iter().zip(chunks.iter_mut()) {
        if job_tx.send(descriptor).is_ok() {
            chunk.state = ChunkState::Submitted;
        }
    }
    drop(job_tx);

    let num_workers = max_workers.max(1).min(num_chunks.max(1));
    let jobs = Arc::new(Mutex::new(job_rx));
    let format = Arc::new(format);
    let source: Arc<Path> = Arc::from(source);
    let (event_tx, event_rx) = mpsc::channel();

    let mut handles = Vec::with_capacity(num_workers);
    if num_chunks > 0 {
        for tid in 0..num_workers {
            let jobs = Arc::clone(&jobs);
            let format = Arc::clone(&format);
            let source = Arc::clone(&source);
            let events = event_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("bqsplit-worker-{tid}"))
                .spawn(move || worker_loop(&*format, &source, &jobs, &events));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Unable to spawn worker {tid}: {e}"),
            }
        }
    }
    drop(event_tx);
    debug!(chunks = num_chunks, workers = handles.len(), "started workers");

    Execution {
        events: event_rx,
        chunks,
        positions,
        outstanding: num_chunks,
        orphaned: VecDeque::new(),
        handles,
    }
}

/// Bookkeeping of one submitted descriptor
struct TrackedChunk {
    index: usize,
    output_path: PathBuf,
    state: ChunkState,
}

/// A running extraction.
///
/// Iterating yields one [`ChunkOutcome`] per chunk in completion order and
/// blocks while no chunk has completed yet. Chunks are tracked by their
/// descriptor index, which need not start at 0 or be contiguous.
pub struct Execution {
    events: Receiver<WorkerEvent>,
    /// Submitted chunks in submission order
    chunks: Vec<TrackedChunk>,
    /// Descriptor index to position in `chunks`
    positions: HashMap<usize, usize>,
    outstanding: usize,
    orphaned: VecDeque<ChunkFailure>,
    handles: Vec<JoinHandle<()>>,
}

impl Execution {
    /// Total number of chunks in this execution.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Current state of the chunk with descriptor index `index`, if it was submitted.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<ChunkState> {
        self.tracked(index).map(|chunk| chunk.state)
    }

    /// Number of chunks that have not reached a terminal state yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    fn tracked(&self, index: usize) -> Option<&TrackedChunk> {
        self.positions.get(&index).map(|&position| &self.chunks[position])
    }

    fn tracked_mut(&mut self, index: usize) -> Option<&mut TrackedChunk> {
        self.positions
            .get(&index)
            .map(|&position| &mut self.chunks[position])
    }

    /// Fails every chunk that will never be reported because all workers are gone.
    fn orphan_remaining(&mut self) {
        for chunk in &mut self.chunks {
            if chunk.state.is_terminal() {
                continue;
            }
            chunk.state = ChunkState::Failed;
            self.orphaned.push_back(ChunkFailure {
                index: chunk.index,
                output_path: chunk.output_path.clone(),
                error: SplitError::WorkerFailure {
                    index: chunk.index,
                    reason: "worker exited before completing the chunk".to_string(),
                }
                .into(),
            });
        }
        self.outstanding = 0;
    }
}

impl Iterator for Execution {
    type Item = ChunkOutcome;

    fn next(&mut self) -> Option<ChunkOutcome> {
        loop {
            if let Some(failure) = self.orphaned.pop_front() {
                return Some(Err(failure));
            }
            if self.outstanding == 0 {
                return None;
            }
            match self.events.recv() {
                Ok(WorkerEvent::Started(index)) => {
                    if let Some(chunk) = self.tracked_mut(index) {
                        chunk.state = ChunkState::Running;
                    }
                }
                Ok(WorkerEvent::Finished(outcome)) => {
                    let (index, state) = match &outcome {
                        Ok(chunk) => (chunk.index, ChunkState::Completed),
                        Err(failure) => (failure.index, ChunkState::Failed),
                    };
                    match self.tracked_mut(index) {
                        Some(chunk) if !chunk.state.is_terminal() => chunk.state = state,
                        _ => continue,
                    }
                    self.outstanding -= 1;
                    return Some(outcome);
                }
                Err(_) => self.orphan_remaining(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.outstanding + self.orphaned.len();
        (remaining, Some(remaining))
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("A worker thread terminated abnormally");
            }
        }
    }
}

//! Progress reporting
//!
//! Workers never touch the progress total. Completed chunks come back to the
//! consuming thread, which feeds them to a [`Progress`] aggregator; the
//! aggregator forwards the running total of completed records to a
//! caller-supplied [`ProgressSink`].

use std::collections::HashSet;

use auto_impl::auto_impl;
use indicatif::ProgressBar;
use tracing::info;

use crate::execute::ChunkResult;

/// Receives the running number of records written to chunk files.
#[auto_impl(&mut, Box)]
pub trait ProgressSink {
    /// Called once before any chunk completes with the number of records to write
    fn start(&mut self, _total: u64) {}

    /// Called after every completed chunk with the new total
    fn update(&mut self, completed: u64);

    /// Called once when no further updates will follow
    fn finish(&mut self) {}
}

/// Discards all progress updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _completed: u64) {}
}

/// Adapts a closure receiving the running total into a [`ProgressSink`].
pub struct ProgressFn<F>(pub F);

impl<F: FnMut(u64)> ProgressSink for ProgressFn<F> {
    fn update(&mut self, completed: u64) {
        (self.0)(completed);
    }
}

impl ProgressSink for ProgressBar {
    fn start(&mut self, total: u64) {
        self.set_length(total);
    }

    fn update(&mut self, completed: u64) {
        self.set_position(completed);
    }

    fn finish(&mut self) {
        ProgressBar::finish(self);
    }
}

/// Logs progress through `tracing`, for runs without a terminal.
///
/// A line is logged roughly every tenth of the total.
#[derive(Debug, Clone, Default)]
pub struct LogProgress {
    total: u64,
    step: u64,
    next: u64,
}

impl ProgressSink for LogProgress {
    fn start(&mut self, total: u64) {
        self.total = total;
        self.step = total.div_ceil(10).max(1);
        self.next = self.step;
    }

    fn update(&mut self, completed: u64) {
        if completed < self.next && completed < self.total {
            return;
        }
        while self.next <= completed {
            self.next += self.step;
        }
        #[allow(clippy::cast_precision_loss)]
        let percent = if self.total == 0 {
            100.0
        } else {
            completed as f64 / self.total as f64 * 100.0
        };
        info!("Progress: {percent:.1}%, {completed}/{} records", self.total);
    }
}

/// Accumulates completed chunks into a monotonically increasing total.
///
/// Each chunk index is counted at most once, whatever order chunks complete
/// in.
pub struct Progress<S: ProgressSink> {
    sink: S,
    completed: u64,
    counted: HashSet<usize>,
}

impl<S: ProgressSink> Progress<S> {
    pub fn new(sink: S, num_chunks: usize) -> Self {
        Self {
            sink,
            completed: 0,
            counted: HashSet::with_capacity(num_chunks),
        }
    }

    /// Announces the number of records the run will write.
    pub fn start(&mut self, total: u64) {
        self.sink.start(total);
    }

    /// Adds a completed chunk and reports the new total to the sink.
    ///
    /// Returns the running total. A chunk that was already counted leaves the
    /// total unchanged and is not reported again.
    pub fn record(&mut self, result: &ChunkResult) -> u64 {
        if !self.counted.insert(result.index) {
            return self.completed;
        }
        self.completed += result.record_count as u64;
        self.sink.update(self.completed);
        self.completed
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Signals the sink that the run is over and returns it.
    pub fn finish(mut self) -> S {
        self.sink.finish();
        self.sink
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        total: Option<u64>,
        updates: Vec<u64>,
        finished: bool,
    }

    impl ProgressSink for Recorder {
        fn start(&mut self, total: u64) {
            self.total = Some(total);
        }

        fn update(&mut self, completed: u64) {
            self.updates.push(completed);
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn result(index: usize, record_count: usize) -> ChunkResult {
        ChunkResult {
            index,
            output_path: PathBuf::from(format!("chunk.{index:05}.bq")),
            record_count,
        }
    }

    #[test]
    fn test_out_of_order_totals() {
        let mut progress = Progress::new(Recorder::default(), 3);
        progress.start(7);
        progress.record(&result(2, 1));
        progress.record(&result(0, 3));
        progress.record(&result(1, 3));
        assert_eq!(progress.completed(), 7);

        let recorder = progress.finish();
        assert_eq!(recorder.total, Some(7));
        assert_eq!(recorder.updates, vec![1, 4, 7]);
        assert!(recorder.finished);
    }

    #[test]
    fn test_no_double_count() {
        let mut progress = Progress::new(Recorder::default(), 2);
        assert_eq!(progress.record(&result(0, 5)), 5);
        assert_eq!(progress.record(&result(0, 5)), 5);
        assert_eq!(progress.record(&result(1, 2)), 7);
        assert_eq!(progress.finish().updates, vec![5, 7]);
    }

    #[test]
    fn test_borrowed_sink() {
        let mut recorder = Recorder::default();
        {
            let mut progress = Progress::new(&mut recorder, 1);
            progress.record(&result(0, 4));
            progress.finish();
        }
        assert_eq!(recorder.updates, vec![4]);
        assert!(recorder.finished);
    }

    #[test]
    fn test_sparse_indices() {
        let mut progress = Progress::new(Recorder::default(), 1);
        assert_eq!(progress.record(&result(usize::MAX, 3)), 3);
        assert_eq!(progress.record(&result(7, 2)), 5);
        assert_eq!(progress.record(&result(usize::MAX, 3)), 5);
        assert_eq!(progress.counted.len(), 2);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        let mut progress = Progress::new(ProgressFn(|total: u64| seen.push(total)), 2);
        progress.record(&result(1, 2));
        progress.record(&result(0, 2));
        progress.finish();
        assert_eq!(seen, vec![2, 4]);
    }

    #[test]
    fn test_log_progress_steps() {
        let mut sink = LogProgress::default();
        sink.start(100);
        sink.update(5);
        assert_eq!(sink.next, 10);
        sink.update(35);
        assert_eq!(sink.next, 40);
        sink.update(100);
        assert_eq!(sink.next, 110);
    }
}

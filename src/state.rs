//! Per-run download state.
//!
//! A [`DownloadJob`] is created from the metadata probe and owned by the run
//! for its whole lifetime. Only the phase, the downloaded-bytes counter and
//! the elapsed time change after the probe.
use crate::error::Stage;
use crate::partition::Partition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A specific range of bytes within the remote resource.
///
/// The range is inclusive, meaning `start` and `end` are both part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Position of the range in merge order.
    pub index: usize,
    /// The starting byte index (0-based).
    pub start: u64,
    /// The ending byte index.
    pub end: u64,
}

impl Range {
    pub fn new(index: usize, start: u64, end: u64) -> Self {
        Self { index, start, end }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Range` request header for this span.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Lifecycle of a run. Every phase but `Done` may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probing,
    Partitioning,
    Fetching,
    Merging,
    Finalizing,
    Done,
    Failed(Stage),
}

/// Everything known about the resource being downloaded.
#[derive(Debug)]
pub struct DownloadJob {
    pub url: String,
    /// Total length reported by the server, if any.
    pub total_len: Option<u64>,
    pub accepts_ranges: bool,
    pub filename: String,
    pub partition: Partition,
    pub started: Instant,
    pub elapsed: Option<Duration>,
    phase: Phase,
    downloaded: Arc<AtomicU64>,
}

impl DownloadJob {
    pub fn new(
        url: impl Into<String>,
        total_len: Option<u64>,
        accepts_ranges: bool,
        filename: impl Into<String>,
        partition: Partition,
        started: Instant,
    ) -> Self {
        Self {
            url: url.into(),
            total_len,
            accepts_ranges,
            filename: filename.into(),
            partition,
            started,
            elapsed: None,
            phase: Phase::Probing,
            downloaded: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Shared counter of bytes fetched during this run, for progress reporting.
    pub fn downloaded_counter(&self) -> Arc<AtomicU64> {
        self.downloaded.clone()
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Stops the clock and returns the elapsed wall-clock time.
    pub(crate) fn finish(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        self.elapsed = Some(elapsed);
        self.enter(Phase::Done);
        elapsed
    }
}

//! Orchestration of a single download run.
//!
//! A run goes probe, partition, segment store, parallel fetch, merge and
//! finalize, in that order. The first failure ends the run with a
//! [`RunError`] naming the stage; nothing is retried.
use crate::config::DownloadConfig;
use crate::error::{Error, RunError, Stage, StageExt};
use crate::fetch::{Fetcher, WritePolicy};
use crate::observer::{ConsoleObserver, ProgressObserver, SilentObserver};
use crate::partition::{self, Plan};
use crate::probe;
use crate::segment::{self, Segment};
use crate::state::{DownloadJob, Phase, Range};
use crate::{finalize, merge};
use futures_util::future::join_all;
use indicatif::MultiProgress;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How a run ended successfully.
#[derive(Debug)]
pub enum Outcome {
    Completed(Summary),
    /// The destination file already existed; nothing was fetched.
    AlreadyPresent { path: PathBuf },
}

/// Report of a completed download.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub path: PathBuf,
    /// Size of the assembled file.
    pub bytes: u64,
    pub elapsed: Duration,
    /// Number of ranges, zero for a single-stream download.
    pub ranges: usize,
    /// Bytes reused from segment files of an earlier run.
    pub resumed_bytes: u64,
    pub single_stream: bool,
}

pub struct Downloader {
    client: Client,
    config: DownloadConfig,
    progress: Option<MultiProgress>,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self, Error> {
        let client = config.client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: DownloadConfig) -> Self {
        Self {
            client,
            config,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Shows one progress bar per range under `multi`.
    pub fn with_progress(mut self, multi: MultiProgress) -> Self {
        self.progress = Some(multi);
        self
    }

    /// Token that stops all outstanding fetches when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, url: &str) -> Result<Outcome, RunError> {
        let started = Instant::now();
        let dir = &self.config.dir;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::fs(dir, e))
            .at(Stage::Probe)?;

        if let Some(name) = &self.config.filename
            && let Some(path) = existing(&dir.join(name)).await
        {
            return Ok(Outcome::AlreadyPresent { path });
        }

        let metadata = probe::probe(&self.client, url, self.config.timeout)
            .await
            .at(Stage::Probe)?;

        let filename = self
            .config
            .filename
            .clone()
            .unwrap_or_else(|| metadata.filename.clone());
        let dest = dir.join(&filename);
        if let Some(path) = existing(&dest).await {
            return Ok(Outcome::AlreadyPresent { path });
        }

        tracing::info!(
            "downloading {} -> {} ({} bytes, ranges: {})",
            url,
            dest.display(),
            metadata
                .total_len
                .map_or_else(|| "unknown".to_string(), |l| l.to_string()),
            metadata.accepts_ranges
        );

        let mut job = DownloadJob::new(
            url,
            metadata.total_len,
            metadata.accepts_ranges,
            filename,
            self.config.partition,
            started,
        );

        let result = self.execute(&mut job, dest).await;
        if let Err(e) = &result {
            job.enter(Phase::Failed(e.stage));
            tracing::error!("{}", e);
        }
        result
    }

    async fn execute(&self, job: &mut DownloadJob, dest: PathBuf) -> Result<Outcome, RunError> {
        job.enter(Phase::Partitioning);
        match partition::plan(job.total_len, job.accepts_ranges, job.partition) {
            Plan::Ranged(ranges) => self.ranged(job, dest, ranges).await,
            Plan::SingleStream => self.single_stream(job, dest).await,
        }
    }

    async fn ranged(
        &self,
        job: &mut DownloadJob,
        dest: PathBuf,
        ranges: Vec<Range>,
    ) -> Result<Outcome, RunError> {
        if ranges.len() > partition::MAX_RANGES {
            return Err(RunError::new(
                Stage::Partition,
                Error::TooManyRanges {
                    count: ranges.len(),
                    max: partition::MAX_RANGES,
                },
            ));
        }

        let opened = segment::open_segments(&self.config.dir, &job.filename, &ranges)
            .await
            .at(Stage::Partition)?;
        let segments: Vec<Segment> = opened.iter().map(|o| o.segment.clone()).collect();
        let resumed_bytes = segments.iter().map(|s| s.on_disk).sum();

        job.enter(Phase::Fetching);
        let fetcher = Fetcher::new(
            self.client.clone(),
            &job.url,
            self.config.timeout,
            WritePolicy::for_range_count(ranges.len()),
            job.downloaded_counter(),
            self.cancel.clone(),
        );

        let mut tasks = Vec::new();
        for open in opened {
            if open.segment.is_complete() {
                tracing::info!("range {} already complete, skipping", open.segment.range.index);
                continue;
            }

            let observer = self.observer_for(&job.filename, &open.segment);
            let fetcher = fetcher.clone();
            tasks.push(tokio::spawn(async move {
                fetcher.fetch_segment(open, observer).await
            }));
        }

        // Every task runs to its own end before the first failure is reported.
        for result in join_all(tasks).await {
            result
                .map_err(Error::from)
                .and_then(|written| written)
                .at(Stage::Download)?;
        }

        job.enter(Phase::Merging);
        let bytes = merge::merge_segments(&dest, &segments)
            .await
            .at(Stage::Merge)?;

        job.enter(Phase::Finalizing);
        finalize::remove_segments(&segments)
            .await
            .at(Stage::Finalize)?;

        let elapsed = job.finish();
        tracing::info!("download succeeded in {:.2?}", elapsed);

        Ok(Outcome::Completed(Summary {
            path: dest,
            bytes,
            elapsed,
            ranges: ranges.len(),
            resumed_bytes,
            single_stream: false,
        }))
    }

    /// Fallback for servers without range support: one GET into a `.part`
    /// file that is renamed into place once complete.
    async fn single_stream(&self, job: &mut DownloadJob, dest: PathBuf) -> Result<Outcome, RunError> {
        tracing::warn!("server does not serve byte ranges, falling back to a single stream");

        job.enter(Phase::Fetching);
        let part = self.config.dir.join(format!("{}.part", job.filename));
        let fetcher = Fetcher::new(
            self.client.clone(),
            &job.url,
            self.config.timeout,
            WritePolicy::Exact,
            job.downloaded_counter(),
            self.cancel.clone(),
        );
        let observer = self.observer(job.filename.clone(), job.total_len.unwrap_or(0), 0);
        let bytes = fetcher
            .fetch_whole(&part, job.total_len, observer)
            .await
            .at(Stage::Download)?;

        job.enter(Phase::Merging);
        tokio::fs::rename(&part, &dest)
            .await
            .map_err(|e| Error::fs(&part, e))
            .at(Stage::Merge)?;

        job.enter(Phase::Finalizing);
        let elapsed = job.finish();
        tracing::info!("download succeeded in {:.2?}", elapsed);

        Ok(Outcome::Completed(Summary {
            path: dest,
            bytes,
            elapsed,
            ranges: 0,
            resumed_bytes: 0,
            single_stream: true,
        }))
    }

    fn observer_for(&self, filename: &str, segment: &Segment) -> Arc<dyn ProgressObserver> {
        self.observer(
            format!("{} [Part {}]", filename, segment.range.index + 1),
            segment.range.len(),
            segment.on_disk,
        )
    }

    fn observer(&self, label: String, total: u64, done: u64) -> Arc<dyn ProgressObserver> {
        match &self.progress {
            Some(multi) => Arc::new(ConsoleObserver::for_range(multi, label, total, done)),
            None => Arc::new(SilentObserver),
        }
    }
}

async fn existing(path: &Path) -> Option<PathBuf> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {
            tracing::info!("{} already exists, nothing to do", path.display());
            Some(path.to_path_buf())
        }
        _ => None,
    }
}

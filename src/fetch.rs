//! Fetcher: streams one byte range into its segment file.
use crate::error::{Error, Result};
use crate::observer::ProgressObserver;
use crate::segment::OpenSegment;
use reqwest::header::RANGE;
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

/// How strictly the number of written bytes is checked against the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// The write must match the expected length exactly.
    Exact,
    /// A write one byte short is accepted. Some servers disagree on whether
    /// the end offset of a range is inclusive.
    Tolerant,
}

impl WritePolicy {
    /// Exact for a single range, tolerant when the resource is split.
    pub fn for_range_count(count: usize) -> Self {
        if count > 1 {
            WritePolicy::Tolerant
        } else {
            WritePolicy::Exact
        }
    }

    pub fn check(self, path: &Path, expected: u64, written: u64) -> Result<()> {
        if written == 0 && expected > 0 {
            return Err(Error::ZeroByteWrite {
                path: path.to_path_buf(),
            });
        }

        let accepted = match self {
            WritePolicy::Exact => written == expected,
            WritePolicy::Tolerant => written <= expected && expected - written <= 1,
        };

        if !accepted {
            return Err(Error::ShortWrite {
                path: path.to_path_buf(),
                expected,
                written,
            });
        }

        if written < expected {
            tracing::warn!(
                "{} is {} byte short of its range, accepted",
                path.display(),
                expected - written
            );
        }

        Ok(())
    }
}

/// Shared, cheaply cloneable context for every fetch task of a run.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    url: Arc<str>,
    timeout: Duration,
    policy: WritePolicy,
    downloaded: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        client: Client,
        url: &str,
        timeout: Duration,
        policy: WritePolicy,
        downloaded: Arc<AtomicU64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            url: Arc::from(url),
            timeout,
            policy,
            downloaded,
            cancel,
        }
    }

    /// Fetches the missing tail of a segment and appends it to the file.
    ///
    /// Returns the number of bytes written. A complete segment is skipped
    /// without a request. The segment's file handle is closed when this
    /// returns, whatever the outcome.
    pub async fn fetch_segment(
        &self,
        open: OpenSegment,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<u64> {
        let OpenSegment { segment, file } = open;

        let Some(remaining) = segment.remaining() else {
            tracing::debug!("{} already complete, skipping", segment.path.display());
            observer.finish();
            return Ok(0);
        };

        let range_header = remaining.header_value();
        let mut response = self
            .send(self.client.get(&*self.url).header(RANGE, &range_header))
            .await?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            observer.message(format!("Failed: {}", response.status()));
            return Err(Error::UnexpectedStatus {
                status: response.status(),
                range: range_header,
            });
        }

        let mut writer = BufWriter::new(file);
        let written = self
            .stream_body(&mut response, &mut writer, &segment.path, &*observer)
            .await;
        // Keep whatever arrived: a later run resumes from it.
        let flushed = writer.flush().await.map_err(|e| Error::fs(&segment.path, e));
        let written = written?;
        flushed?;

        self.policy.check(&segment.path, remaining.len(), written)?;

        tracing::info!("finished range {} ({} bytes)", segment.range.index, written);
        observer.finish();
        Ok(written)
    }

    /// Downloads the whole resource with a plain GET into `path`.
    ///
    /// Used when the server cannot serve ranges. The length is checked
    /// exactly when the server reported one.
    pub async fn fetch_whole(
        &self,
        path: &Path,
        expected: Option<u64>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<u64> {
        let mut response = self.send(self.client.get(&*self.url)).await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                status: response.status(),
                range: "entire resource".to_string(),
            });
        }

        let file = File::create(path).await.map_err(|e| Error::fs(path, e))?;
        let mut writer = BufWriter::new(file);
        let written = self
            .stream_body(&mut response, &mut writer, path, &*observer)
            .await;
        let flushed = writer.flush().await.map_err(|e| Error::fs(path, e));
        let written = written?;
        flushed?;

        if let Some(expected) = expected {
            WritePolicy::Exact.check(path, expected, written)?;
        }

        observer.finish();
        Ok(written)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = tokio::time::timeout(self.timeout, request.send()) => {
                Ok(sent.map_err(|_| Error::Timeout(self.timeout))??)
            }
        }
    }

    async fn stream_body(
        &self,
        response: &mut Response,
        writer: &mut BufWriter<File>,
        path: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64> {
        let mut written = 0u64;

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                next = tokio::time::timeout(self.timeout, response.chunk()) => {
                    next.map_err(|_| Error::Timeout(self.timeout))??
                }
            };

            let Some(bytes) = next else {
                break;
            };

            writer
                .write_all(&bytes)
                .await
                .map_err(|e| Error::fs(path, e))?;

            let len = bytes.len() as u64;
            written += len;
            self.downloaded.fetch_add(len, Ordering::Relaxed);
            observer.inc(len);
        }

        Ok(written)
    }
}

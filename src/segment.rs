//! Segment store: one temporary file per range.
//!
//! Segment files are named `<filename>_<start>_<end>` after the range they
//! hold, so a later run against the same resource finds the bytes an earlier
//! run already fetched and only asks for the missing tail.
use crate::error::{Error, Result};
use crate::state::Range;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};

/// A range together with its backing file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The range as planned. Never modified, the file name derives from it.
    pub range: Range,
    pub path: PathBuf,
    /// Bytes of the range already present in the file.
    pub on_disk: u64,
}

impl Segment {
    /// The part of the range still to be fetched, with its start advanced
    /// past the bytes already on disk. `None` once the range is complete.
    pub fn remaining(&self) -> Option<Range> {
        let start = self.range.start + self.on_disk;
        (start <= self.range.end).then(|| Range::new(self.range.index, start, self.range.end))
    }

    pub fn is_complete(&self) -> bool {
        self.remaining().is_none()
    }
}

/// A segment whose file is open for appending. Owned by exactly one fetch task.
#[derive(Debug)]
pub struct OpenSegment {
    pub segment: Segment,
    pub file: File,
}

/// Path of the segment file holding `range` of `filename`.
pub fn segment_path(dir: &Path, filename: &str, range: &Range) -> PathBuf {
    dir.join(format!("{}_{}_{}", filename, range.start, range.end))
}

/// Opens (or creates) the segment file for `range` and measures how much of
/// it was fetched by an earlier run.
///
/// A file longer than its range is cut back to the range length.
pub async fn open_segment(dir: &Path, filename: &str, range: Range) -> Result<OpenSegment> {
    let path = segment_path(dir, filename, &range);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| Error::fs(&path, e))?;

    let mut on_disk = file
        .metadata()
        .await
        .map_err(|e| Error::fs(&path, e))?
        .len();

    if on_disk > range.len() {
        tracing::warn!(
            "segment {} holds {} bytes for a {}-byte range, truncating",
            path.display(),
            on_disk,
            range.len()
        );
        file.set_len(range.len())
            .await
            .map_err(|e| Error::fs(&path, e))?;
        on_disk = range.len();
    }

    if on_disk > 0 {
        tracing::info!(
            "resuming {} at byte {} ({} of {} bytes on disk)",
            path.display(),
            range.start + on_disk,
            on_disk,
            range.len()
        );
    }

    Ok(OpenSegment {
        segment: Segment {
            range,
            path,
            on_disk,
        },
        file,
    })
}

/// Opens a segment for every range, in order. Any failure aborts the run.
pub async fn open_segments(dir: &Path, filename: &str, ranges: &[Range]) -> Result<Vec<OpenSegment>> {
    let mut segments = Vec::with_capacity(ranges.len());
    for range in ranges {
        segments.push(open_segment(dir, filename, *range).await?);
    }
    Ok(segments)
}

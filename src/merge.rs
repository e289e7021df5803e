//! Merger: concatenates segment files into the final output, in range order.
use crate::error::{Error, Result};
use crate::segment::Segment;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes every segment, ordered by start offset, into `dest`.
///
/// `dest` is created or truncated. Returns the total number of bytes written.
/// A segment that yields no bytes is fatal: every range is at least one byte.
pub async fn merge_segments(dest: &Path, segments: &[Segment]) -> Result<u64> {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.range.start);

    let file = File::create(dest).await.map_err(|e| Error::fs(dest, e))?;
    let mut writer = BufWriter::new(file);
    let mut total = 0u64;

    for segment in ordered {
        let mut src = File::open(&segment.path)
            .await
            .map_err(|e| Error::fs(&segment.path, e))?;

        let written = tokio::io::copy(&mut src, &mut writer)
            .await
            .map_err(|e| Error::fs(&segment.path, e))?;

        if written == 0 {
            return Err(Error::ZeroByteWrite {
                path: segment.path.clone(),
            });
        }

        tracing::debug!(
            "merged range {} from {} ({} bytes)",
            segment.range.index,
            segment.path.display(),
            written
        );
        total += written;
    }

    writer.flush().await.map_err(|e| Error::fs(dest, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| Error::fs(dest, e))?;

    tracing::info!("merged {} bytes into {}", total, dest.display());
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_path;
    use crate::state::Range;
    use tempfile::tempdir;

    fn write_segment(dir: &Path, range: Range, fill: u8) -> Segment {
        let path = segment_path(dir, "out.bin", &range);
        std::fs::write(&path, vec![fill; range.len() as usize]).unwrap();
        Segment {
            range,
            path,
            on_disk: range.len(),
        }
    }

    #[tokio::test]
    async fn test_merge_keeps_range_order() -> Result<()> {
        let dir = tempdir().unwrap();
        let first = write_segment(dir.path(), Range::new(0, 0, 3), 0x41);
        let second = write_segment(dir.path(), Range::new(1, 4, 7), 0x42);
        let dest = dir.path().join("out.bin");

        // handed over out of order on purpose
        let total = merge_segments(&dest, &[second, first]).await?;

        assert_eq!(total, 8);
        assert_eq!(std::fs::read(&dest).unwrap(), b"AAAABBBB");
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_truncates_existing_destination() -> Result<()> {
        let dir = tempdir().unwrap();
        let only = write_segment(dir.path(), Range::new(0, 0, 1), b'z');
        let dest = dir.path().join("out.bin");
        std::fs::write(&dest, b"stale content").unwrap();

        merge_segments(&dest, &[only]).await?;
        assert_eq!(std::fs::read(&dest).unwrap(), b"zz");
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_segment_is_fatal() {
        let dir = tempdir().unwrap();
        let range = Range::new(0, 0, 9);
        let path = segment_path(dir.path(), "out.bin", &range);
        std::fs::write(&path, b"").unwrap();
        let segment = Segment {
            range,
            path,
            on_disk: 0,
        };

        let err = merge_segments(&dir.path().join("out.bin"), &[segment])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ZeroByteWrite { .. }));
    }

    #[tokio::test]
    async fn test_missing_segment_is_fatal() {
        let dir = tempdir().unwrap();
        let range = Range::new(0, 0, 9);
        let segment = Segment {
            path: segment_path(dir.path(), "out.bin", &range),
            range,
            on_disk: 10,
        };

        let err = merge_segments(&dir.path().join("out.bin"), &[segment])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }
}

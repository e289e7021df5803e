//! Finalizer: removes segment files once the merge succeeded.
use crate::error::{Error, Result};
use crate::segment::Segment;

/// Deletes every segment file. The first failure stops the cleanup.
pub async fn remove_segments(segments: &[Segment]) -> Result<()> {
    for segment in segments {
        tokio::fs::remove_file(&segment.path)
            .await
            .map_err(|e| Error::fs(&segment.path, e))?;
        tracing::debug!("removed {}", segment.path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_path;
    use crate::state::Range;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_removes_all_segments() -> Result<()> {
        let dir = tempdir().unwrap();
        let segments: Vec<Segment> = [Range::new(0, 0, 4), Range::new(1, 5, 9)]
            .into_iter()
            .map(|range| {
                let path = segment_path(dir.path(), "f", &range);
                std::fs::write(&path, b"12345").unwrap();
                Segment {
                    range,
                    path,
                    on_disk: 5,
                }
            })
            .collect();

        remove_segments(&segments).await?;
        assert!(segments.iter().all(|s| !s.path.exists()));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_segment_fails_cleanup() {
        let dir = tempdir().unwrap();
        let range = Range::new(0, 0, 4);
        let segment = Segment {
            path: segment_path(dir.path(), "f", &range),
            range,
            on_disk: 5,
        };
        assert!(matches!(
            remove_segments(&[segment]).await,
            Err(Error::Filesystem { .. })
        ));
    }
}

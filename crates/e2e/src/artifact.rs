//! Copying captured screenshots into the report's asset folder

use std::path::Path;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

pub trait ArtifactCopier: Send + Sync {
    fn copy(&self, src: &Path, dest: &Path) -> HarnessResult<()>;
}

/// Plain file-system copy, creating the destination folder on demand
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCopier;

impl ArtifactCopier for FsCopier {
    fn copy(&self, src: &Path, dest: &Path) -> HarnessResult<()> {
        let copy_error = |e: std::io::Error| HarnessError::ArtifactCopy {
            from: src.display().to_string(),
            to: dest.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(copy_error)?;
        }
        let bytes = std::fs::copy(src, dest).map_err(copy_error)?;
        debug!("Copied {} ({} bytes) to {}", src.display(), bytes, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("shot.png");
        std::fs::write(&src, b"png").unwrap();

        let dest = dir.path().join("Suite1").join("T1.png");
        FsCopier.copy(&src, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"png");
    }

    #[test]
    fn test_copy_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsCopier
            .copy(&dir.path().join("nope.png"), &dir.path().join("out.png"))
            .unwrap_err();
        assert!(matches!(err, HarnessError::ArtifactCopy { .. }));
    }
}

//! Whether an artifact on disk counts as present.

use std::path::Path;

/// Decides whether a file at `path` is a usable artifact.
///
/// Archive files never change once published, so [`FileExists`] is enough in
/// practice. A store can be given a stricter check (size, hash) instead.
pub trait ArtifactCheck: Send + Sync {
    fn is_present(&self, path: &Path) -> bool;
}

/// A regular file exists at the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExists;

impl ArtifactCheck for FileExists {
    fn is_present(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// A regular, non-empty file exists at the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyFile;

impl ArtifactCheck for NonEmptyFile {
    fn is_present(&self, path: &Path) -> bool {
        path.metadata()
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let empty = dir.path().join("empty.grib2");
        let full = dir.path().join("full.grib2");
        std::fs::write(&empty, b"")?;
        std::fs::write(&full, b"GRIB")?;

        assert!(FileExists.is_present(&empty));
        assert!(!FileExists.is_present(dir.path()));
        assert!(!FileExists.is_present(&dir.path().join("absent")));

        assert!(!NonEmptyFile.is_present(&empty));
        assert!(NonEmptyFile.is_present(&full));
        Ok(())
    }
}

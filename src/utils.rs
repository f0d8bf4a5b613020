use log::info;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "mrms_qpe_cache";

/// Default storage root: `mrms_qpe_cache` inside the platform cache directory.
pub fn get_cache_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system cache directory",
            )
        })
        .map(|p| p.join(CACHE_DIR_NAME))
}

pub async fn ensure_storage_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Storage path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating storage directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_storage_dir_creates_nested() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        ensure_storage_dir_exists(&nested).await?;
        assert!(nested.is_dir());
        // Second call is a no-op.
        ensure_storage_dir_exists(&nested).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_storage_dir_rejects_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x")?;
        assert!(ensure_storage_dir_exists(&file).await.is_err());
        Ok(())
    }

    #[test]
    fn test_cache_dir_name() {
        if let Ok(dir) = get_cache_dir() {
            assert!(dir.ends_with(CACHE_DIR_NAME));
        }
    }
}

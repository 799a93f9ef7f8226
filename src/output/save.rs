//! Saving artifacts into a folder with timestamped names

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ArtifactStore, PersistError};
use crate::encode::EncodedArtifact;

/// `GifCast_2026-10-15_09-41-07.gif`
pub fn artifact_file_name(at: DateTime<Local>, extension: &str) -> String {
    format!("GifCast_{}.{}", at.format("%Y-%m-%d_%H-%M-%S"), extension)
}

/// Writes artifacts into one directory, never overwriting
#[derive(Debug, Clone)]
pub struct FolderStore {
    dir: PathBuf,
}

impl FolderStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First name that doesn't exist yet: `name.ext`, `name_1.ext`, ...
    fn unused_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (file_name, None),
        };
        let mut n = 1u32;
        loop {
            let name = match ext {
                Some(ext) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", stem, n),
            };
            let candidate = self.dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    fn save_at(&self, artifact: &EncodedArtifact, at: DateTime<Local>) -> Result<PathBuf, PersistError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistError::Directory {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.unused_path(&artifact_file_name(at, artifact.extension()));
        std::fs::write(&path, artifact.bytes()).map_err(|source| PersistError::Write {
            path: path.clone(),
            source,
        })?;

        info!("Saved {} bytes to {}", artifact.len(), path.display());
        Ok(path)
    }
}

impl ArtifactStore for FolderStore {
    fn save(&self, artifact: &EncodedArtifact) -> Result<PathBuf, PersistError> {
        self.save_at(artifact, Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn gif() -> EncodedArtifact {
        EncodedArtifact::from_bytes(b"GIF89a-test-bytes".to_vec()).unwrap()
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            artifact_file_name(fixed_time(), "gif"),
            "GifCast_2026-03-04_05-06-07.gif"
        );
    }

    #[test]
    fn test_save_creates_directory_and_writes_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = FolderStore::new(tmp.path().join("nested").join("out"));

        let path = store.save_at(&gif(), fixed_time()).unwrap();

        assert_eq!(path.file_name().unwrap(), "GifCast_2026-03-04_05-06-07.gif");
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a-test-bytes");
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let tmp = TempDir::new().unwrap();
        let store = FolderStore::new(tmp.path().to_path_buf());

        let first = store.save_at(&gif(), fixed_time()).unwrap();
        let second = store.save_at(&gif(), fixed_time()).unwrap();
        let third = store.save_at(&gif(), fixed_time()).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "GifCast_2026-03-04_05-06-07_1.gif");
        assert_eq!(third.file_name().unwrap(), "GifCast_2026-03-04_05-06-07_2.gif");
    }

    #[test]
    fn test_unwritable_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = FolderStore::new(blocker.join("sub"));

        assert!(matches!(
            store.save_at(&gif(), fixed_time()),
            Err(PersistError::Directory { .. })
        ));
    }
}

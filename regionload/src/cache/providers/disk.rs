//! On-disk cache provider.
//!
//! Stores one file per key under a cache directory. File names are the
//! SHA-256 of the key so arbitrary keys map to safe, fixed-length names.
//! Writes go to a temporary file first and are renamed into place, so a
//! reader never observes a half-written entry.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::cache::traits::{BoxFuture, Cache, ServiceCacheError};

/// Extension of committed cache files.
const ENTRY_EXTENSION: &str = "json";

/// Result of clearing a disk cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Number of entry files removed.
    pub files_deleted: u64,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

/// On-disk cache provider.
pub struct DiskCacheProvider {
    directory: PathBuf,
    /// Disambiguates temp files of concurrent writers.
    write_seq: AtomicU64,
}

impl DiskCacheProvider {
    /// Create a provider rooted at `directory`.
    ///
    /// The directory is created lazily on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_seq: AtomicU64::new(0),
        }
    }

    /// Root directory of this cache.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File path for a key.
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.directory.join(format!("{}.{}", name, ENTRY_EXTENSION))
    }
}

impl Cache for DiskCacheProvider {
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.directory).await?;

            let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
            let temp_path = path.with_extension(format!("{}.tmp", seq));
            tokio::fs::write(&temp_path, &value).await?;

            if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move { Ok(tokio::fs::try_exists(&path).await?) })
    }

    fn entry_count(&self) -> u64 {
        disk_cache_stats(&self.directory)
            .map(|(files, _)| files)
            .unwrap_or(0)
    }
}

/// Iterate committed entry files in a cache directory.
fn entry_files(dir: &Path) -> io::Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
            continue;
        }
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            files.push((path, metadata.len()));
        }
    }
    Ok(files)
}

/// Count entry files and their total size in a cache directory.
///
/// A missing directory counts as empty.
pub fn disk_cache_stats(dir: &Path) -> io::Result<(u64, u64)> {
    let files = entry_files(dir)?;
    let bytes = files.iter().map(|(_, len)| len).sum();
    Ok((files.len() as u64, bytes))
}

/// Remove every entry file from a cache directory.
pub fn clear_disk_cache(dir: &Path) -> io::Result<ClearResult> {
    let mut result = ClearResult::default();
    for (path, len) in entry_files(dir)? {
        std::fs::remove_file(&path)?;
        result.files_deleted += 1;
        result.bytes_freed += len;
    }
    Ok(result)
}

//! Rendered thumbnail cache on disk.
//!
//! Cached files live at `{thumb_cache_path}/{group-key}{/sub/path}/{filename}`,
//! mirroring the request path so a static file server can serve them
//! directly. Writes go through a temporary file in the target directory and
//! an atomic rename; concurrent writers of the same name produce identical
//! bytes, so the last rename wins harmlessly.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::ThumbError;

/// Location of a cached rendition.
pub fn cache_path(root: &Path, group_key: &str, sub_path: &str, filename: &str) -> PathBuf {
    let mut path = root.join(group_key);
    for segment in sub_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.join(filename)
}

/// Read a cached rendition if present.
pub fn read(path: &Path) -> Option<Vec<u8>> {
    if !path.is_file() {
        return None;
    }
    std::fs::read(path).ok()
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn write(path: &Path, bytes: &[u8]) -> Result<(), ThumbError> {
    let dir = path
        .parent()
        .ok_or_else(|| ThumbError::Io(format!("cache path has no parent: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| ThumbError::Io(e.error.to_string()))?;
    Ok(())
}

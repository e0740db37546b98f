//! Source image location.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};

use crate::error::ThumbError;
use crate::route::RoutePath;
use crate::settings::GroupConfig;

/// Source file for a request, relative segments decoded and transcoded to
/// the group's filesystem encoding.
///
/// Does not touch the filesystem; see [`check_source`].
pub fn source_path(route: &RoutePath, config: &GroupConfig) -> Result<PathBuf, ThumbError> {
    let filename = route.source_filename();
    if filename.is_empty() {
        return Err(ThumbError::InvalidRequest(
            "request path has no source filename".to_string(),
        ));
    }

    let relative = format!("{}/{}", route.source_sub_path(), filename);
    let decoded = urlencoding::decode(&relative)
        .map_err(|e| ThumbError::InvalidRequest(format!("source path is not UTF-8: {}", e)))?;

    let mut path = config.source_path.clone();
    for segment in decoded.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." || segment == "." || segment.contains('\0') {
            return Err(ThumbError::InvalidRequest(format!(
                "illegal path segment '{}'",
                segment
            )));
        }
        path.push(transcode(segment, &config.system_file_encoding)?);
    }
    Ok(path)
}

/// Verify the group root is a directory and `path` is an existing file.
pub fn check_source(root: &Path, path: &Path) -> Result<(), ThumbError> {
    if !root.is_dir() {
        return Err(ThumbError::SourceRootMissing {
            path: root.display().to_string(),
        });
    }
    if !path.is_file() {
        return Err(ThumbError::SourceNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Encode one path segment for a filesystem with encoding `label`.
fn transcode(segment: &str, label: &str) -> Result<PathBuf, ThumbError> {
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
    if encoding == UTF_8 {
        return Ok(PathBuf::from(segment));
    }

    let (bytes, _, had_errors) = encoding.encode(segment);
    if had_errors {
        return Err(ThumbError::InvalidRequest(format!(
            "'{}' cannot be represented in {}",
            segment,
            encoding.name()
        )));
    }
    Ok(os_path(bytes))
}

#[cfg(unix)]
fn os_path(bytes: Cow<'_, [u8]>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(bytes.into_owned()))
}

#[cfg(not(unix))]
fn os_path(bytes: Cow<'_, [u8]>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

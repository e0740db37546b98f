//! Lossless output optimization through an external tool.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tempfile::TempPath;
use tracing::{debug, warn};

/// Executable looked up on `PATH` when no binary is configured.
pub const DEFAULT_PNGOUT_BIN: &str = "pngout";

/// An external optimizer that rewrites an encoded image losslessly.
pub trait LosslessOptimizer {
    /// Whether the tool can be launched.
    fn is_supported(&self) -> bool;

    /// Optimize already encoded output, returning the artifact on success.
    ///
    /// A tool that cannot be launched yields `None`, as does any failure.
    /// The artifact is removed when the returned path is dropped.
    fn run(&self, encoded: &[u8]) -> Option<TempPath>;
}

/// `pngout` PNG recompressor.
#[derive(Debug, Clone)]
pub struct Pngout {
    bin: PathBuf,
}

impl Pngout {
    pub fn new(bin: Option<PathBuf>) -> Self {
        Self {
            bin: bin.unwrap_or_else(|| PathBuf::from(DEFAULT_PNGOUT_BIN)),
        }
    }

    pub fn bin(&self) -> &std::path::Path {
        &self.bin
    }
}

impl LosslessOptimizer for Pngout {
    fn is_supported(&self) -> bool {
        Command::new(&self.bin)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn run(&self, encoded: &[u8]) -> Option<TempPath> {
        let input = tempfile::Builder::new()
            .prefix("urlthumb-in-")
            .suffix(".png")
            .tempfile()
            .and_then(|mut file| {
                std::io::Write::write_all(&mut file, encoded)?;
                Ok(file.into_temp_path())
            });
        let output = tempfile::Builder::new()
            .prefix("urlthumb-out-")
            .suffix(".png")
            .tempfile()
            .map(|file| file.into_temp_path());

        let (input, output) = match (input, output) {
            (Ok(input), Ok(output)) => (input, output),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to create optimizer scratch files");
                return None;
            }
        };

        let status = Command::new(&self.bin)
            .arg(&*input)
            .arg(&*output)
            .arg("-y")
            .arg("-q")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {
                let written = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
                if written == 0 {
                    warn!(bin = %self.bin.display(), "Optimizer produced no output");
                    return None;
                }
                debug!(before = encoded.len(), after = written, "PNG optimized");
                Some(output)
            }
            Ok(status) => {
                debug!(bin = %self.bin.display(), code = ?status.code(), "Optimizer declined");
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(bin = %self.bin.display(), "PNG optimizer unavailable, skipping");
                None
            }
            Err(e) => {
                warn!(bin = %self.bin.display(), error = %e, "Failed to launch optimizer");
                None
            }
        }
    }
}

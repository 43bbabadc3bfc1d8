//! Waiting for output files the engine may still be flushing.

use crate::error::{BackendError, BackendResult};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use ti_core::CancelToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitOptions {
    /// How long a file may take to appear and settle.
    pub patience: Duration,
    pub poll: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            patience: Duration::from_secs(5),
            poll: Duration::from_millis(50),
        }
    }
}

impl WaitOptions {
    /// No waiting at all: the file is either there or missing.
    pub fn immediate() -> Self {
        Self {
            patience: Duration::ZERO,
            poll: Duration::ZERO,
        }
    }
}

/// Block until `path` exists, is non-empty, ends with a newline and has
/// stopped growing between two polls.
pub fn wait_for_file(path: &Path, opts: &WaitOptions, cancel: &CancelToken) -> BackendResult<()> {
    let deadline = Instant::now() + opts.patience;
    let mut last_len: Option<u64> = None;
    loop {
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        if let Ok(meta) = std::fs::metadata(path) {
            let len = meta.len();
            let stable = last_len == Some(len) || opts.patience.is_zero();
            if len > 0 && stable && ends_with_newline(path)? {
                return Ok(());
            }
            last_len = Some(len);
        }
        if Instant::now() >= deadline {
            return if path.exists() {
                Ok(())
            } else {
                Err(BackendError::MissingOutput {
                    path: path.to_path_buf(),
                })
            };
        }
        trace!(path = %path.display(), "waiting for output");
        thread::sleep(opts.poll);
    }
}

fn ends_with_newline(path: &Path) -> BackendResult<bool> {
    use std::io::{Read, Seek, SeekFrom};
    let mut f = std::fs::File::open(path).map_err(|e| BackendError::io(path, e))?;
    if f.seek(SeekFrom::End(-1)).is_err() {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    f.read_exact(&mut last).map_err(|e| BackendError::io(path, e))?;
    Ok(last[0] == b'\n')
}

use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Advisory lock held while a build context file is read and rewritten, so
/// `setup`, `mark-dirty` and `teardown` from different processes serialize.
pub struct ContextLock {
    file: File,
    path: PathBuf,
}

impl ContextLock {
    /// Block until the context is ours.
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        if let Err(e) = file.lock_exclusive() {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("cannot lock build context {}: {e}", lock_path.display()),
            )));
        }
        debug!("locked build context {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path.to_path_buf(),
        })
    }

    /// `None` when another process is currently updating the context.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        Ok(file.try_lock_exclusive().ok().map(|()| Self {
            file,
            path: lock_path.to_path_buf(),
        }))
    }
}

impl Drop for ContextLock {
    fn drop(&mut self) {
        if self.file.unlock().is_ok() {
            debug!("released build context {}", self.path.display());
        }
    }
}

/// Lock files live next to the context, in a directory that may not exist yet
/// on the first `setup` of a workspace.
fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    match lock_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)?,
        _ => {}
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;
    Ok(file)
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Trap Ctrl-C during `run` so the box still gets torn down. The first
/// interrupt lets the current provisioning step finish; a second one gives up
/// and leaves the box to a later `bootbox teardown`.
pub fn install_signal_handler() {
    let installed = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            eprintln!("\nsecond interrupt, exiting; run `bootbox teardown` to clean up");
            std::process::exit(130);
        }
        eprintln!("\ninterrupted: tearing the box down once the current step ends");
    });
    if let Err(e) = installed {
        debug!("Ctrl-C handler not installed: {e}");
    }
}

pub fn shutdown_requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

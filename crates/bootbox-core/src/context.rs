use crate::concurrency::ContextLock;
use crate::CoreError;
use bootbox_provision::EnvironmentHandle;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Per-build state shared between the wrapper and later build steps.
///
/// `dirty` starts false and is only ever set by downstream steps that have
/// put something in the environment worth packaging. `destroy_policy` is a
/// copy of the config's destroy flag so teardown does not need the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    #[serde(default)]
    pub environment: Option<EnvironmentHandle>,
    #[serde(default)]
    pub dirty: bool,
    #[serde(default)]
    pub destroy_policy: bool,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// The keys the lifecycle controller reads and writes on the host's
/// per-build context. Nothing else is touched.
pub trait BuildContextBridge {
    /// Record a freshly provisioned environment. Resets `dirty`.
    fn publish(&mut self, handle: EnvironmentHandle, destroy_policy: bool);

    fn environment(&self) -> Option<&EnvironmentHandle>;

    fn destroy_policy(&self) -> bool;

    fn clear_environment(&mut self);
}

impl BuildContextBridge for BuildContext {
    fn publish(&mut self, handle: EnvironmentHandle, destroy_policy: bool) {
        self.environment = Some(handle);
        self.dirty = false;
        self.destroy_policy = destroy_policy;
    }

    fn environment(&self) -> Option<&EnvironmentHandle> {
        self.environment.as_ref()
    }

    fn destroy_policy(&self) -> bool {
        self.destroy_policy
    }

    fn clear_environment(&mut self) {
        self.environment = None;
    }
}

/// A build context persisted as JSON, so `setup` and `teardown` can run in
/// separate processes.
#[derive(Debug, Clone)]
pub struct ContextFile {
    path: PathBuf,
}

impl ContextFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Read the context. A missing file is an empty context.
    pub fn load(&self) -> Result<BuildContext, CoreError> {
        if !self.path.exists() {
            return Ok(BuildContext::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, context: &BuildContext) -> Result<(), CoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        std::fs::create_dir_all(&dir)?;

        let content = serde_json::to_string_pretty(context)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CoreError::Io(e.error))?;
        Ok(())
    }

    /// Load, modify and save under an exclusive lock. The file is left
    /// untouched when `f` fails.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut BuildContext) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let _lock = ContextLock::acquire(&self.lock_path())?;
        let mut context = self.load()?;
        let value = f(&mut context)?;
        self.save(&context)?;
        Ok(value)
    }
}

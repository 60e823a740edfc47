use crate::CoreError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds the directory holding the environment descriptor.
#[derive(Debug, Clone)]
pub struct EnvironmentLocator {
    descriptor_file: String,
}

impl EnvironmentLocator {
    pub fn new(descriptor_file: impl Into<String>) -> Self {
        Self {
            descriptor_file: descriptor_file.into(),
        }
    }

    pub fn descriptor_file(&self) -> &str {
        &self.descriptor_file
    }

    /// Resolve the descriptor directory: the configured path when set and
    /// non-empty, the workspace otherwise. Fails with `MissingDescriptor`
    /// unless the descriptor file exists there.
    ///
    /// The result is always absolute, since it ends up in a handle that
    /// another process may reopen from a different working directory.
    pub fn resolve(&self, configured: Option<&Path>, workspace: &Path) -> Result<PathBuf, CoreError> {
        let root = match configured {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => workspace.to_path_buf(),
        };

        if root.join(&self.descriptor_file).is_file() {
            let root = std::path::absolute(&root)?;
            debug!("found {} in {}", self.descriptor_file, root.display());
            Ok(root)
        } else {
            Err(CoreError::MissingDescriptor {
                descriptor: self.descriptor_file.clone(),
                searched: root,
            })
        }
    }
}

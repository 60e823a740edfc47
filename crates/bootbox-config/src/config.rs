use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the workspace root when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "bootbox.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("provisioner name must not be empty")]
    EmptyProvisioner,
}

/// Per-job wrapper settings. Fixed for the duration of one build.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WrapperConfig {
    /// Directory holding the environment descriptor. Unset or empty means
    /// the workspace root.
    #[serde(default)]
    pub descriptor_path: Option<PathBuf>,
    #[serde(default)]
    pub destroy_on_teardown: bool,
    #[serde(default)]
    pub reload_existing_machines: bool,
    #[serde(default = "default_provisioner")]
    pub provisioner: String,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            descriptor_path: None,
            destroy_on_teardown: false,
            reload_existing_machines: false,
            provisioner: default_provisioner(),
        }
    }
}

fn default_provisioner() -> String {
    "vagrant".to_owned()
}

impl WrapperConfig {
    /// The configured descriptor directory, treating an empty path as unset.
    pub fn configured_descriptor(&self) -> Option<&Path> {
        self.descriptor_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(path) = &overrides.descriptor_path {
            self.descriptor_path = Some(path.clone());
        }
        if let Some(destroy) = overrides.destroy_on_teardown {
            self.destroy_on_teardown = destroy;
        }
        if let Some(reload) = overrides.reload_existing_machines {
            self.reload_existing_machines = reload;
        }
        if let Some(name) = &overrides.provisioner {
            self.provisioner.clone_from(name);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provisioner.trim().is_empty() {
            return Err(ConfigError::EmptyProvisioner);
        }
        Ok(())
    }
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub descriptor_path: Option<PathBuf>,
    pub destroy_on_teardown: Option<bool>,
    pub reload_existing_machines: Option<bool>,
    pub provisioner: Option<String>,
}

pub fn parse_config_str(input: &str) -> Result<WrapperConfig, ConfigError> {
    let config: WrapperConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<WrapperConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Load the wrapper config for a workspace.
///
/// An explicit path must exist. Without one, `<workspace>/bootbox.toml` is
/// used when present and built-in defaults otherwise.
pub fn load_for_workspace(
    workspace: &Path,
    explicit: Option<&Path>,
) -> Result<WrapperConfig, ConfigError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        return parse_config_file(path);
    }

    let candidate = workspace.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        parse_config_file(&candidate)
    } else {
        Ok(WrapperConfig::default())
    }
}

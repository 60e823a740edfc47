//! Wrapper configuration for bootbox.
//!
//! This crate defines the settings a build job hands to the wrapper
//! (`WrapperConfig`): where the environment descriptor lives, whether the
//! environment is destroyed when the build finishes, and whether machines that
//! already exist are reloaded instead of booted in bulk. Settings are read from
//! an optional `bootbox.toml` in the workspace and may be overridden per call.

pub mod config;

pub use config::{
    load_for_workspace, parse_config_file, parse_config_str, ConfigError, ConfigOverrides,
    WrapperConfig, CONFIG_FILE_NAME,
};

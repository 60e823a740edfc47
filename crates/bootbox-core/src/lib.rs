//! Build-lifecycle orchestration for bootbox.
//!
//! This crate ties the wrapper config and a provisioning backend into the
//! `LifecycleController`, the two-call contract (`setup` before a build,
//! `teardown` after it) a host build orchestrator drives. It also locates the
//! environment descriptor, models the per-build `BuildContext` the controller
//! publishes into, and persists that context between host invocations.

pub mod concurrency;
pub mod context;
pub mod controller;
pub mod lifecycle;
pub mod locator;

pub use concurrency::{install_signal_handler, shutdown_requested, ContextLock};
pub use context::{BuildContext, BuildContextBridge, ContextFile};
pub use controller::{LifecycleController, SetupOutcome, TeardownOutcome};
pub use lifecycle::{validate_transition, LifecycleState};
pub use locator::EnvironmentLocator;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] bootbox_config::ConfigError),
    #[error("provisioning error: {0}")]
    Provision(#[from] bootbox_provision::ProvisionError),
    #[error("no {descriptor} found in {}", .searched.display())]
    MissingDescriptor {
        descriptor: String,
        searched: PathBuf,
    },
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("environment was provisioned with '{recorded}', not '{current}'")]
    ProvisionerMismatch { recorded: String, current: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

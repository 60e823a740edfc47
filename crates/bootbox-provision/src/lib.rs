//! Provisioning tool backends for bootbox.
//!
//! This crate is the outbound side of the wrapper: the `Provisioner` and
//! `Session` traits that abstract a VM-provisioning tool, a Vagrant backend
//! that drives the `vagrant` binary in machine-readable mode, a recording mock
//! backend, prerequisite checks, and the `OutputAdapter` that turns the tool's
//! UI callbacks into build-log lines.

pub mod backend;
pub mod machine_readable;
pub mod mock;
pub mod prereq;
pub mod ui;
pub mod vagrant;

pub use backend::{
    select_provisioner, DestroyOptions, EnvironmentHandle, MachineRecord, Provisioner,
    ReloadOptions, Session, Target, UpOptions,
};
pub use mock::{MockProvisioner, ProvisionCall};
pub use prereq::{check_vagrant_prereqs, format_missing, MissingPrereq};
pub use ui::{LogSink, MemorySink, OutputAdapter, Ui, UiOptions, WriterSink};
pub use vagrant::VagrantProvisioner;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("provisioning I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("provisioner '{0}' is not available on this system")]
    Unavailable(String),
    #[error("interactive input required but unavailable: {0}")]
    InteractiveInputUnavailable(String),
    #[error("`{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },
    #[error("unexpected provisioner output: {0}")]
    UnexpectedOutput(String),
}

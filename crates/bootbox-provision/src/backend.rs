use crate::ui::Ui;
use crate::ProvisionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A machine declared in the environment descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineRecord {
    pub name: String,
    pub created: bool,
}

impl MachineRecord {
    pub fn new(name: impl Into<String>, created: bool) -> Self {
        Self {
            name: name.into(),
            created,
        }
    }
}

/// What a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Machine(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all machines"),
            Self::Machine(name) => write!(f, "'{name}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpOptions {
    pub skip_provisioning: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadOptions {
    pub skip_provisioning: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    pub force: bool,
}

/// Opaque reference to a provisioned environment.
///
/// Carries enough to reopen a session on the same descriptor, so a wrapper
/// instantiated after `setup` can still tear the environment down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentHandle {
    provisioner: String,
    root: PathBuf,
}

impl EnvironmentHandle {
    pub fn new(provisioner: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            provisioner: provisioner.into(),
            root: root.into(),
        }
    }

    pub fn provisioner(&self) -> &str {
        &self.provisioner
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// A provisioning-tool session bound to one descriptor directory.
///
/// Every command blocks until the tool reports completion or failure.
pub trait Session: Send {
    fn root(&self) -> &Path;

    /// Machines declared in the descriptor, in declaration order.
    fn list_machines(&self) -> Result<Vec<MachineRecord>, ProvisionError>;

    fn bring_up(&self, target: &Target, options: UpOptions) -> Result<(), ProvisionError>;

    fn reload(&self, machine: &str, options: ReloadOptions) -> Result<(), ProvisionError>;

    fn destroy(&self, target: &Target, options: DestroyOptions) -> Result<(), ProvisionError>;
}

pub trait Provisioner: Send + Sync {
    fn name(&self) -> &str;

    /// File name of the environment descriptor this tool reads.
    fn descriptor_file(&self) -> &str;

    fn available(&self) -> bool;

    fn version(&self) -> Result<String, ProvisionError>;

    /// Open a session on the descriptor in `root`, reporting all output
    /// through `ui`.
    fn open(&self, root: &Path, ui: Arc<dyn Ui>) -> Result<Box<dyn Session>, ProvisionError>;
}

pub fn select_provisioner(name: &str) -> Result<Box<dyn Provisioner>, ProvisionError> {
    match name {
        "vagrant" => Ok(Box::new(crate::vagrant::VagrantProvisioner::new())),
        "mock" => Ok(Box::new(crate::mock::MockProvisioner::new())),
        other => Err(ProvisionError::Unavailable(other.to_owned())),
    }
}

use crate::backend::{
    DestroyOptions, MachineRecord, Provisioner, ReloadOptions, Session, Target, UpOptions,
};
use crate::ui::{Ui, UiOptions};
use crate::ProvisionError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// One interaction with the mock tool, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    Open {
        root: PathBuf,
    },
    ListMachines,
    BringUp {
        target: Target,
        skip_provisioning: bool,
    },
    Reload {
        machine: String,
        skip_provisioning: bool,
    },
    Destroy {
        target: Target,
        force: bool,
    },
}

impl ProvisionCall {
    /// Whether this call changes machine state (as opposed to a query).
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Self::BringUp { .. } | Self::Reload { .. } | Self::Destroy { .. }
        )
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::ListMachines => "status",
            Self::BringUp { .. } => "up",
            Self::Reload { .. } => "reload",
            Self::Destroy { .. } => "destroy",
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    fail_on: Option<&'static str>,
    prompt_on: Option<(&'static str, String)>,
    unavailable: bool,
}

/// In-memory provisioner that records every call.
///
/// Clones share the call log and machine table, so a test can keep one
/// clone while the controller owns another.
#[derive(Debug, Clone)]
pub struct MockProvisioner {
    calls: Arc<Mutex<Vec<ProvisionCall>>>,
    machines: Arc<Mutex<Vec<MachineRecord>>>,
    script: Arc<Script>,
}

impl Default for MockProvisioner {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            machines: Arc::new(Mutex::new(vec![MachineRecord::new("default", false)])),
            script: Arc::new(Script::default()),
        }
    }
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_machines(self, machines: Vec<MachineRecord>) -> Self {
        Self {
            machines: Arc::new(Mutex::new(machines)),
            ..self
        }
    }

    /// Fail every call whose verb (`up`, `reload`, `destroy`, `status`)
    /// matches.
    #[must_use]
    pub fn failing_on(self, verb: &'static str) -> Self {
        let script = Script {
            fail_on: Some(verb),
            prompt_on: self.script.prompt_on.clone(),
            unavailable: self.script.unavailable,
        };
        Self {
            script: Arc::new(script),
            ..self
        }
    }

    /// Ask the UI `prompt` when a call with the given verb runs.
    #[must_use]
    pub fn prompting_on(self, verb: &'static str, prompt: &str) -> Self {
        let script = Script {
            fail_on: self.script.fail_on,
            prompt_on: Some((verb, prompt.to_owned())),
            unavailable: self.script.unavailable,
        };
        Self {
            script: Arc::new(script),
            ..self
        }
    }

    #[must_use]
    pub fn unavailable(self) -> Self {
        let script = Script {
            fail_on: self.script.fail_on,
            prompt_on: self.script.prompt_on.clone(),
            unavailable: true,
        };
        Self {
            script: Arc::new(script),
            ..self
        }
    }

    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Recorded calls that change machine state.
    pub fn commands(&self) -> Vec<ProvisionCall> {
        self.calls()
            .into_iter()
            .filter(ProvisionCall::is_command)
            .collect()
    }

    pub fn machines(&self) -> Vec<MachineRecord> {
        self.machines.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ProvisionError> {
    mutex
        .lock()
        .map_err(|e| ProvisionError::UnexpectedOutput(format!("mutex poisoned: {e}")))
}

impl Provisioner for MockProvisioner {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn descriptor_file(&self) -> &'static str {
        crate::vagrant::VAGRANTFILE
    }

    fn available(&self) -> bool {
        !self.script.unavailable
    }

    fn version(&self) -> Result<String, ProvisionError> {
        Ok("0.0.0-mock".to_owned())
    }

    fn open(&self, root: &Path, ui: Arc<dyn Ui>) -> Result<Box<dyn Session>, ProvisionError> {
        lock(&self.calls)?.push(ProvisionCall::Open {
            root: root.to_path_buf(),
        });
        Ok(Box::new(MockSession {
            root: root.to_path_buf(),
            ui,
            provisioner: self.clone(),
        }))
    }
}

struct MockSession {
    root: PathBuf,
    ui: Arc<dyn Ui>,
    provisioner: MockProvisioner,
}

impl MockSession {
    /// Record the call, then play back any scripted prompt or failure.
    fn record(&self, call: ProvisionCall, line: &str) -> Result<(), ProvisionError> {
        let verb = call.verb();
        lock(&self.provisioner.calls)?.push(call);
        self.ui.info(&format!("==> mock: {line}"), &UiOptions::default());

        let script = &self.provisioner.script;
        if let Some((prompt_verb, prompt)) = &script.prompt_on {
            if *prompt_verb == verb {
                self.ui.ask(prompt, &UiOptions::default())?;
            }
        }
        if script.fail_on == Some(verb) {
            let message = format!("mock {verb} failed");
            self.ui.error(&message, &UiOptions::default());
            return Err(ProvisionError::CommandFailed {
                command: format!("mock {line}"),
                detail: "scripted failure".to_owned(),
            });
        }
        Ok(())
    }

    fn set_created(&self, target: &Target, created: bool) -> Result<(), ProvisionError> {
        let mut machines = lock(&self.provisioner.machines)?;
        for machine in machines.iter_mut() {
            if matches!(target, Target::All)
                || matches!(target, Target::Machine(name) if *name == machine.name)
            {
                machine.created = created;
            }
        }
        Ok(())
    }
}

impl Session for MockSession {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_machines(&self) -> Result<Vec<MachineRecord>, ProvisionError> {
        self.record(ProvisionCall::ListMachines, "status")?;
        Ok(lock(&self.provisioner.machines)?.clone())
    }

    fn bring_up(&self, target: &Target, options: UpOptions) -> Result<(), ProvisionError> {
        let line = if options.skip_provisioning {
            format!("up {target} --no-provision")
        } else {
            format!("up {target}")
        };
        self.record(
            ProvisionCall::BringUp {
                target: target.clone(),
                skip_provisioning: options.skip_provisioning,
            },
            &line,
        )?;
        self.set_created(target, true)
    }

    fn reload(&self, machine: &str, options: ReloadOptions) -> Result<(), ProvisionError> {
        let line = if options.skip_provisioning {
            format!("reload '{machine}' --no-provision")
        } else {
            format!("reload '{machine}'")
        };
        self.record(
            ProvisionCall::Reload {
                machine: machine.to_owned(),
                skip_provisioning: options.skip_provisioning,
            },
            &line,
        )
    }

    fn destroy(&self, target: &Target, options: DestroyOptions) -> Result<(), ProvisionError> {
        let line = if options.force {
            format!("destroy {target} -f")
        } else {
            format!("destroy {target}")
        };
        self.record(
            ProvisionCall::Destroy {
                target: target.clone(),
                force: options.force,
            },
            &line,
        )?;
        self.set_created(target, false)
    }
}

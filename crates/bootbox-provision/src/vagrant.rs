use crate::backend::{
    DestroyOptions, MachineRecord, Provisioner, ReloadOptions, Session, Target, UpOptions,
};
use crate::machine_readable::{parse_line, parse_status, Record};
use crate::ui::{Ui, UiOptions};
use crate::ProvisionError;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

pub const VAGRANTFILE: &str = "Vagrantfile";

const TTY_ERROR_CLASS: &str = "UIExpectsTTY";

/// Drives the `vagrant` command-line tool.
pub struct VagrantProvisioner {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Default for VagrantProvisioner {
    fn default() -> Self {
        Self {
            program: PathBuf::from("vagrant"),
            leading_args: Vec::new(),
        }
    }
}

impl VagrantProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `program leading_args... <vagrant args>` instead of `vagrant`,
    /// e.g. a wrapper script or a pinned installation.
    pub fn with_program(program: impl Into<PathBuf>, leading_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd
    }
}

impl Provisioner for VagrantProvisioner {
    fn name(&self) -> &'static str {
        "vagrant"
    }

    fn descriptor_file(&self) -> &'static str {
        VAGRANTFILE
    }

    fn available(&self) -> bool {
        self.command()
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn version(&self) -> Result<String, ProvisionError> {
        let output = self.command().arg("--version").stdin(Stdio::null()).output()?;
        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                command: "vagrant --version".to_owned(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or("").trim();
        Ok(line.strip_prefix("Vagrant ").unwrap_or(line).to_owned())
    }

    fn open(&self, root: &Path, ui: Arc<dyn Ui>) -> Result<Box<dyn Session>, ProvisionError> {
        debug!("opening vagrant session in {}", root.display());
        Ok(Box::new(VagrantSession {
            program: self.program.clone(),
            leading_args: self.leading_args.clone(),
            root: root.to_path_buf(),
            ui,
        }))
    }
}

pub struct VagrantSession {
    program: PathBuf,
    leading_args: Vec<OsString>,
    root: PathBuf,
    ui: Arc<dyn Ui>,
}

impl VagrantSession {
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .arg("--machine-readable")
            .current_dir(&self.root)
            .env("VAGRANT_CWD", &self.root)
            .stdin(Stdio::null());
        cmd
    }

    /// Run a vagrant command, streaming its records through the UI as they
    /// arrive. Stdin is closed; a prompt surfaces as a failed `ask`.
    fn run(&self, args: &[&str]) -> Result<(), ProvisionError> {
        let cmdline = format!("vagrant {}", args.join(" "));
        debug!("running {cmdline} in {}", self.root.display());

        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stream) = stderr {
                let _ = stream.read_to_string(&mut buf);
            }
            buf
        });

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProvisionError::UnexpectedOutput(
                "stdout was not captured".to_owned(),
            ));
        };

        let mut failure: Option<ProvisionError> = None;
        let mut exit_message: Option<String> = None;
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            };
            if let Err(e) = self.dispatch(&line, &mut exit_message) {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }

        let status = child.wait()?;
        let stderr_text = stderr_reader.join().unwrap_or_default();
        for line in stderr_text.lines().filter(|l| !l.trim().is_empty()) {
            self.ui.error(line, &UiOptions::default());
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if !status.success() {
            let detail = exit_message.unwrap_or_else(|| format!("exited with {status}"));
            return Err(ProvisionError::CommandFailed {
                command: cmdline,
                detail,
            });
        }
        Ok(())
    }

    fn dispatch(
        &self,
        line: &str,
        exit_message: &mut Option<String>,
    ) -> Result<(), ProvisionError> {
        let Some(record) = parse_line(line) else {
            if !line.trim().is_empty() {
                self.ui.info(line, &UiOptions::default());
            }
            return Ok(());
        };

        match record.kind.as_str() {
            "ui" => self.forward_ui(&record),
            "error-exit" => {
                let class = record.field(0);
                let message = record.field(1);
                *exit_message = Some(message.to_owned());
                if class.ends_with(TTY_ERROR_CLASS) {
                    self.ui.ask(message, &UiOptions::default())?;
                } else {
                    for part in message_lines(message) {
                        self.ui.error(part, &UiOptions::default());
                    }
                }
            }
            other => debug!("ignoring {other} record for '{}'", record.target),
        }
        Ok(())
    }

    /// Multi-line records are forwarded one UI call per line, so every
    /// build-log line stays a single physical line.
    fn forward_ui(&self, record: &Record) {
        let opts = UiOptions::default();
        for message in message_lines(record.field(1)) {
            match record.field(0) {
                "warn" => self.ui.warn(message, &opts),
                "error" => self.ui.error(message, &opts),
                "success" => self.ui.success(message, &opts),
                _ => self.ui.info(message, &opts),
            }
        }
    }
}

fn message_lines(message: &str) -> impl Iterator<Item = &str> {
    message
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
}

impl Session for VagrantSession {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_machines(&self) -> Result<Vec<MachineRecord>, ProvisionError> {
        let output = self.command(&["status"]).output()?;
        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                command: "vagrant status".to_owned(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(parse_status(&String::from_utf8_lossy(&output.stdout)))
    }

    fn bring_up(&self, target: &Target, options: UpOptions) -> Result<(), ProvisionError> {
        let mut args = vec!["up"];
        if let Target::Machine(name) = target {
            args.push(name);
        }
        if options.skip_provisioning {
            args.push("--no-provision");
        }
        self.run(&args)
    }

    fn reload(&self, machine: &str, options: ReloadOptions) -> Result<(), ProvisionError> {
        let mut args = vec!["reload", machine];
        if options.skip_provisioning {
            args.push("--no-provision");
        }
        self.run(&args)
    }

    fn destroy(&self, target: &Target, options: DestroyOptions) -> Result<(), ProvisionError> {
        let mut args = vec!["destroy"];
        if let Target::Machine(name) = target {
            args.push(name);
        }
        if options.force {
            args.push("-f");
        }
        self.run(&args)
    }
}

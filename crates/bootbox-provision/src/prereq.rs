use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

const VIRTUALIZATION_PROVIDERS: &[&str] = &["VBoxManage", "virsh", "vmrun", "prlctl", "docker"];

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check prerequisites for the vagrant provisioner.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_vagrant_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists("vagrant") {
        missing.push(MissingPrereq {
            name: "vagrant",
            purpose: "booting, reloading and destroying build boxes",
            install_hint: "https://developer.hashicorp.com/vagrant/install | apt install vagrant | dnf install vagrant",
        });
    }

    if !VIRTUALIZATION_PROVIDERS
        .iter()
        .any(|provider| command_exists(provider))
    {
        missing.push(MissingPrereq {
            name: "virtualization provider",
            purpose: "running the machines vagrant manages",
            install_hint: "install one of: VirtualBox, libvirt, VMware, Parallels, or Docker",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nbootbox needs these tools to provision build environments.");
    msg
}

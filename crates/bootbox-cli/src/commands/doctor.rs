use super::{EXIT_FAILURE, EXIT_SUCCESS};
use bootbox_config::WrapperConfig;
use bootbox_core::{BuildContextBridge, ContextFile, ContextLock, CoreError, EnvironmentLocator};
use bootbox_provision::select_provisioner;
use std::path::Path;

pub fn run(
    workspace: &Path,
    context: &ContextFile,
    config: &WrapperConfig,
    json_output: bool,
) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    check_provisioner(config, &mut checks, &mut all_pass);
    check_descriptor(workspace, config, &mut checks, &mut all_pass);
    check_context(context, &mut checks, &mut all_pass);

    print_results(&checks, all_pass, json_output)
}

fn check_provisioner(config: &WrapperConfig, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if config.provisioner == "vagrant" {
        let missing = bootbox_provision::check_vagrant_prereqs();
        if missing.is_empty() {
            checks.push(Check::pass(
                "provisioner_prereqs",
                "Provisioner prerequisites satisfied",
            ));
        } else {
            *all_pass = false;
            checks.push(Check::fail(
                "provisioner_prereqs",
                &format!(
                    "Missing prerequisites: {}",
                    bootbox_provision::format_missing(&missing)
                ),
            ));
        }
    }

    match select_provisioner(&config.provisioner) {
        Ok(p) if p.available() => match p.version() {
            Ok(v) => checks.push(Check::pass(
                "provisioner",
                &format!("{} {v} available", p.name()),
            )),
            Err(e) => checks.push(Check::warn(
                "provisioner",
                &format!("{} available but version unknown: {e}", p.name()),
            )),
        },
        Ok(p) => {
            *all_pass = false;
            checks.push(Check::fail(
                "provisioner",
                &format!("{} is not available on this system", p.name()),
            ));
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("provisioner", &e.to_string()));
        }
    }
}

fn check_descriptor(
    workspace: &Path,
    config: &WrapperConfig,
    checks: &mut Vec<Check>,
    all_pass: &mut bool,
) {
    let Ok(provisioner) = select_provisioner(&config.provisioner) else {
        return;
    };
    let locator = EnvironmentLocator::new(provisioner.descriptor_file());
    match locator.resolve(config.configured_descriptor(), workspace) {
        Ok(root) => checks.push(Check::pass(
            "descriptor",
            &format!("{} found in {}", locator.descriptor_file(), root.display()),
        )),
        Err(CoreError::MissingDescriptor {
            descriptor,
            searched,
        }) => {
            *all_pass = false;
            checks.push(Check::fail(
                "descriptor",
                &format!("No {descriptor} in {}", searched.display()),
            ));
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("descriptor", &e.to_string()));
        }
    }
}

fn check_context(context: &ContextFile, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match context.load() {
        Ok(ctx) => match ctx.environment() {
            Some(handle) => checks.push(Check::warn(
                "context",
                &format!(
                    "Context still references a {} environment in {} (run teardown)",
                    handle.provisioner(),
                    handle.root().display()
                ),
            )),
            None => checks.push(Check::info("context", "No environment provisioned")),
        },
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "context",
                &format!("Cannot read context file: {e}"),
            ));
        }
    }

    let lock_path = context.lock_path();
    if !lock_path.exists() {
        return;
    }
    match ContextLock::try_acquire(&lock_path) {
        Ok(Some(_)) => checks.push(Check::pass("context_lock", "Context lock is free")),
        Ok(None) => checks.push(Check::warn(
            "context_lock",
            "Context lock is held by another process",
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "context_lock",
                &format!("Cannot check context lock: {e}"),
            ));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("bootbox doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }

    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }
}

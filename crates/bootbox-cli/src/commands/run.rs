use super::{
    build_log, make_controller, setup_persisted, EXIT_CONFIG_ERROR, EXIT_FAILURE,
    EXIT_NOT_EXECUTED, EXIT_SUCCESS,
};
use bootbox_config::WrapperConfig;
use bootbox_core::{
    install_signal_handler, shutdown_requested, ContextFile, CoreError, SetupOutcome,
    TeardownOutcome,
};
use bootbox_provision::LogSink;
use std::path::Path;
use std::process::Command;

/// Env var pointing build steps at the context file, e.g. for `mark-dirty`.
pub const CONTEXT_ENV: &str = "BOOTBOX_CONTEXT";

/// Setup, run the build command, then always attempt teardown.
pub fn run(
    workspace: &Path,
    context: &ContextFile,
    config: &WrapperConfig,
    command: &[String],
    json: bool,
) -> Result<u8, String> {
    install_signal_handler();
    let mut controller = make_controller(&config.provisioner)?;
    let sink = build_log(json);

    let setup = setup_persisted(&mut controller, context, config, workspace, &sink);

    let build_code = match setup {
        Ok(SetupOutcome::Active(_)) if shutdown_requested() => {
            sink.line("build interrupted before it started");
            EXIT_FAILURE
        }
        Ok(SetupOutcome::Active(_)) => run_build(workspace, context.path(), command, sink.as_ref()),
        Ok(SetupOutcome::NotExecuted { reason }) => {
            eprintln!("build not executed: {reason}");
            return Ok(EXIT_NOT_EXECUTED);
        }
        Err(e) => {
            // Nothing was published, so teardown is a no-op; still run it so
            // the context file ends in a consistent state.
            let _ = context.update(|ctx| controller.teardown(ctx, sink.clone()));
            return Err(e.to_string());
        }
    };

    let teardown = context.update(|ctx| controller.teardown(ctx, sink.clone()));
    if let Err(e) = &teardown {
        eprintln!("error: teardown failed: {e}");
    }
    Ok(final_code(build_code, &teardown))
}

/// The build's own result wins. A failed teardown only turns a successful
/// build into a failure.
fn final_code(build_code: u8, teardown: &Result<TeardownOutcome, CoreError>) -> u8 {
    match teardown {
        Err(_) if build_code == EXIT_SUCCESS => EXIT_FAILURE,
        _ => build_code,
    }
}

/// Map a build's exit status onto ours. Codes the wrapper reserves for its own
/// outcomes become a plain failure so they cannot be mistaken for them.
fn build_exit_code(code: Option<i32>) -> u8 {
    match code.and_then(|c| u8::try_from(c).ok()) {
        Some(EXIT_SUCCESS | EXIT_CONFIG_ERROR | EXIT_NOT_EXECUTED) | None => EXIT_FAILURE,
        Some(c) => c,
    }
}

fn run_build(workspace: &Path, context_path: &Path, command: &[String], sink: &dyn LogSink) -> u8 {
    let Some((program, args)) = command.split_first() else {
        sink.line("no build command given");
        return EXIT_FAILURE;
    };

    sink.line(&format!("$ {}", command.join(" ")));
    let status = Command::new(program)
        .args(args)
        .current_dir(workspace)
        .env(CONTEXT_ENV, context_path)
        .status();

    match status {
        Ok(status) if status.success() => EXIT_SUCCESS,
        Ok(status) => {
            sink.line(&format!("build command {status}"));
            build_exit_code(status.code())
        }
        Err(e) => {
            sink.line(&format!("failed to start build command '{program}': {e}"));
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootbox_provision::MemorySink;

    #[cfg(unix)]
    #[test]
    fn build_exit_code_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let command = vec!["sh".to_owned(), "-c".to_owned(), "exit 7".to_owned()];
        let code = run_build(dir.path(), &dir.path().join("ctx.json"), &command, &sink);
        assert_eq!(code, 7);
        assert_eq!(sink.lines()[0], "$ sh -c exit 7");
    }

    #[cfg(unix)]
    #[test]
    fn build_sees_context_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = dir.path().join("ctx.json");
        let sink = MemorySink::new();
        let command = vec![
            "sh".to_owned(),
            "-c".to_owned(),
            format!("test \"${CONTEXT_ENV}\" = \"{}\"", ctx.display()),
        ];
        assert_eq!(run_build(dir.path(), &ctx, &command, &sink), EXIT_SUCCESS);
    }

    #[cfg(unix)]
    #[test]
    fn reserved_build_codes_become_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        for reserved in [EXIT_CONFIG_ERROR, EXIT_NOT_EXECUTED] {
            let command = vec!["sh".to_owned(), "-c".to_owned(), format!("exit {reserved}")];
            let code = run_build(dir.path(), &dir.path().join("ctx.json"), &command, &sink);
            assert_eq!(code, EXIT_FAILURE);
        }
    }

    #[test]
    fn build_exit_code_mapping() {
        assert_eq!(build_exit_code(Some(5)), 5);
        assert_eq!(build_exit_code(Some(2)), EXIT_FAILURE);
        assert_eq!(build_exit_code(Some(3)), EXIT_FAILURE);
        assert_eq!(build_exit_code(Some(0)), EXIT_FAILURE);
        assert_eq!(build_exit_code(Some(300)), EXIT_FAILURE);
        assert_eq!(build_exit_code(None), EXIT_FAILURE);
    }

    fn teardown_failure() -> Result<TeardownOutcome, CoreError> {
        Err(CoreError::Provision(
            bootbox_provision::ProvisionError::CommandFailed {
                command: "mock destroy all machines -f".to_owned(),
                detail: "scripted failure".to_owned(),
            },
        ))
    }

    #[test]
    fn failed_teardown_does_not_mask_failed_build() {
        assert_eq!(final_code(5, &teardown_failure()), 5);
        assert_eq!(final_code(EXIT_FAILURE, &teardown_failure()), EXIT_FAILURE);
    }

    #[test]
    fn failed_teardown_fails_successful_build() {
        assert_eq!(final_code(EXIT_SUCCESS, &teardown_failure()), EXIT_FAILURE);
    }

    #[test]
    fn successful_teardown_keeps_build_code() {
        assert_eq!(final_code(EXIT_SUCCESS, &Ok(TeardownOutcome::Destroyed)), EXIT_SUCCESS);
        assert_eq!(final_code(7, &Ok(TeardownOutcome::Retained)), 7);
        assert_eq!(final_code(EXIT_SUCCESS, &Ok(TeardownOutcome::NothingToDo)), EXIT_SUCCESS);
    }

    #[test]
    fn missing_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let command = vec!["/nonexistent/build-tool".to_owned()];
        let code = run_build(dir.path(), &dir.path().join("ctx.json"), &command, &sink);
        assert_eq!(code, EXIT_FAILURE);
        assert!(sink.lines()[1].starts_with("failed to start build command"));
    }

    #[test]
    fn empty_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        assert_eq!(
            run_build(dir.path(), &dir.path().join("ctx.json"), &[], &sink),
            EXIT_FAILURE
        );
    }
}

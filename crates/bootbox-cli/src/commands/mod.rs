pub mod completions;
pub mod doctor;
pub mod mark_dirty;
pub mod run;
pub mod setup;
pub mod status;
pub mod teardown;

use bootbox_config::WrapperConfig;
use bootbox_core::{BuildContext, ContextFile, CoreError, LifecycleController, SetupOutcome};
use bootbox_provision::{select_provisioner, LogSink, WriterSink};
use std::path::Path;
use std::sync::Arc;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_NOT_EXECUTED: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Where build-log lines go. With `--json` stdout carries the JSON result,
/// so the log moves to stderr.
pub fn build_log(json: bool) -> Arc<dyn LogSink> {
    if json {
        Arc::new(WriterSink::new(std::io::stderr()))
    } else {
        Arc::new(WriterSink::stdout())
    }
}

pub fn make_controller(provisioner: &str) -> Result<LifecycleController, String> {
    let provisioner = select_provisioner(provisioner).map_err(|e| e.to_string())?;
    Ok(LifecycleController::new(provisioner))
}

/// Run setup and record the result in the context file.
///
/// When the environment came up but the context could not be written, the
/// handle only exists in memory; tear it down from there so the box is not
/// orphaned with nothing on disk pointing at it.
pub fn setup_persisted(
    controller: &mut LifecycleController,
    context: &ContextFile,
    config: &WrapperConfig,
    workspace: &Path,
    sink: &Arc<dyn LogSink>,
) -> Result<SetupOutcome, CoreError> {
    let mut published: Option<BuildContext> = None;
    let result = context.update(|ctx| {
        let outcome = controller.setup(config, workspace, sink.clone(), ctx)?;
        if matches!(outcome, SetupOutcome::Active(_)) {
            published = Some(ctx.clone());
        }
        Ok(outcome)
    });

    if let (Err(e), Some(mut live)) = (&result, published) {
        sink.line(&format!(
            "error: could not record the environment in {}: {e}",
            context.path().display()
        ));
        if let Err(teardown_err) = controller.teardown(&mut live, sink.clone()) {
            tracing::warn!("teardown of unrecorded environment failed: {teardown_err}");
        }
    }
    result
}

pub fn outcome_json(outcome: &SetupOutcome) -> serde_json::Value {
    match outcome {
        SetupOutcome::Active(handle) => serde_json::json!({
            "status": "active",
            "provisioner": handle.provisioner(),
            "root": handle.root(),
        }),
        SetupOutcome::NotExecuted { reason } => serde_json::json!({
            "status": "not_executed",
            "reason": reason,
        }),
    }
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "active" => Style::new().green().apply_to(status).to_string(),
        "dirty" => Style::new().yellow().apply_to(status).to_string(),
        "none" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

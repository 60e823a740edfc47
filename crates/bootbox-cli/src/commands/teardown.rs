use super::{build_log, json_pretty, make_controller, EXIT_SUCCESS};
use bootbox_core::{BuildContextBridge, ContextFile, TeardownOutcome};

/// Tear down whatever the context file says was provisioned, using the
/// provisioner recorded with it.
pub fn run(context: &ContextFile, fallback_provisioner: &str, json: bool) -> Result<u8, String> {
    let recorded = context.load().map_err(|e| e.to_string())?;
    let name = recorded
        .environment()
        .map_or(fallback_provisioner, |h| h.provisioner());
    let mut controller = make_controller(name)?;
    let sink = build_log(json);

    let outcome = context
        .update(|ctx| controller.teardown(ctx, sink.clone()))
        .map_err(|e| format!("teardown failed: {e}"))?;

    if json {
        let status = match outcome {
            TeardownOutcome::NothingToDo => "nothing_to_do",
            TeardownOutcome::Retained => "retained",
            TeardownOutcome::Destroyed => "destroyed",
        };
        let payload = serde_json::json!({ "status": status });
        println!("{}", json_pretty(&payload)?);
    }
    Ok(EXIT_SUCCESS)
}

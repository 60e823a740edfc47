use super::{
    build_log, json_pretty, make_controller, outcome_json, setup_persisted, EXIT_NOT_EXECUTED,
    EXIT_SUCCESS,
};
use bootbox_config::WrapperConfig;
use bootbox_core::{ContextFile, SetupOutcome};
use std::path::Path;

pub fn run(
    workspace: &Path,
    context: &ContextFile,
    config: &WrapperConfig,
    json: bool,
) -> Result<u8, String> {
    let mut controller = make_controller(&config.provisioner)?;
    let sink = build_log(json);

    let outcome = setup_persisted(&mut controller, context, config, workspace, &sink)
        .map_err(|e| e.to_string())?;

    if json {
        let mut payload = outcome_json(&outcome);
        payload["context"] = serde_json::json!(context.path());
        println!("{}", json_pretty(&payload)?);
    }
    match outcome {
        SetupOutcome::Active(_) => Ok(EXIT_SUCCESS),
        SetupOutcome::NotExecuted { reason } => {
            if !json {
                eprintln!("build not executed: {reason}");
            }
            Ok(EXIT_NOT_EXECUTED)
        }
    }
}

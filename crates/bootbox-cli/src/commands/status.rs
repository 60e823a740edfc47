use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use bootbox_core::{BuildContextBridge, ContextFile};

pub fn run(context: &ContextFile, json: bool) -> Result<u8, String> {
    let ctx = context.load().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&ctx)?);
        return Ok(EXIT_SUCCESS);
    }

    match ctx.environment() {
        Some(handle) => {
            println!("environment: {}", colorize_status("active"));
            println!("provisioner: {}", handle.provisioner());
            println!("root:        {}", handle.root().display());
        }
        None => println!("environment: {}", colorize_status("none")),
    }
    let dirty = if ctx.is_dirty() { "dirty" } else { "clean" };
    println!("state:       {}", colorize_status(dirty));
    println!("destroy:     {}", ctx.destroy_policy());
    Ok(EXIT_SUCCESS)
}

use super::EXIT_SUCCESS;
use bootbox_core::ContextFile;

pub fn run(context: &ContextFile) -> Result<u8, String> {
    context
        .update(|ctx| {
            ctx.mark_dirty();
            Ok(())
        })
        .map_err(|e| e.to_string())?;
    println!("marked build environment dirty");
    Ok(EXIT_SUCCESS)
}

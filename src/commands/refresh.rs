use anyhow::Result;
use declarative::{Engine, OperationContext};

use super::{connect, load_manifest_or_default, refresh_state};
use crate::Context;
use crate::cli::RefreshArgs;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: RefreshArgs) -> Result<()> {
    let mut state = StateFile::load(&ctx.state_path)?;
    if state.resources.is_empty() {
        ui::info("Nothing tracked yet");
        return Ok(());
    }

    let manifest = load_manifest_or_default(ctx)?;
    let client = connect(&manifest)?;
    let engine = Engine::new(&client);

    let summary = refresh_state(&engine, &OperationContext::new(), &mut state, args.jobs)?;
    state.save(&ctx.state_path)?;

    ui::success(&format!(
        "Refreshed {}",
        ui::plural(summary.refreshed, "resource")
    ));
    if !summary.dropped.is_empty() {
        ui::warn(&format!(
            "Dropped {} deleted outside n8nform",
            ui::plural(summary.dropped.len(), "resource")
        ));
    }
    Ok(())
}

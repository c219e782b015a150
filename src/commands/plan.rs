use anyhow::Result;
use declarative::{Engine, OperationContext};

use super::{build_plan, connect, load_manifest, refresh_state};
use crate::Context;
use crate::cli::PlanArgs;
use crate::display;
use crate::state::StateFile;

/// Show the changes apply would make. Tracked state is never written.
pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let manifest = load_manifest(ctx)?;
    let mut state = StateFile::load(&ctx.state_path)?;
    log::info!(
        "Planning {} declared resources from {}",
        manifest.resources.len(),
        manifest.path.display()
    );

    if !args.no_refresh && !state.resources.is_empty() {
        let client = connect(&manifest)?;
        let engine = Engine::new(&client);
        refresh_state(&engine, &OperationContext::new(), &mut state, args.jobs)?;
    }

    let plan = build_plan(&manifest, &state, args.target.as_deref())?;
    display::display_diff(&plan.diffs());
    Ok(())
}

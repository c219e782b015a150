use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{Engine, OperationContext, ResourceKind};

use super::{connect, load_manifest_or_default};
use crate::Context;
use crate::state::StateFile;
use crate::ui;

/// Split a `kind.name` address
fn parse_address(address: &str) -> Result<(&'static ResourceKind, &str)> {
    let Some((kind, name)) = address.split_once('.') else {
        bail!("Address '{address}' must have the form kind.name");
    };
    if name.is_empty() {
        bail!("Address '{address}' has an empty name");
    }
    let kind = n8nkit::kinds::by_name(kind)
        .with_context(|| format!("Unknown resource kind '{kind}'"))?;
    Ok((kind, name))
}

/// Start tracking an existing remote entity under `address`
pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let (kind, _) = parse_address(address)?;
    let mut state = StateFile::load(&ctx.state_path)?;
    if state.get(address).is_some() {
        bail!("{address} is already tracked; remove it with `n8nform state rm {address}` first");
    }

    let manifest = load_manifest_or_default(ctx)?;
    let client = connect(&manifest)?;
    let engine = Engine::new(&client);

    let record = engine
        .import(&OperationContext::new(), kind, id)
        .with_context(|| format!("Failed to import {} {id}", kind.name))?;
    state.insert(address, kind.name, record);
    state.save(&ctx.state_path)?;

    ui::success(&format!("Imported {id} as {address}"));
    if manifest.resources.iter().all(|r| r.address != address) {
        ui::dim(&format!(
            "{address} is not declared in the manifest; the next apply will delete it"
        ));
    }
    Ok(())
}

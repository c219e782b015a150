use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::cli::StateCommand;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List => list(ctx),
        StateCommand::Show { address } => show(ctx, &address),
        StateCommand::Rm { address } => rm(ctx, &address),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let state = StateFile::load(&ctx.state_path)?;
    if state.resources.is_empty() {
        ui::info("Nothing tracked yet");
        return Ok(());
    }

    for (address, tracked) in &state.resources {
        let id = tracked.attributes.get("id");
        println!("{address}  {}", id.to_string().dimmed());
    }
    Ok(())
}

fn show(ctx: &Context, address: &str) -> Result<()> {
    let state = StateFile::load(&ctx.state_path)?;
    let Some(tracked) = state.get(address) else {
        bail!("{address} is not tracked");
    };

    ui::header(address);
    ui::kv("kind", &tracked.kind);
    for (name, value) in tracked.attributes.iter() {
        ui::kv(name, &value.to_string());
    }
    Ok(())
}

fn rm(ctx: &Context, address: &str) -> Result<()> {
    let mut state = StateFile::load(&ctx.state_path)?;
    if state.remove(address).is_none() {
        bail!("{address} is not tracked");
    }
    state.save(&ctx.state_path)?;
    ui::success(&format!("Stopped tracking {address}; the remote entity was left alone"));
    Ok(())
}

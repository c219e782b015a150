//! Command implementations and the helpers they share

pub mod apply;
pub mod import;
pub mod kinds;
pub mod lookup;
pub mod plan;
pub mod refresh;
pub mod state;

use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{Engine, ExecutionPlan, OperationContext, ReadOutcome};
use n8nkit::N8nClient;
use rayon::prelude::*;

use crate::Context;
use crate::config::Manifest;
use crate::state::StateFile;
use crate::ui;

/// Load the manifest; it must exist
fn load_manifest(ctx: &Context) -> Result<Manifest> {
    Manifest::load(&ctx.manifest_path)
}

/// Load the manifest if present, for commands that only need provider settings
fn load_manifest_or_default(ctx: &Context) -> Result<Manifest> {
    if ctx.manifest_path.exists() {
        load_manifest(ctx)
    } else {
        log::debug!(
            "No manifest at {}, using provider fallbacks",
            ctx.manifest_path.display()
        );
        Ok(Manifest::default())
    }
}

fn connect(manifest: &Manifest) -> Result<N8nClient> {
    let config = manifest.client_config()?;
    let client = N8nClient::new(config).context("Invalid provider configuration")?;
    log::info!("Using n8n API at {}", client.api_root());
    Ok(client)
}

/// Outcome of refreshing tracked state
#[derive(Debug, Default)]
struct RefreshSummary {
    refreshed: usize,
    dropped: Vec<String>,
}

/// Read every tracked resource back, dropping those deleted remotely
///
/// Up to `jobs` addresses are read in parallel; the state is only touched
/// once every read has finished, and not at all if one of them failed.
fn refresh_state(
    engine: &Engine<'_>,
    op: &OperationContext,
    state: &mut StateFile,
    jobs: usize,
) -> Result<RefreshSummary> {
    let entries = state.entries()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create thread pool")?;
    let outcomes: Vec<_> = pool.install(|| {
        entries
            .par_iter()
            .map(|entry| {
                engine
                    .read(op, entry.kind, &entry.attributes)
                    .with_context(|| format!("Failed to refresh {}", entry.address))
            })
            .collect()
    });

    let mut summary = RefreshSummary::default();
    let mut updates = Vec::with_capacity(entries.len());
    for (entry, outcome) in entries.iter().zip(outcomes) {
        updates.push((entry, outcome?));
    }

    for (entry, outcome) in updates {
        match outcome {
            ReadOutcome::Present(record) => {
                state.insert(&entry.address, entry.kind.name, record);
                summary.refreshed += 1;
            }
            ReadOutcome::Removed(drift) => {
                ui::warn(&format!(
                    "{} ({}) was deleted outside n8nform; dropping it from state",
                    entry.address, drift.id
                ));
                state.remove(&entry.address);
                summary.dropped.push(entry.address.clone());
            }
        }
    }

    log::debug!(
        "Refreshed {} resources, dropped {}",
        summary.refreshed,
        summary.dropped.len()
    );
    Ok(summary)
}

/// Compare the manifest with tracked state, optionally narrowed to a target
fn build_plan(
    manifest: &Manifest,
    state: &StateFile,
    target: Option<&str>,
) -> Result<ExecutionPlan> {
    if let Some(target) = target {
        let kind = target.split_once('.').map_or(target, |(kind, _)| kind);
        if n8nkit::kinds::by_name(kind).is_none() {
            bail!("Unknown resource kind '{kind}' in target '{target}'");
        }
    }

    let tracked = state.entries()?;
    Ok(ExecutionPlan::build(&manifest.resources, &tracked).filter_by_target(target))
}

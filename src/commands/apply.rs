use anyhow::{Result, bail};
use declarative::{
    ApplyResult, AutoConfirm, ConfirmCallback, Engine, ExecuteOptions, ExecuteReport,
    ExecutionPlan, OperationContext, execute,
};

use super::{build_plan, connect, load_manifest, refresh_state};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::display;
use crate::progress::{BarProgress, PromptConfirm};
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let manifest = load_manifest(ctx)?;
    let mut state = StateFile::load(&ctx.state_path)?;

    let client = connect(&manifest)?;
    let engine = Engine::new(&client);
    let op = OperationContext::new();

    if !args.no_refresh && !state.resources.is_empty() {
        let summary = refresh_state(&engine, &op, &mut state, args.jobs)?;
        // Drift is recorded even if nothing else gets applied
        if !summary.dropped.is_empty() && !args.dry_run {
            state.save(&ctx.state_path)?;
        }
    }

    let plan = build_plan(&manifest, &state, args.target.as_deref())?;
    display::display_diff(&plan.diffs());
    if plan.is_empty() {
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.max(1),
    };
    let report = if args.yes {
        run_plan(ctx, &engine, &op, &plan, &opts, AutoConfirm)?
    } else {
        run_plan(ctx, &engine, &op, &plan, &opts, PromptConfirm)?
    };

    if args.dry_run {
        println!();
        ui::info("Dry run: no changes were made");
        return Ok(());
    }
    if declined(&report) {
        println!();
        ui::warn("Aborted");
        return Ok(());
    }

    state.record_report(&report);
    state.save(&ctx.state_path)?;
    display::print_summary(&report.summary);

    for (change, result) in &report.results {
        if let ApplyResult::Failed {
            needs_attention: true,
            ..
        } = result
        {
            ui::failure(
                &format!("{} may exist remotely without being tracked", change.address),
                "Check the n8n instance, then run `n8nform import` or remove the entity by hand",
            );
        }
    }

    if !report.summary.is_success() {
        bail!(
            "{} failed; see the errors above",
            ui::plural(report.summary.failed, "change")
        );
    }
    Ok(())
}

fn run_plan<C: ConfirmCallback>(
    ctx: &Context,
    engine: &Engine<'_>,
    op: &OperationContext,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    mut confirm: C,
) -> Result<ExecuteReport> {
    let mut progress = BarProgress::new(ctx.quiet);
    execute(engine, op, plan, opts, &mut progress, &mut confirm)
}

/// Whether the confirmation prompt was answered with no
fn declined(report: &ExecuteReport) -> bool {
    !report.results.is_empty()
        && report
            .results
            .iter()
            .all(|(_, r)| matches!(r, ApplyResult::Skipped { reason } if reason == "Declined"))
}

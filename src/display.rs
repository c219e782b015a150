//! Plan and result display

use colored::{ColoredString, Colorize};
use declarative::{Action, DiffSummary, ExecuteSummary, ResourceDiff, group_by_kind};

use crate::ui;

fn action_symbol(action: Action) -> ColoredString {
    match action {
        Action::Create => action.symbol().green(),
        Action::Delete => action.symbol().red(),
        Action::Update => action.symbol().yellow(),
        Action::Replace => action.symbol().magenta(),
        Action::NoChange => action.symbol().dimmed(),
    }
}

/// Display a list of diffs grouped by kind
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes. Remote state matches the manifest.", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (kind, kind_diffs) in group_by_kind(diffs) {
        println!("│ {}", kind.bold());

        for diff in kind_diffs {
            let note = if diff.is_replacement() {
                " (forces replacement)".magenta().to_string()
            } else {
                String::new()
            };
            println!("│   {} {}{}", action_symbol(diff.action), diff.address, note);

            for change in &diff.changes {
                println!(
                    "│       {:<14} {} → {}",
                    change.name,
                    change.from.to_string().dimmed(),
                    change.to
                );
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!("│ {}", plan_line(&summary));
    println!("└─────────────────────────────────────────────────────┘");
}

fn plan_line(summary: &DiffSummary) -> String {
    format!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.replacements.to_string().magenta(),
        summary.removals.to_string().red()
    )
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", ui::plural(summary.created, "resource"));
    }
    if summary.updated > 0 {
        println!("    • {} updated", ui::plural(summary.updated, "resource"));
    }
    if summary.replaced > 0 {
        println!("    • {} replaced", ui::plural(summary.replaced, "resource"));
    }
    if summary.deleted > 0 {
        println!("    • {} destroyed", ui::plural(summary.deleted, "resource"));
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::plural(summary.skipped, "resource"));
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}

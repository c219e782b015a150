use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{AttributeRecord, Engine, OperationContext, ResourceKind};

use super::{connect, load_manifest_or_default};
use crate::Context;
use crate::cli::{ListArgs, ShowArgs};
use crate::ui;

fn kind_named(name: &str) -> Result<&'static ResourceKind> {
    n8nkit::kinds::by_name(name).with_context(|| format!("Unknown resource kind '{name}'"))
}

/// Scope attributes for listing; only memberships are scoped
fn scope_record(kind: &ResourceKind, project: Option<&str>) -> AttributeRecord {
    let mut scope = AttributeRecord::new();
    match project {
        Some(project) if kind.is_scope("project_id") => scope.set("project_id", project),
        Some(_) => log::warn!("{} is not scoped by project; ignoring --project", kind.name),
        None => {}
    }
    scope
}

fn find(engine: &Engine<'_>, kind: &ResourceKind, args: &ShowArgs) -> Result<AttributeRecord> {
    let scope = scope_record(kind, args.project.as_deref());
    engine
        .lookup(
            &OperationContext::new(),
            kind,
            &scope,
            args.id.as_deref(),
            args.name.as_deref(),
        )
        .with_context(|| format!("Failed to look up {}", kind.name))
}

/// Print one existing entity found by id or name
pub fn show(ctx: &Context, args: ShowArgs) -> Result<()> {
    let kind = kind_named(&args.kind)?;
    let manifest = load_manifest_or_default(ctx)?;
    let client = connect(&manifest)?;
    let engine = Engine::new(&client);

    let record = find(&engine, kind, &args)?;
    ui::header(&format!("{} {}", kind.name, record.value(kind.id_attribute())));
    for (name, value) in record.iter() {
        ui::kv(name, &value.to_string());
    }
    Ok(())
}

/// Print every existing entity of a kind
pub fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let kind = kind_named(&args.kind)?;
    let manifest = load_manifest_or_default(ctx)?;
    let client = connect(&manifest)?;
    let engine = Engine::new(&client);

    let scope = scope_record(kind, args.project.as_deref());
    let records = engine
        .list(&OperationContext::new(), kind, &scope)
        .with_context(|| format!("Failed to list {}", kind.name))?;
    if records.is_empty() {
        ui::info(&format!("No {} found", kind.name));
        return Ok(());
    }

    let lookup = kind.lookup_attribute();
    for record in &records {
        println!(
            "{}  {}",
            record.value(kind.id_attribute()),
            record.value(lookup).to_string().dimmed()
        );
    }
    ui::dim(&ui::plural(records.len(), kind.name));
    Ok(())
}

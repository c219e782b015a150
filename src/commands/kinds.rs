use anyhow::Result;
use colored::Colorize;
use declarative::{AttrMode, AttributeSpec, Identity, ResourceKind};

use crate::ui;

pub fn run() -> Result<()> {
    for kind in n8nkit::kinds::ALL {
        print_kind(kind);
    }
    Ok(())
}

fn print_kind(kind: &ResourceKind) {
    ui::section(kind.name);
    ui::dim(kind.description);

    let identity = match kind.identity {
        Identity::Single { id, lookup } => format!("{id}, matched by {lookup} after create"),
        Identity::Composite { parts, .. } => parts.join("/"),
    };
    ui::kv("identity", &identity);

    for attr in kind.attributes {
        println!("    {:<12} {}", attr.name, describe(attr).dimmed());
    }
}

fn describe(attr: &AttributeSpec) -> String {
    let mode = match attr.mode {
        AttrMode::Required => "required",
        AttrMode::Optional => "optional",
        AttrMode::Computed => "computed",
        AttrMode::OptionalComputed => "optional, computed",
    };
    let mut out = format!("{} {mode}", attr.ty.name());
    if attr.immutable {
        out.push_str(", forces replacement");
    }
    if attr.remote != attr.name {
        out.push_str(&format!(" (remote: {})", attr.remote));
    }
    out
}

//! Diff computation between declared and tracked records

use crate::kind::{AttributeSpec, ResourceKind};
use crate::record::AttributeRecord;
use crate::types::Action;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Whether `attr` takes part in change detection for this plan
///
/// Unknown plan values and undeclared remote-assigned attributes are the
/// remote side's business.
fn is_compared(attr: &AttributeSpec, plan: &AttributeRecord) -> bool {
    let value = plan.value(attr.name);
    attr.mode.is_declarable()
        && !value.is_unknown()
        && !(value.is_null() && attr.mode.is_computed())
}

/// Declarable attributes whose planned value differs from state
pub fn changed_attributes(
    kind: &ResourceKind,
    plan: &AttributeRecord,
    state: &AttributeRecord,
) -> Vec<&'static str> {
    kind.attributes
        .iter()
        .filter(|a| is_compared(a, plan) && !plan.equals(state, a.name))
        .map(|a| a.name)
        .collect()
}

/// First immutable attribute whose planned value differs from state
pub fn immutable_change(
    kind: &ResourceKind,
    plan: &AttributeRecord,
    state: &AttributeRecord,
) -> Option<AttributeChange> {
    kind.attributes
        .iter()
        .filter(|a| a.immutable && is_compared(a, plan))
        .find(|a| !plan.equals(state, a.name))
        .map(|a| AttributeChange {
            name: a.name.to_string(),
            from: state.get(a.name),
            to: plan.get(a.name),
        })
}

/// One attribute moving from one value to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: String,
    pub from: Value,
    pub to: Value,
}

/// A displayable diff for one resource address
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Address in `kind.name` form
    pub address: String,
    pub kind: String,
    pub action: Action,
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    /// Build the diff for a change; `None` when nothing changes
    ///
    /// `desired` is the planned record with computed attributes marked
    /// unknown, `prior` the tracked state.
    pub fn new(
        address: &str,
        kind: &ResourceKind,
        action: Action,
        desired: Option<&AttributeRecord>,
        prior: Option<&AttributeRecord>,
    ) -> Option<Self> {
        let empty = AttributeRecord::new();
        let changes: Vec<AttributeChange> = match action {
            Action::NoChange => return None,
            Action::Create => {
                let desired = desired.unwrap_or(&empty);
                kind.attributes
                    .iter()
                    .filter(|a| !desired.value(a.name).is_null())
                    .map(|a| AttributeChange {
                        name: a.name.to_string(),
                        from: Value::Null,
                        to: desired.get(a.name),
                    })
                    .collect()
            }
            Action::Delete => {
                let prior = prior.unwrap_or(&empty);
                kind.attributes
                    .iter()
                    .filter(|a| !prior.value(a.name).is_null())
                    .map(|a| AttributeChange {
                        name: a.name.to_string(),
                        from: prior.get(a.name),
                        to: Value::Null,
                    })
                    .collect()
            }
            Action::Update | Action::Replace => {
                let desired = desired.unwrap_or(&empty);
                let prior = prior.unwrap_or(&empty);
                changed_attributes(kind, desired, prior)
                    .into_iter()
                    .map(|name| AttributeChange {
                        name: name.to_string(),
                        from: prior.get(name),
                        to: desired.get(name),
                    })
                    .collect()
            }
        };

        Some(Self {
            address: address.to_string(),
            kind: kind.name.to_string(),
            action,
            changes,
        })
    }

    pub fn is_addition(&self) -> bool {
        self.action == Action::Create
    }

    pub fn is_removal(&self) -> bool {
        self.action == Action::Delete
    }

    pub fn is_replacement(&self) -> bool {
        self.action == Action::Replace
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to update in place
    pub modifications: usize,
    /// Number of resources to delete and recreate
    pub replacements: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                Action::Create => summary.additions += 1,
                Action::Delete => summary.removals += 1,
                Action::Update => summary.modifications += 1,
                Action::Replace => summary.replacements += 1,
                Action::NoChange => {}
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.replacements
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource kind
pub fn group_by_kind(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups.entry(diff.kind.clone()).or_default().push(diff);
    }
    groups
}

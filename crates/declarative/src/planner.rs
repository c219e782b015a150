//! Execution planner - compares declared resources with tracked state

use crate::diff::{self, DiffSummary, ResourceDiff};
use crate::kind::ResourceKind;
use crate::record::AttributeRecord;
use crate::types::Action;
use std::collections::BTreeMap;

/// A resource as declared in a manifest or tracked in state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Address in `kind.name` form
    pub address: String,
    pub kind: &'static ResourceKind,
    pub attributes: AttributeRecord,
}

impl ResourceEntry {
    pub fn new(
        kind: &'static ResourceKind,
        name: &str,
        attributes: AttributeRecord,
    ) -> Self {
        Self {
            address: format!("{}.{name}", kind.name),
            kind,
            attributes,
        }
    }
}

/// One unit of work in a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub address: String,
    pub kind: &'static ResourceKind,
    pub action: Action,
    /// Declared attributes (absent for deletes)
    pub desired: Option<AttributeRecord>,
    /// Tracked state (absent for creates)
    pub prior: Option<AttributeRecord>,
}

impl PlannedChange {
    /// Human-readable description for progress output
    pub fn description(&self) -> String {
        format!("{} {}", self.action, self.address)
    }

    pub fn diff(&self) -> Option<ResourceDiff> {
        let desired = self.desired.as_ref().map(|d| self.kind.plan_record(d));
        ResourceDiff::new(
            &self.address,
            self.kind,
            self.action,
            desired.as_ref(),
            self.prior.as_ref(),
        )
    }
}

/// The ordered changes needed to converge tracked state on declarations
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare declarations with tracked state
    ///
    /// Declared resources come first, in address order, followed by deletes
    /// for tracked resources that are no longer declared.
    pub fn build(declared: &[ResourceEntry], tracked: &[ResourceEntry]) -> Self {
        let tracked: BTreeMap<&str, &ResourceEntry> =
            tracked.iter().map(|t| (t.address.as_str(), t)).collect();
        let declared: BTreeMap<&str, &ResourceEntry> =
            declared.iter().map(|d| (d.address.as_str(), d)).collect();

        let mut changes = Vec::new();
        for (address, entry) in &declared {
            let prior = tracked.get(address).map(|t| t.attributes.clone());
            let action = match &prior {
                None => Action::Create,
                Some(state) => classify(entry.kind, &entry.attributes, state),
            };
            changes.push(PlannedChange {
                address: address.to_string(),
                kind: entry.kind,
                action,
                desired: Some(entry.attributes.clone()),
                prior,
            });
        }

        for (address, entry) in &tracked {
            if !declared.contains_key(address) {
                changes.push(PlannedChange {
                    address: address.to_string(),
                    kind: entry.kind,
                    action: Action::Delete,
                    desired: None,
                    prior: Some(entry.attributes.clone()),
                });
            }
        }

        Self { changes }
    }

    /// Filter plan to only include changes matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedChange) -> bool,
    {
        Self {
            changes: self.changes.into_iter().filter(|c| predicate(c)).collect(),
        }
    }

    /// Filter plan to only include changes matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|c| matches_filter(c, kind.as_deref(), name.as_deref()))
            }
        }
    }

    /// Changes that do something
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action.is_change())
    }

    pub fn diffs(&self) -> Vec<ResourceDiff> {
        self.changes.iter().filter_map(PlannedChange::diff).collect()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(&self.diffs())
    }

    /// Check if the plan changes nothing
    pub fn is_empty(&self) -> bool {
        self.pending().next().is_none()
    }
}

fn classify(kind: &ResourceKind, desired: &AttributeRecord, state: &AttributeRecord) -> Action {
    if diff::immutable_change(kind, desired, state).is_some() {
        Action::Replace
    } else if diff::changed_attributes(kind, desired, state).is_empty() {
        Action::NoChange
    } else {
        Action::Update
    }
}

/// Parse a target string like "kind.name" into (kind, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((kind, name)) => (Some(kind.to_string()), Some(name.to_string())),
    }
}

/// Check if a change matches the filter criteria
fn matches_filter(change: &PlannedChange, kind: Option<&str>, name: Option<&str>) -> bool {
    if let Some(k) = kind
        && change.kind.name != k
    {
        return false;
    }

    if let Some(n) = name
        && change.address.split_once('.').map(|(_, rest)| rest) != Some(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::fixtures::{PROJECT, PROJECT_USER};

    fn project(name: &str) -> ResourceEntry {
        ResourceEntry::new(&PROJECT, name, AttributeRecord::new().with("name", name))
    }

    fn tracked_project(name: &str, id: &str) -> ResourceEntry {
        ResourceEntry::new(
            &PROJECT,
            name,
            AttributeRecord::new()
                .with("id", id)
                .with("name", name)
                .with("type", "team"),
        )
    }

    fn membership(user: &str, role: &str) -> ResourceEntry {
        ResourceEntry::new(
            &PROJECT_USER,
            user,
            AttributeRecord::new()
                .with("project_id", "proj-1")
                .with("user_id", user)
                .with("role", role),
        )
    }

    fn action_of(plan: &ExecutionPlan, address: &str) -> Action {
        plan.changes
            .iter()
            .find(|c| c.address == address)
            .map(|c| c.action)
            .unwrap()
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("project"), (Some("project".to_string()), None));
        assert_eq!(
            parse_target("project.infra"),
            (Some("project".to_string()), Some("infra".to_string()))
        );
    }

    #[test]
    fn test_build_actions() {
        let declared = vec![
            project("infra"),
            project("data"),
            membership("alice", "project:editor"),
        ];
        let tracked = vec![
            tracked_project("infra", "p1"),
            tracked_project("old", "p9"),
            ResourceEntry {
                attributes: membership("alice", "project:viewer")
                    .attributes
                    .with("id", "proj-1/alice"),
                ..membership("alice", "project:viewer")
            },
        ];

        let plan = ExecutionPlan::build(&declared, &tracked);
        assert_eq!(action_of(&plan, "project.infra"), Action::NoChange);
        assert_eq!(action_of(&plan, "project.data"), Action::Create);
        assert_eq!(action_of(&plan, "project.old"), Action::Delete);
        assert_eq!(action_of(&plan, "project_user.alice"), Action::Update);
        assert_eq!(plan.pending().count(), 3);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_immutable_change_plans_replace() {
        let declared = vec![ResourceEntry::new(
            &PROJECT_USER,
            "alice",
            AttributeRecord::new()
                .with("project_id", "proj-2")
                .with("user_id", "alice")
                .with("role", "project:viewer"),
        )];
        let tracked = vec![membership("alice", "project:viewer")];

        let plan = ExecutionPlan::build(&declared, &tracked);
        assert_eq!(action_of(&plan, "project_user.alice"), Action::Replace);
        assert_eq!(plan.summary().replacements, 1);
    }

    #[test]
    fn test_converged_plan_is_empty() {
        let plan = ExecutionPlan::build(&[project("infra")], &[tracked_project("infra", "p1")]);
        assert!(plan.is_empty());
        assert!(plan.diffs().is_empty());
    }

    #[test]
    fn test_filter_by_target() {
        let declared = vec![project("infra"), membership("alice", "project:editor")];
        let plan = ExecutionPlan::build(&declared, &[]);

        let only_projects = plan.clone().filter_by_target(Some("project"));
        assert_eq!(only_projects.changes.len(), 1);

        let one = plan.clone().filter_by_target(Some("project_user.alice"));
        assert_eq!(one.changes[0].address, "project_user.alice");

        assert!(plan.filter_by_target(Some("project.nope")).changes.is_empty());
    }
}

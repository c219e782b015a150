//! Core types for plan execution

use crate::record::AttributeRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What has to happen to one tracked or declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Declared but not tracked
    Create,
    /// Mutable attributes differ
    Update,
    /// An immutable attribute differs; delete then create
    Replace,
    /// Tracked but no longer declared
    Delete,
    NoChange,
}

impl Action {
    /// Single-character marker used in plan output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::NoChange => " ",
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{name}")
    }
}

/// Result of applying one planned change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created; carries the new state
    Created(AttributeRecord),
    /// Resource was updated in place
    Updated(AttributeRecord),
    /// Resource was deleted and created again
    Replaced(AttributeRecord),
    /// Resource was deleted
    Deleted,
    /// Apply failed
    Failed {
        error: String,
        /// The remote side may hold a change that state does not record
        needs_attention: bool,
    },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created(_) | Self::Updated(_) | Self::Replaced(_) | Self::Deleted
        )
    }

    /// The state to persist, if the result produced one
    pub fn state(&self) -> Option<&AttributeRecord> {
        match self {
            Self::Created(r) | Self::Updated(r) | Self::Replaced(r) => Some(r),
            _ => None,
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created(_) => self.created += 1,
            ApplyResult::Updated(_) => self.updated += 1,
            ApplyResult::Replaced(_) => self.replaced += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of resources reconciled in parallel
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{AttributeRecord, ExecuteReport, ResourceEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

const STATE_VERSION: u32 = 1;

/// Tracked state of every resource managed through a manifest
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    pub version: u32,

    /// Last time the state was written
    pub last_updated: DateTime<Utc>,

    /// Tracked resources by address (`kind.name`)
    #[serde(default)]
    pub resources: BTreeMap<String, TrackedResource>,
}

/// State of one tracked resource
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TrackedResource {
    pub kind: String,
    pub attributes: AttributeRecord,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, this build understands up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk through a temporary file and a rename
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content + "\n")
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&TrackedResource> {
        self.resources.get(address)
    }

    pub fn insert(&mut self, address: &str, kind: &str, attributes: AttributeRecord) {
        self.resources.insert(
            address.to_string(),
            TrackedResource {
                kind: kind.to_string(),
                attributes,
            },
        );
    }

    pub fn remove(&mut self, address: &str) -> Option<TrackedResource> {
        self.resources.remove(address)
    }

    /// Tracked resources as planner entries
    pub fn entries(&self) -> Result<Vec<ResourceEntry>> {
        self.resources
            .iter()
            .map(|(address, tracked)| {
                let kind = n8nkit::kinds::by_name(&tracked.kind).with_context(|| {
                    format!("State entry '{address}' has unknown kind '{}'", tracked.kind)
                })?;
                Ok(ResourceEntry {
                    address: address.clone(),
                    kind,
                    attributes: tracked.attributes.clone(),
                })
            })
            .collect()
    }

    /// Record the outcome of an execution
    ///
    /// Successful changes replace or drop the tracked record. Failed and
    /// skipped changes leave it as it was.
    pub fn record_report(&mut self, report: &ExecuteReport) {
        for (change, result) in &report.results {
            if let Some(record) = result.state() {
                self.insert(&change.address, change.kind.name, record.clone());
            } else if matches!(result, declarative::ApplyResult::Deleted) {
                self.remove(&change.address);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Action, ApplyResult, ExecuteSummary, PlannedChange};
    use n8nkit::kinds::PROJECT;

    fn project(id: &str, name: &str) -> AttributeRecord {
        AttributeRecord::new()
            .with("id", id)
            .with("name", name)
            .with("type", "team")
    }

    fn change(address: &str, action: Action) -> PlannedChange {
        PlannedChange {
            address: address.to_string(),
            kind: &PROJECT,
            action,
            desired: None,
            prior: None,
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("none.state.json")).unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n8nform.state.json");

        let mut state = StateFile::default();
        state.insert("project.infra", "project", project("p1", "Infra"));
        state.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.resources, state.resources);

        let entries = loaded.entries().unwrap();
        assert_eq!(entries[0].address, "project.infra");
        assert_eq!(entries[0].kind.name, "project");
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.state.json");
        fs::write(
            &path,
            r#"{"version":99,"last_updated":"2025-01-01T00:00:00Z","resources":{}}"#,
        )
        .unwrap();
        assert!(StateFile::load(&path).is_err());
    }

    #[test]
    fn test_unknown_kind_in_state() {
        let mut state = StateFile::default();
        state.insert("workflow.main", "workflow", AttributeRecord::new());
        assert!(state.entries().is_err());
    }

    #[test]
    fn test_record_report() {
        let mut state = StateFile::default();
        state.insert("project.old", "project", project("p9", "Old"));
        state.insert("project.kept", "project", project("p5", "Kept"));

        let results = vec![
            (
                change("project.new", Action::Create),
                ApplyResult::Created(project("p1", "New")),
            ),
            (change("project.old", Action::Delete), ApplyResult::Deleted),
            (
                change("project.kept", Action::Update),
                ApplyResult::Failed {
                    error: "boom".into(),
                    needs_attention: false,
                },
            ),
        ];
        let mut summary = ExecuteSummary::default();
        for (_, result) in &results {
            summary.add_result(result);
        }
        let report = ExecuteReport { results, summary };

        state.record_report(&report);
        assert!(state.get("project.new").is_some());
        assert!(state.get("project.old").is_none());
        assert_eq!(
            state.get("project.kept").map(|t| t.attributes.get_str("name")),
            Some(Some("Kept"))
        );
    }
}

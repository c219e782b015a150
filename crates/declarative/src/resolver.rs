//! Identity resolution against list results
//!
//! Several endpoints can only be searched by listing. The resolver picks the
//! single entity a descriptor points at, or reports that none matches.

use crate::error::{Error, Result};
use crate::remote::RemoteEntity;
use crate::value::Value;

/// One match criterion: a remote field and the value it must hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCandidate {
    /// Field name in remote entities
    pub field: String,
    pub value: Value,
}

/// Ordered match criteria, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDescriptor {
    kind: String,
    candidates: Vec<IdentityCandidate>,
}

impl IdentityDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            candidates: Vec::new(),
        }
    }

    /// Append a candidate with lower priority than the existing ones
    pub fn candidate(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.candidates.push(IdentityCandidate {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn candidates(&self) -> &[IdentityCandidate] {
        &self.candidates
    }

    /// The candidate that decides matches: the first one with a known value
    pub fn decisive(&self) -> Option<&IdentityCandidate> {
        self.candidates.iter().find(|c| c.value.is_known())
    }

    /// Fail with `MissingIdentifier` unless some candidate is known
    pub fn require(&self) -> Result<&IdentityCandidate> {
        self.decisive().ok_or_else(|| Error::MissingIdentifier {
            kind: self.kind.clone(),
            attributes: self.candidates.iter().map(|c| c.field.clone()).collect(),
        })
    }
}

/// Find the entity matching a descriptor
///
/// Only the highest-priority known candidate is compared; lower-priority
/// candidates never decide a match. The list is scanned once and the first
/// match in input order wins, duplicates are not reported.
pub fn resolve<'a>(
    entities: &'a [RemoteEntity],
    descriptor: &IdentityDescriptor,
) -> Result<Option<&'a RemoteEntity>> {
    let candidate = descriptor.require()?;

    Ok(entities
        .iter()
        .find(|entity| matches_candidate(entity, candidate)))
}

fn matches_candidate(entity: &RemoteEntity, candidate: &IdentityCandidate) -> bool {
    let Some(field) = entity.get(&candidate.field) else {
        return false;
    };
    if field.is_null() {
        return false;
    }
    if candidate.value.as_json() == Some(field) {
        return true;
    }
    // Ids may come back as numbers while records hold strings
    match (
        candidate.value.as_identifier(),
        Value::from(field.clone()).as_identifier(),
    ) {
        (Some(want), Some(have)) => want == have,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: serde_json::Value) -> RemoteEntity {
        RemoteEntity::from_json(value)
    }

    fn projects() -> Vec<RemoteEntity> {
        vec![
            entity(json!({"id": "p1", "name": "Infra"})),
            entity(json!({"id": "p2", "name": "Data"})),
            entity(json!({"id": "p3", "name": "Web"})),
        ]
    }

    #[test]
    fn test_single_match_found_at_any_position() {
        let list = projects();
        for (i, id) in ["p1", "p2", "p3"].iter().enumerate() {
            let d = IdentityDescriptor::new("project").candidate("id", *id);
            let found = resolve(&list, &d).unwrap().unwrap();
            assert_eq!(found, &list[i]);
        }
    }

    #[test]
    fn test_no_match_is_none() {
        let d = IdentityDescriptor::new("project").candidate("name", "Infra Team");
        assert!(resolve(&projects(), &d).unwrap().is_none());
        assert!(resolve(&[], &d).unwrap().is_none());
    }

    #[test]
    fn test_all_null_candidates_fail_without_list() {
        let d = IdentityDescriptor::new("project")
            .candidate("id", Value::Null)
            .candidate("name", Value::Unknown);
        let err = resolve(&projects(), &d).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingIdentifier { ref attributes, .. } if attributes == &["id", "name"]
        ));

        let empty = IdentityDescriptor::new("project");
        assert!(resolve(&[], &empty).is_err());
    }

    #[test]
    fn test_higher_priority_candidate_decides() {
        // id says p2, name would have matched p1
        let d = IdentityDescriptor::new("project")
            .candidate("id", "p2")
            .candidate("name", "Infra");
        let list = projects();
        let found = resolve(&list, &d).unwrap().unwrap();
        assert_eq!(found.get_str("id"), Some("p2"));

        // An id that matches nothing does not fall back to the name
        let d = IdentityDescriptor::new("project")
            .candidate("id", "p9")
            .candidate("name", "Infra");
        assert!(resolve(&projects(), &d).unwrap().is_none());
    }

    #[test]
    fn test_null_candidate_skipped_for_priority() {
        let d = IdentityDescriptor::new("project")
            .candidate("id", Value::Null)
            .candidate("name", "Web");
        let list = projects();
        let found = resolve(&list, &d).unwrap().unwrap();
        assert_eq!(found.get_str("id"), Some("p3"));
    }

    #[test]
    fn test_absent_or_null_field_never_matches() {
        let list = vec![
            entity(json!({"id": "p1"})),
            entity(json!({"id": "p2", "name": null})),
        ];
        let d = IdentityDescriptor::new("project").candidate("name", "p1");
        assert!(resolve(&list, &d).unwrap().is_none());
    }

    #[test]
    fn test_duplicates_return_first() {
        let list = vec![
            entity(json!({"id": "a", "name": "Infra"})),
            entity(json!({"id": "b", "name": "Infra"})),
        ];
        let d = IdentityDescriptor::new("project").candidate("name", "Infra");
        assert_eq!(resolve(&list, &d).unwrap().unwrap().get_str("id"), Some("a"));
    }

    #[test]
    fn test_numeric_ids_match_strings() {
        let list = vec![entity(json!({"id": 7, "name": "ops"}))];
        let d = IdentityDescriptor::new("tag").candidate("id", "7");
        assert!(resolve(&list, &d).unwrap().is_some());
    }
}

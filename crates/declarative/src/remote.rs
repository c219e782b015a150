//! Remote operations interface
//!
//! The engine talks to the backend only through [`RemoteOperations`]. An
//! implementation owns transport, authentication, retries, and pagination;
//! the engine owns identity resolution and the reconciliation protocol.
//!
//! # Testing
//!
//! Use [`MockRemote`] for testing without network access:
//!
//! ```ignore
//! let mock = MockRemote::new();
//! mock.set_entities("project", vec![RemoteEntity::from_json(json!({"id": "p1", "name": "Infra"}))]);
//! let engine = Engine::new(&mock);
//! ```

use crate::composite;
use crate::context::OperationContext;
use crate::kind::{Identity, ResourceKind};
use crate::record::AttributeRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Failures reported by a [`RemoteOperations`] implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body or reason.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The backend answered with something unusable.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// The adapter does not know how to handle this kind.
    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),
}

impl RemoteError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Whether the error is a 404 answer.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { code: 404, .. })
    }
}

/// Remote operation names, used in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// An entity as returned by a list call
///
/// Opaque to the engine apart from identity fields; all fields are copied
/// back into records on a match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteEntity {
    fields: BTreeMap<String, serde_json::Value>,
}

impl RemoteEntity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object (non-objects give an empty entity)
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self {
                fields: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(serde_json::Value::as_str)
    }

    /// Follow a dotted path through nested objects
    pub fn lookup(&self, path: &str) -> Option<&serde_json::Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Filters for list calls, keyed by attribute name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListScope {
    filters: BTreeMap<String, String>,
}

impl ListScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.filters.insert(attribute.into(), value.into());
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.filters.get(attribute).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Narrow interface the engine needs from the backend
pub trait RemoteOperations: Send + Sync {
    /// List every entity of a kind within `scope`
    fn list_entities(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &ListScope,
    ) -> Result<Vec<RemoteEntity>, RemoteError>;

    /// Create an entity
    ///
    /// `Ok(None)` means the write succeeded without a usable response body.
    fn write_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        attributes: &AttributeRecord,
    ) -> Result<Option<RemoteEntity>, RemoteError>;

    /// Write changed attributes of an existing entity
    fn update_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
        changed: &AttributeRecord,
    ) -> Result<Option<RemoteEntity>, RemoteError>;

    /// Delete an entity; deleting an absent entity succeeds
    fn delete_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
    ) -> Result<(), RemoteError>;
}

/// A call recorded by [`MockRemote`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    List {
        kind: String,
        scope: ListScope,
    },
    Write {
        kind: String,
        attributes: AttributeRecord,
    },
    Update {
        kind: String,
        id: String,
        changed: AttributeRecord,
    },
    Delete {
        kind: String,
        id: String,
    },
}

impl RecordedCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::List { .. } => Operation::List,
            Self::Write { .. } => Operation::Create,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    entities: HashMap<String, Vec<RemoteEntity>>,
    calls: Vec<RecordedCall>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    body_kinds: HashSet<String>,
    next_id: u64,
}

/// In-memory backend for testing without network access
///
/// By default writes behave like the fire-and-forget endpoints: they store
/// the entity (with a generated id) and return no body.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
    materialize: bool,
}

impl MockRemote {
    /// Mock whose writes are recorded but do not change the entity lists
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose writes are applied to the entity lists
    pub fn simulated() -> Self {
        Self {
            state: Arc::default(),
            materialize: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the calls it recorded
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the entity list of a kind
    pub fn set_entities(&self, kind: &str, entities: Vec<RemoteEntity>) {
        self.lock().entities.insert(kind.to_string(), entities);
    }

    /// Current entity list of a kind
    pub fn entities(&self, kind: &str) -> Vec<RemoteEntity> {
        self.lock().entities.get(kind).cloned().unwrap_or_default()
    }

    /// Make writes for `kind` return the stored entity as response body
    pub fn respond_with_body(&self, kind: &str) {
        self.lock().body_kinds.insert(kind.to_string());
    }

    /// Fail the next call of `operation` with `error`
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls made for `operation`
    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Number of calls that write to the backend
    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() != Operation::List)
            .count()
    }

    fn begin(
        &self,
        ctx: &OperationContext,
        operation: Operation,
        call: RecordedCall,
    ) -> Result<MutexGuard<'_, MockState>, RemoteError> {
        ctx.checkpoint()?;
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(err) = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state)
    }

    fn to_entity(kind: &ResourceKind, attributes: &AttributeRecord) -> RemoteEntity {
        let mut entity = RemoteEntity::new();
        for (name, value) in attributes.iter() {
            if let Some(json) = value.as_json() {
                entity.insert(kind.remote_field(name), json.clone());
            }
        }
        entity
    }

    fn matches_scope(kind: &ResourceKind, entity: &RemoteEntity, scope: &ListScope) -> bool {
        scope
            .iter()
            .all(|(attr, value)| entity.get_str(kind.remote_field(attr)) == Some(value))
    }

    fn position(kind: &ResourceKind, entities: &[RemoteEntity], id: &str) -> Option<usize> {
        match kind.identity {
            Identity::Single { id: id_attr, .. } => entities
                .iter()
                .position(|e| e.get_str(kind.remote_field(id_attr)) == Some(id)),
            Identity::Composite { parts, .. } => {
                let values = composite::decode(id, parts.len()).ok()?;
                entities.iter().position(|e| {
                    parts
                        .iter()
                        .zip(&values)
                        .all(|(attr, v)| e.get_str(kind.remote_field(attr)) == Some(v.as_str()))
                })
            }
        }
    }
}

impl RemoteOperations for MockRemote {
    fn list_entities(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &ListScope,
    ) -> Result<Vec<RemoteEntity>, RemoteError> {
        let call = RecordedCall::List {
            kind: kind.name.to_string(),
            scope: scope.clone(),
        };
        let state = self.begin(ctx, Operation::List, call)?;
        Ok(state
            .entities
            .get(kind.name)
            .map(|all| {
                all.iter()
                    .filter(|e| Self::matches_scope(kind, e, scope))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn write_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        attributes: &AttributeRecord,
    ) -> Result<Option<RemoteEntity>, RemoteError> {
        let call = RecordedCall::Write {
            kind: kind.name.to_string(),
            attributes: attributes.clone(),
        };
        let mut state = self.begin(ctx, Operation::Create, call)?;

        let mut entity = Self::to_entity(kind, attributes);
        if let Identity::Single { id, .. } = kind.identity {
            state.next_id += 1;
            let generated = format!("{}-{}", kind.name, state.next_id);
            entity.insert(kind.remote_field(id), generated.into());
        }

        if self.materialize {
            state
                .entities
                .entry(kind.name.to_string())
                .or_default()
                .push(entity.clone());
        }

        Ok(state.body_kinds.contains(kind.name).then_some(entity))
    }

    fn update_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
        changed: &AttributeRecord,
    ) -> Result<Option<RemoteEntity>, RemoteError> {
        let call = RecordedCall::Update {
            kind: kind.name.to_string(),
            id: id.to_string(),
            changed: changed.clone(),
        };
        let mut state = self.begin(ctx, Operation::Update, call)?;
        let respond = state.body_kinds.contains(kind.name);
        let materialize = self.materialize;

        let entities = state.entities.entry(kind.name.to_string()).or_default();
        let Some(pos) = Self::position(kind, entities, id) else {
            return Err(RemoteError::Status {
                code: 404,
                message: format!("{} {id} not found", kind.name),
            });
        };

        let mut updated = entities[pos].clone();
        for (field, value) in Self::to_entity(kind, changed).fields() {
            updated.insert(field, value.clone());
        }
        if materialize {
            entities[pos] = updated.clone();
        }

        Ok(respond.then_some(updated))
    }

    fn delete_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
    ) -> Result<(), RemoteError> {
        let call = RecordedCall::Delete {
            kind: kind.name.to_string(),
            id: id.to_string(),
        };
        let mut state = self.begin(ctx, Operation::Delete, call)?;
        if self.materialize
            && let Some(entities) = state.entities.get_mut(kind.name)
            && let Some(pos) = Self::position(kind, entities, id)
        {
            entities.remove(pos);
        }
        Ok(())
    }
}

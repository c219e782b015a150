//! Reconciliation engine
//!
//! The engine turns declared records into remote changes and remote entities
//! back into records. It holds no state between calls: every operation is an
//! independent unit of work against the [`RemoteOperations`] it was built
//! with, so different resources may be reconciled concurrently. Operations on
//! one tracked resource must be serialized by the caller.
//!
//! Several endpoints accept writes without returning the written entity. In
//! that case the engine lists the kind and locates the new entity by its
//! human-meaningful key (never by id, which the client does not have yet).
//! Reads always locate by the durable id so renames are not mistaken for
//! drift.

use crate::composite;
use crate::context::OperationContext;
use crate::diff;
use crate::error::{Error, Result};
use crate::kind::{Identity, ResourceKind};
use crate::record::AttributeRecord;
use crate::remote::{ListScope, Operation, RemoteEntity, RemoteError, RemoteOperations};
use crate::resolver::{self, IdentityDescriptor};
use crate::value::Value;

/// A tracked entity that no longer exists remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub kind: String,
    pub id: String,
}

impl Drift {
    /// Convert into an error for callers that cannot accept removal
    pub fn into_error(self) -> Error {
        Error::NotFoundDuringRead {
            kind: self.kind,
            id: self.id,
        }
    }
}

/// Outcome of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The entity exists; carries the refreshed record
    Present(AttributeRecord),
    /// The entity was deleted out-of-band; drop it from tracked state
    Removed(Drift),
}

/// Stateless reconciliation engine
#[derive(Clone, Copy)]
pub struct Engine<'a> {
    remote: &'a dyn RemoteOperations,
}

impl std::fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl<'a> Engine<'a> {
    pub fn new(remote: &'a dyn RemoteOperations) -> Self {
        Self { remote }
    }

    /// Create the entity described by `plan` and return its state
    pub fn create(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        plan: &AttributeRecord,
    ) -> Result<AttributeRecord> {
        kind.validate_plan(plan)?;

        let composite_id = match kind.identity {
            Identity::Composite { parts, .. } => {
                let values = parts
                    .iter()
                    .map(|p| required_identifier(kind, plan, p))
                    .collect::<Result<Vec<_>>>()?;
                Some(composite::encode(&values)?)
            }
            Identity::Single { .. } => None,
        };

        // Built before the write so a missing key never reaches the network
        let lookup = kind.lookup_attribute();
        let descriptor = IdentityDescriptor::new(kind.name)
            .candidate(kind.remote_field(lookup), plan.get(lookup));
        descriptor.require()?;
        let key = plan
            .get_str(lookup)
            .map_or_else(|| plan.get(lookup).to_string(), str::to_string);

        let writable = kind.writable_subset(plan);
        log::debug!("{}: writing {} attributes", kind.name, writable.len());
        let response = self
            .remote
            .write_entity(ctx, kind, &writable)
            .map_err(|e| Error::remote(kind.name, Operation::Create.as_str(), e))?;

        let entity = match response.filter(|e| carries_identity(kind, e)) {
            Some(entity) => entity,
            None => {
                log::debug!("{}: write returned no entity, resolving {key} by list", kind.name);
                let scope = list_scope(kind, plan);
                self.locate(ctx, kind, &scope, &descriptor)
                    .map_err(|source| Error::PostCreateVerificationFailed {
                        kind: kind.name.to_string(),
                        key: key.clone(),
                        source,
                    })?
            }
        };

        let mut state = merge(kind, &kind.plan_record(plan), &entity);
        if let Some(id) = composite_id {
            state.set(kind.id_attribute(), id);
        }
        log::info!("Created {} {}", kind.name, state.value(kind.id_attribute()));
        Ok(state)
    }

    /// Refresh a tracked record from the remote list
    pub fn read(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        state: &AttributeRecord,
    ) -> Result<ReadOutcome> {
        let (id, base) = self.identify(kind, state)?;
        let descriptor = id_descriptor(kind, &base, &id);
        descriptor.require()?;

        let scope = list_scope(kind, &base);
        log::debug!("{}: reading {id}", kind.name);
        let entities = self
            .remote
            .list_entities(ctx, kind, &scope)
            .map_err(|e| Error::remote(kind.name, Operation::List.as_str(), e))?;

        match resolver::resolve(&entities, &descriptor)? {
            Some(entity) => {
                let mut refreshed = merge(kind, &base, entity);
                refreshed.set(kind.id_attribute(), id);
                Ok(ReadOutcome::Present(refreshed))
            }
            None => {
                log::warn!("{} {id} no longer exists remotely", kind.name);
                Ok(ReadOutcome::Removed(Drift {
                    kind: kind.name.to_string(),
                    id,
                }))
            }
        }
    }

    /// Bring a tracked entity in line with `plan`
    ///
    /// Issues no remote call when nothing differs, and at most one update
    /// call otherwise.
    pub fn update(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        plan: &AttributeRecord,
        state: &AttributeRecord,
    ) -> Result<AttributeRecord> {
        kind.validate_values(plan)?;

        if let Some(change) = diff::immutable_change(kind, plan, state) {
            return Err(Error::ImmutableFieldChanged {
                kind: kind.name.to_string(),
                attribute: change.name,
                from: change.from,
                to: change.to,
            });
        }

        let changed = diff::changed_attributes(kind, plan, state);
        if changed.is_empty() {
            log::debug!("{}: no changes", kind.name);
            return Ok(state.clone());
        }

        let (id, base) = self.identify(kind, state)?;

        let mut body = AttributeRecord::new();
        for name in &changed {
            body.set(*name, plan.get(name));
        }
        for attr in kind.attributes.iter().filter(|a| a.sent_on_update) {
            if let v @ Value::Known(_) = plan.get(attr.name) {
                body.set(attr.name, v);
            }
        }

        log::debug!("{}: updating {id} ({})", kind.name, changed.join(", "));
        let response = self
            .remote
            .update_entity(ctx, kind, &id, &body)
            .map_err(|e| Error::remote(kind.name, Operation::Update.as_str(), e))?;

        let mut next = base;
        for name in &changed {
            next.set(*name, plan.get(name));
        }

        let entity = match response.filter(|e| carries_identity(kind, e)) {
            Some(entity) => entity,
            None => {
                let descriptor = id_descriptor(kind, &next, &id);
                let scope = list_scope(kind, &next);
                self.locate(ctx, kind, &scope, &descriptor)
                    .map_err(|source| Error::PostUpdateVerificationFailed {
                        kind: kind.name.to_string(),
                        id: id.clone(),
                        source,
                    })?
            }
        };

        let mut next = merge(kind, &next, &entity);
        next.set(kind.id_attribute(), id);
        log::info!("Updated {} {}", kind.name, next.value(kind.id_attribute()));
        Ok(next)
    }

    /// Delete a tracked entity; absent entities count as deleted
    pub fn delete(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        state: &AttributeRecord,
    ) -> Result<()> {
        let (id, _) = self.identify(kind, state)?;
        self.remote
            .delete_entity(ctx, kind, &id)
            .map_err(|e| Error::remote(kind.name, Operation::Delete.as_str(), e))?;
        log::info!("Deleted {} {id}", kind.name);
        Ok(())
    }

    /// Seed record for importing an existing entity by its external id
    ///
    /// No remote call is made; follow with [`read`](Self::read) to populate
    /// the remaining attributes.
    pub fn import_state(&self, kind: &ResourceKind, external_id: &str) -> Result<AttributeRecord> {
        if external_id.is_empty() {
            return Err(Error::MissingIdentifier {
                kind: kind.name.to_string(),
                attributes: vec![kind.id_attribute().to_string()],
            });
        }

        let mut seed = kind.seed_record();
        if let Identity::Composite { parts, .. } = kind.identity {
            let values = composite::decode(external_id, parts.len())?;
            for (attr, value) in parts.iter().zip(values) {
                seed.set(*attr, value);
            }
        }
        seed.set(kind.id_attribute(), external_id);
        Ok(seed)
    }

    /// Import an existing entity: seed from the external id, then read
    pub fn import(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        external_id: &str,
    ) -> Result<AttributeRecord> {
        let seed = self.import_state(kind, external_id)?;
        match self.read(ctx, kind, &seed)? {
            ReadOutcome::Present(record) => Ok(record),
            ReadOutcome::Removed(drift) => Err(drift.into_error()),
        }
    }

    /// Find one existing entity by id or by its human-meaningful key
    ///
    /// The id takes priority; the key is only compared when no id is given.
    /// `scope` carries the scope attributes of scoped kinds. For composite
    /// kinds the id is the full composite id.
    pub fn lookup(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &AttributeRecord,
        id: Option<&str>,
        key: Option<&str>,
    ) -> Result<AttributeRecord> {
        let mut base = self.scoped_seed(kind, scope)?;
        let id_value = match (kind.identity, id) {
            (Identity::Composite { parts, lookup, .. }, Some(id)) => {
                let values = composite::decode(id, parts.len())?;
                for (attr, value) in parts.iter().zip(values) {
                    if kind.is_scope(attr) && base.get_str(attr) != Some(value.as_str()) {
                        return Err(Error::InvalidPlan {
                            kind: kind.name.to_string(),
                            message: format!("{id} does not belong to the given {attr}"),
                        });
                    }
                    base.set(*attr, value);
                }
                base.get(lookup)
            }
            (_, id) => id.map_or(Value::Null, Value::from),
        };
        let id_field = match kind.identity {
            Identity::Single { id, .. } => kind.remote_field(id),
            Identity::Composite { lookup, .. } => kind.remote_field(lookup),
        };
        let lookup_field = kind.remote_field(kind.lookup_attribute());
        let descriptor = IdentityDescriptor::new(kind.name)
            .candidate(id_field, id_value)
            .candidate(lookup_field, key.map_or(Value::Null, Value::from));
        let decisive = descriptor.require()?;
        let query = format!("{} = {}", decisive.field, decisive.value);

        let entities = self
            .remote
            .list_entities(ctx, kind, &list_scope(kind, &base))
            .map_err(|e| Error::remote(kind.name, Operation::List.as_str(), e))?;
        match resolver::resolve(&entities, &descriptor)? {
            Some(entity) => materialize(kind, &base, entity),
            None => Err(Error::NoMatch {
                kind: kind.name.to_string(),
                query,
            }),
        }
    }

    /// Every existing entity of a kind within `scope`
    pub fn list(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &AttributeRecord,
    ) -> Result<Vec<AttributeRecord>> {
        let base = self.scoped_seed(kind, scope)?;
        let entities = self
            .remote
            .list_entities(ctx, kind, &list_scope(kind, &base))
            .map_err(|e| Error::remote(kind.name, Operation::List.as_str(), e))?;
        log::debug!("{}: listed {} entities", kind.name, entities.len());
        entities
            .iter()
            .map(|entity| materialize(kind, &base, entity))
            .collect()
    }

    /// Seed record carrying the scope attributes every list call needs
    fn scoped_seed(&self, kind: &ResourceKind, scope: &AttributeRecord) -> Result<AttributeRecord> {
        let mut seed = kind.seed_record();
        for attr in kind.scope {
            seed.set(*attr, required_identifier(kind, scope, attr)?);
        }
        Ok(seed)
    }

    /// Durable id of a tracked record, plus the record with composite parts
    /// restored from the id
    fn identify(
        &self,
        kind: &ResourceKind,
        state: &AttributeRecord,
    ) -> Result<(String, AttributeRecord)> {
        let id_attr = kind.id_attribute();
        let Some(id) = state.value(id_attr).as_identifier().filter(|id| !id.is_empty()) else {
            return Err(Error::MissingIdentifier {
                kind: kind.name.to_string(),
                attributes: vec![id_attr.to_string()],
            });
        };

        let mut base = state.clone();
        if let Identity::Composite { parts, .. } = kind.identity {
            let values = composite::decode(&id, parts.len())?;
            for (attr, value) in parts.iter().zip(values) {
                base.set(*attr, value);
            }
        }
        Ok((id, base))
    }

    /// List within `scope` and resolve; `Err(None)` means not found
    fn locate(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &ListScope,
        descriptor: &IdentityDescriptor,
    ) -> std::result::Result<RemoteEntity, Option<RemoteError>> {
        ctx.checkpoint().map_err(Some)?;
        let entities = self.remote.list_entities(ctx, kind, scope).map_err(Some)?;
        // Descriptors reaching here have a known candidate
        match resolver::resolve(&entities, descriptor) {
            Ok(Some(entity)) => Ok(entity.clone()),
            _ => Err(None),
        }
    }
}

/// Descriptor that locates a tracked entity by its durable identity
fn id_descriptor(kind: &ResourceKind, record: &AttributeRecord, id: &str) -> IdentityDescriptor {
    match kind.identity {
        Identity::Single { id: id_attr, .. } => {
            IdentityDescriptor::new(kind.name).candidate(kind.remote_field(id_attr), id)
        }
        // The remote side has no composite ids; match the non-scope part
        Identity::Composite { lookup, .. } => IdentityDescriptor::new(kind.name)
            .candidate(kind.remote_field(lookup), record.get(lookup)),
    }
}

fn list_scope(kind: &ResourceKind, record: &AttributeRecord) -> ListScope {
    let mut scope = ListScope::new();
    for attr in kind.scope {
        if let Some(value) = record.value(attr).as_identifier() {
            scope.insert(*attr, value);
        }
    }
    scope
}

fn required_identifier(kind: &ResourceKind, record: &AttributeRecord, attr: &str) -> Result<String> {
    record
        .value(attr)
        .as_identifier()
        .ok_or_else(|| Error::MissingIdentifier {
            kind: kind.name.to_string(),
            attributes: vec![attr.to_string()],
        })
}

/// Whether a write response is complete enough to stand in for a list lookup
fn carries_identity(kind: &ResourceKind, entity: &RemoteEntity) -> bool {
    match kind.identity {
        Identity::Single { id, .. } => entity
            .get(kind.remote_field(id))
            .is_some_and(|v| !v.is_null()),
        Identity::Composite { .. } => false,
    }
}

/// Record for a listed entity, with the composite id rebuilt from its parts
fn materialize(
    kind: &ResourceKind,
    base: &AttributeRecord,
    entity: &RemoteEntity,
) -> Result<AttributeRecord> {
    let mut record = merge(kind, base, entity);
    if let Identity::Composite { parts, .. } = kind.identity {
        let values = parts
            .iter()
            .map(|p| required_identifier(kind, &record, p))
            .collect::<Result<Vec<_>>>()?;
        record.set(kind.id_attribute(), composite::encode(&values)?);
    }
    Ok(record)
}

/// Copy remote fields into a record
///
/// Scope attributes and composite ids are owned by the client and never
/// overwritten. Values still unknown afterwards become null.
pub fn merge(kind: &ResourceKind, base: &AttributeRecord, entity: &RemoteEntity) -> AttributeRecord {
    let mut out = base.clone();
    for attr in kind.attributes {
        if kind.is_scope(attr.name) || (kind.is_composite() && attr.name == kind.id_attribute()) {
            continue;
        }
        if let Some(value) = entity.lookup(attr.read) {
            out.set(attr.name, Value::from(value.clone()));
        }
    }
    for attr in kind.attributes {
        if out.value(attr.name).is_unknown() {
            out.set(attr.name, Value::Null);
        }
    }
    out
}

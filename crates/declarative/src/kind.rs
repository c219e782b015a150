//! Resource kind schemas
//!
//! A [`ResourceKind`] is the fixed schema shared by every record of one kind:
//! attribute names, type tags, which attributes the remote side computes,
//! and which attributes carry identity.

use crate::error::{Error, Result};
use crate::record::AttributeRecord;
use crate::value::Value;

/// Type tag of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Bool,
    Number,
}

impl AttrType {
    /// Check a known JSON value against this type tag
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Number => "number",
        }
    }
}

/// Who provides an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrMode {
    /// Must be declared
    Required,
    /// May be declared
    Optional,
    /// Assigned by the remote side, never declared
    Computed,
    /// May be declared, otherwise assigned by the remote side
    OptionalComputed,
}

impl AttrMode {
    /// Whether the attribute may appear in a declaration
    pub fn is_declarable(&self) -> bool {
        !matches!(self, Self::Computed)
    }

    /// Whether the remote side may fill the attribute in
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }
}

/// Schema entry for one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Attribute name in records and manifests
    pub name: &'static str,
    /// Field name in request bodies
    pub remote: &'static str,
    /// Dotted path of the field in remote entities, e.g. `project.id`
    pub read: &'static str,
    pub ty: AttrType,
    pub mode: AttrMode,
    /// Changing the attribute requires delete and recreate
    pub immutable: bool,
    /// The remote side expects the attribute in every update body
    pub sent_on_update: bool,
}

impl AttributeSpec {
    /// A string attribute whose remote field has the same name
    pub const fn string(name: &'static str, mode: AttrMode) -> Self {
        Self {
            name,
            remote: name,
            read: name,
            ty: AttrType::String,
            mode,
            immutable: false,
            sent_on_update: false,
        }
    }

    pub const fn typed(name: &'static str, ty: AttrType, mode: AttrMode) -> Self {
        Self {
            name,
            remote: name,
            read: name,
            ty,
            mode,
            immutable: false,
            sent_on_update: false,
        }
    }

    /// Use a different field name on the remote side
    pub const fn remote(mut self, remote: &'static str) -> Self {
        self.remote = remote;
        self.read = remote;
        self
    }

    /// Read the value from a nested field of remote entities
    pub const fn read_from(mut self, path: &'static str) -> Self {
        self.read = path;
        self
    }

    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub const fn sent_on_update(mut self) -> Self {
        self.sent_on_update = true;
        self
    }
}

/// How entities of a kind are identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// The remote side assigns a durable id
    Single {
        /// Attribute holding the durable id
        id: &'static str,
        /// Human-meaningful unique attribute, used to find a fresh entity
        lookup: &'static str,
    },
    /// A relation between parents, identified by a composite key
    Composite {
        /// Attribute holding the encoded composite key
        id: &'static str,
        /// Ordered attributes encoded into the key
        parts: &'static [&'static str],
        /// Part attribute matched against list entries
        lookup: &'static str,
    },
}

/// Static description of a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    /// Kind name, e.g. "project"
    pub name: &'static str,
    pub description: &'static str,
    pub attributes: &'static [AttributeSpec],
    pub identity: Identity,
    /// Attributes passed to list calls as filters
    pub scope: &'static [&'static str],
}

impl ResourceKind {
    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&'static AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attribute holding the durable (or composite) id
    pub fn id_attribute(&self) -> &'static str {
        match self.identity {
            Identity::Single { id, .. } | Identity::Composite { id, .. } => id,
        }
    }

    /// Attribute used to locate a freshly written entity
    pub fn lookup_attribute(&self) -> &'static str {
        match self.identity {
            Identity::Single { lookup, .. } | Identity::Composite { lookup, .. } => lookup,
        }
    }

    /// Number of parts in the composite id (1 for single-identity kinds)
    pub fn arity(&self) -> usize {
        match self.identity {
            Identity::Single { .. } => 1,
            Identity::Composite { parts, .. } => parts.len(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.identity, Identity::Composite { .. })
    }

    /// Remote field name for an attribute (the attribute name when undeclared)
    pub fn remote_field<'a>(&self, name: &'a str) -> &'a str {
        self.attribute(name).map_or(name, |a| a.remote)
    }

    pub fn is_scope(&self, name: &str) -> bool {
        self.scope.contains(&name)
    }

    /// Record with every attribute set to `Null`
    pub fn seed_record(&self) -> AttributeRecord {
        self.attributes
            .iter()
            .map(|a| (a.name, Value::Null))
            .collect()
    }

    /// Fill in a declaration for planning: undeclared computed attributes
    /// become `Unknown`, undeclared optional ones `Null`.
    pub fn plan_record(&self, declared: &AttributeRecord) -> AttributeRecord {
        let mut plan = AttributeRecord::new();
        for attr in self.attributes {
            let value = declared.get(attr.name);
            let value = if value.is_null() && attr.mode.is_computed() {
                Value::Unknown
            } else {
                value
            };
            plan.set(attr.name, value);
        }
        plan
    }

    /// Validate a declaration against the schema
    pub fn validate_plan(&self, plan: &AttributeRecord) -> Result<()> {
        for (name, value) in plan.iter() {
            if value.is_known() && self.attribute(name).is_some_and(|a| !a.mode.is_declarable()) {
                return Err(self.invalid(format!("'{name}' is computed and cannot be set")));
            }
        }
        self.validate_values(plan)
    }

    /// Check names, type tags and required attributes, allowing computed
    /// values (as carried by a record read back from state)
    pub fn validate_values(&self, plan: &AttributeRecord) -> Result<()> {
        for (name, value) in plan.iter() {
            let Some(attr) = self.attribute(name) else {
                return Err(self.invalid(format!("unknown attribute '{name}'")));
            };
            if let Value::Known(json) = value {
                if !attr.ty.accepts(json) {
                    return Err(self.invalid(format!(
                        "'{name}' must be a {}, got {json}",
                        attr.ty.name()
                    )));
                }
            }
        }

        for attr in self.attributes {
            if attr.mode == AttrMode::Required && plan.value(attr.name).is_null() {
                return Err(self.invalid(format!("missing required attribute '{}'", attr.name)));
            }
        }

        Ok(())
    }

    /// The declared, known attributes of a plan that are sent on create
    pub fn writable_subset(&self, plan: &AttributeRecord) -> AttributeRecord {
        self.attributes
            .iter()
            .filter(|a| a.mode.is_declarable())
            .filter_map(|a| match plan.get(a.name) {
                v @ Value::Known(_) => Some((a.name, v)),
                _ => None,
            })
            .collect()
    }

    fn invalid(&self, message: String) -> Error {
        Error::InvalidPlan {
            kind: self.name.to_string(),
            message,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const PROJECT: ResourceKind = ResourceKind {
        name: "project",
        description: "Project",
        attributes: &[
            AttributeSpec::string("id", AttrMode::Computed),
            AttributeSpec::string("name", AttrMode::Required),
            AttributeSpec::string("type", AttrMode::Computed),
        ],
        identity: Identity::Single {
            id: "id",
            lookup: "name",
        },
        scope: &[],
    };

    pub const PROJECT_USER: ResourceKind = ResourceKind {
        name: "project_user",
        description: "Project membership",
        attributes: &[
            AttributeSpec::string("id", AttrMode::Computed),
            AttributeSpec::string("project_id", AttrMode::Required)
                .remote("projectId")
                .immutable(),
            AttributeSpec::string("user_id", AttrMode::Required)
                .remote("id")
                .immutable(),
            AttributeSpec::string("role", AttrMode::Required),
        ],
        identity: Identity::Composite {
            id: "id",
            parts: &["project_id", "user_id"],
            lookup: "user_id",
        },
        scope: &["project_id"],
    };

    pub const VARIABLE: ResourceKind = ResourceKind {
        name: "variable",
        description: "Variable",
        attributes: &[
            AttributeSpec::string("id", AttrMode::Computed),
            AttributeSpec::string("key", AttrMode::Required).sent_on_update(),
            AttributeSpec::string("value", AttrMode::Required).sent_on_update(),
            AttributeSpec::typed("secret", AttrType::Bool, AttrMode::Optional),
        ],
        identity: Identity::Single {
            id: "id",
            lookup: "key",
        },
        scope: &[],
    };
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_identity_accessors() {
        assert_eq!(PROJECT.id_attribute(), "id");
        assert_eq!(PROJECT.lookup_attribute(), "name");
        assert_eq!(PROJECT.arity(), 1);
        assert_eq!(PROJECT_USER.arity(), 2);
        assert!(PROJECT_USER.is_composite());
        assert_eq!(PROJECT_USER.remote_field("user_id"), "id");
        assert_eq!(PROJECT_USER.remote_field("role"), "role");
    }

    #[test]
    fn test_validate_plan_ok() {
        let plan = AttributeRecord::new().with("name", "Infra");
        assert!(PROJECT.validate_plan(&plan).is_ok());
    }

    #[test]
    fn test_validate_plan_missing_required() {
        let plan = AttributeRecord::new();
        let err = PROJECT.validate_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("missing required attribute 'name'"));
    }

    #[test]
    fn test_validate_plan_rejects_computed_and_unknown_names() {
        let plan = AttributeRecord::new().with("name", "Infra").with("id", "p1");
        assert!(PROJECT.validate_plan(&plan).is_err());

        let plan = AttributeRecord::new().with("name", "Infra").with("color", "red");
        assert!(PROJECT.validate_plan(&plan).is_err());
    }

    #[test]
    fn test_validate_plan_type_tags() {
        let plan = AttributeRecord::new()
            .with("key", "REGION")
            .with("value", "eu")
            .with("secret", "yes");
        let err = VARIABLE.validate_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("must be a bool"));
    }

    #[test]
    fn test_plan_record_marks_computed_unknown() {
        let plan = PROJECT.plan_record(&AttributeRecord::new().with("name", "Infra"));
        assert!(plan.value("id").is_unknown());
        assert!(plan.value("type").is_unknown());
        assert_eq!(plan.get_str("name"), Some("Infra"));
    }

    #[test]
    fn test_writable_subset_skips_computed_and_unset() {
        let plan = PROJECT.plan_record(&AttributeRecord::new().with("name", "Infra"));
        let writable = PROJECT.writable_subset(&plan);
        assert_eq!(writable.names().collect::<Vec<_>>(), vec!["name"]);
    }
}

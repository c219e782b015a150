//! Resource kinds managed through the n8n public API.

use declarative::{AttrMode, AttrType, AttributeSpec, Identity, ResourceKind};

/// A project. Creating one returns no body.
pub static PROJECT: ResourceKind = ResourceKind {
    name: "project",
    description: "Project grouping workflows, credentials and members",
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

/// A user's membership in a project.
///
/// The remote side has no identifier for memberships, so the tracked id is
/// the composite key `project_id/user_id`. Listing is scoped to one project.
pub static PROJECT_USER: ResourceKind = ResourceKind {
    name: "project_user",
    description: "Membership of a user in a project, with a project role",
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

/// An instance variable. Updates replace key and value together.
///
/// Writes carry the owning project as `projectId`; lists return it nested
/// as `project.id`.
pub static VARIABLE: ResourceKind = ResourceKind {
    name: "variable",
    description: "Key/value variable available to workflows",
    attributes: &[
        AttributeSpec::string("id", AttrMode::Computed),
        AttributeSpec::string("key", AttrMode::Required).sent_on_update(),
        AttributeSpec::string("value", AttrMode::Required).sent_on_update(),
        AttributeSpec::string("type", AttrMode::OptionalComputed),
        AttributeSpec::string("project_id", AttrMode::OptionalComputed)
            .remote("projectId")
            .read_from("project.id")
            .immutable(),
    ],
    identity: Identity::Single {
        id: "id",
        lookup: "key",
    },
    scope: &[],
};

/// A workflow tag.
pub static TAG: ResourceKind = ResourceKind {
    name: "tag",
    description: "Tag for organizing workflows",
    attributes: &[
        AttributeSpec::string("id", AttrMode::Computed),
        AttributeSpec::string("name", AttrMode::Required),
        AttributeSpec::string("created_at", AttrMode::Computed).remote("createdAt"),
        AttributeSpec::string("updated_at", AttrMode::Computed).remote("updatedAt"),
    ],
    identity: Identity::Single {
        id: "id",
        lookup: "name",
    },
    scope: &[],
};

/// An instance user, invited by email.
pub static USER: ResourceKind = ResourceKind {
    name: "user",
    description: "Instance user with a global role",
    attributes: &[
        AttributeSpec::string("id", AttrMode::Computed),
        AttributeSpec::string("email", AttrMode::Required).immutable(),
        AttributeSpec::string("role", AttrMode::OptionalComputed),
        AttributeSpec::string("first_name", AttrMode::Computed).remote("firstName"),
        AttributeSpec::string("last_name", AttrMode::Computed).remote("lastName"),
        AttributeSpec::typed("is_pending", AttrType::Bool, AttrMode::Computed).remote("isPending"),
        AttributeSpec::string("created_at", AttrMode::Computed).remote("createdAt"),
        AttributeSpec::string("updated_at", AttrMode::Computed).remote("updatedAt"),
    ],
    identity: Identity::Single {
        id: "id",
        lookup: "email",
    },
    scope: &[],
};

/// Every supported kind, in dependency order.
pub static ALL: [&ResourceKind; 5] = [&USER, &PROJECT, &PROJECT_USER, &VARIABLE, &TAG];

/// Look up a kind by name.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static ResourceKind> {
    ALL.iter().copied().find(|k| k.name == name)
}

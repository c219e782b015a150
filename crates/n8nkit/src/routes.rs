//! Request construction for each resource kind.
//!
//! Everything here is pure: a kind and some attributes go in, a [`Route`]
//! comes out. The client only sends what these functions build.

use crate::error::{Error, Result};
use declarative::composite;
use declarative::{AttributeRecord, ListScope, RemoteEntity, ResourceKind};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Deserialize;
use serde_json::{Map, Value as Json, json};

/// Bytes escaped in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escape an identifier for use as one path segment.
fn seg(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// HTTP method of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request relative to the API root.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    /// Path below `/api/v1`, starting with `/`
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Json>,
}

impl Route {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    fn body(mut self, body: Json) -> Self {
        self.body = Some(body);
        self
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub data: Vec<Json>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn entities(self) -> Vec<RemoteEntity> {
        self.data.into_iter().map(RemoteEntity::from_json).collect()
    }

    /// Cursor for the following page; empty cursors end the listing
    pub fn next(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Parse a list response body.
pub fn parse_page(body: &str) -> Result<Page> {
    Ok(serde_json::from_str(body)?)
}

/// Parse a write response body into an entity, if it is one.
///
/// Empty bodies, arrays and scalars carry no entity.
pub fn parse_entity(body: &str) -> Option<RemoteEntity> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Json>(body) {
        Ok(value @ Json::Object(_)) => Some(RemoteEntity::from_json(value)),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Ignoring unparseable write response: {e}");
            None
        }
    }
}

/// Route listing every entity of `kind` within `scope`.
pub fn list_route(kind: &ResourceKind, scope: &ListScope) -> Result<Route> {
    match kind.name {
        "project" => Ok(Route::new(Method::Get, "/projects")),
        "variable" => Ok(Route::new(Method::Get, "/variables")),
        "tag" => Ok(Route::new(Method::Get, "/tags")),
        "user" => Ok(Route::new(Method::Get, "/users").query("includeRole", "true")),
        "project_user" => {
            let project = scope.get("project_id").ok_or_else(|| {
                Error::InvalidRequest("listing project members requires a project_id".into())
            })?;
            Ok(Route::new(Method::Get, "/users")
                .query("projectId", project)
                .query("includeRole", "true"))
        }
        other => Err(Error::UnsupportedKind(other.to_string())),
    }
}

/// Route creating an entity from its writable attributes.
pub fn create_route(kind: &ResourceKind, attributes: &AttributeRecord) -> Result<Route> {
    match kind.name {
        "project" => Ok(Route::new(Method::Post, "/projects").body(body_from(kind, attributes))),
        "variable" => Ok(Route::new(Method::Post, "/variables").body(body_from(kind, attributes))),
        "tag" => Ok(Route::new(Method::Post, "/tags").body(body_from(kind, attributes))),
        "user" => {
            let mut invite = Map::new();
            invite.insert("email".into(), required(kind, attributes, "email")?.into());
            if let Some(role) = attributes.get_str("role") {
                invite.insert("role".into(), role.into());
            }
            Ok(Route::new(Method::Post, "/users").body(Json::Array(vec![Json::Object(invite)])))
        }
        "project_user" => {
            let project = required(kind, attributes, "project_id")?;
            let relation = json!({
                "userId": required(kind, attributes, "user_id")?,
                "role": required(kind, attributes, "role")?,
            });
            Ok(Route::new(Method::Post, format!("/projects/{}/users", seg(&project)))
                .body(json!({ "relations": [relation] })))
        }
        other => Err(Error::UnsupportedKind(other.to_string())),
    }
}

/// Route writing `changed` attributes to the entity `id`.
pub fn update_route(kind: &ResourceKind, id: &str, changed: &AttributeRecord) -> Result<Route> {
    match kind.name {
        "project" | "variable" | "tag" => {
            let path = format!("/{}s/{}", kind.name, seg(id));
            Ok(Route::new(Method::Put, path).body(body_from(kind, changed)))
        }
        "user" => {
            let role = required(kind, changed, "role")?;
            Ok(Route::new(Method::Patch, format!("/users/{}/role", seg(id)))
                .body(json!({ "newRoleName": role })))
        }
        "project_user" => {
            let (project, user) = membership(id)?;
            let role = required(kind, changed, "role")?;
            let path = format!("/projects/{}/users/{}", seg(&project), seg(&user));
            Ok(Route::new(Method::Patch, path).body(json!({ "role": role })))
        }
        other => Err(Error::UnsupportedKind(other.to_string())),
    }
}

/// Route deleting the entity `id`.
pub fn delete_route(kind: &ResourceKind, id: &str) -> Result<Route> {
    let path = match kind.name {
        "project" => format!("/projects/{}", seg(id)),
        "variable" => format!("/variables/{}", seg(id)),
        "tag" => format!("/tags/{}", seg(id)),
        "user" => format!("/users/{}", seg(id)),
        "project_user" => {
            let (project, user) = membership(id)?;
            format!("/projects/{}/users/{}", seg(&project), seg(&user))
        }
        other => return Err(Error::UnsupportedKind(other.to_string())),
    };
    Ok(Route::new(Method::Delete, path))
}

/// JSON object of the known, non-null attributes under their remote names
pub fn body_from(kind: &ResourceKind, attributes: &AttributeRecord) -> Json {
    let mut body = Map::new();
    for (name, value) in attributes.iter() {
        if name == kind.id_attribute() {
            continue;
        }
        if let Some(json) = value.as_json().filter(|j| !j.is_null()) {
            body.insert(kind.remote_field(name).to_string(), json.clone());
        }
    }
    Json::Object(body)
}

fn required(kind: &ResourceKind, attributes: &AttributeRecord, name: &str) -> Result<String> {
    attributes
        .value(name)
        .as_identifier()
        .ok_or_else(|| Error::InvalidRequest(format!("{} requires {name}", kind.name)))
}

fn membership(id: &str) -> Result<(String, String)> {
    let mut parts = composite::decode(id, 2)
        .map_err(|e| Error::InvalidRequest(e.to_string()))?
        .into_iter();
    match (parts.next(), parts.next()) {
        (Some(project), Some(user)) => Ok((project, user)),
        _ => Err(Error::InvalidRequest(format!("malformed membership id '{id}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{PROJECT, PROJECT_USER, TAG, USER, VARIABLE};

    #[test]
    fn test_list_routes() {
        let none = ListScope::new();
        assert_eq!(list_route(&PROJECT, &none).unwrap().path, "/projects");
        assert_eq!(
            list_route(&USER, &none).unwrap().query,
            vec![("includeRole", "true".to_string())]
        );

        let mut scope = ListScope::new();
        scope.insert("project_id", "proj-1");
        let route = list_route(&PROJECT_USER, &scope).unwrap();
        assert_eq!(route.path, "/users");
        assert!(route.query.contains(&("projectId", "proj-1".to_string())));
    }

    #[test]
    fn test_membership_list_requires_project() {
        assert!(matches!(
            list_route(&PROJECT_USER, &ListScope::new()),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_create_project_body() {
        let attrs = AttributeRecord::new().with("name", "Infra");
        let route = create_route(&PROJECT, &attrs).unwrap();
        assert_eq!(route.method, Method::Post);
        assert_eq!(route.body, Some(json!({ "name": "Infra" })));
    }

    #[test]
    fn test_create_variable_uses_remote_names() {
        let attrs = AttributeRecord::new()
            .with("key", "API_URL")
            .with("value", "https://api")
            .with("project_id", "proj-1");
        let route = create_route(&VARIABLE, &attrs).unwrap();
        assert_eq!(
            route.body,
            Some(json!({ "key": "API_URL", "value": "https://api", "projectId": "proj-1" }))
        );
    }

    #[test]
    fn test_create_user_is_an_invite_list() {
        let attrs = AttributeRecord::new()
            .with("email", "ada@example.com")
            .with("role", "global:member");
        let route = create_route(&USER, &attrs).unwrap();
        assert_eq!(
            route.body,
            Some(json!([{ "email": "ada@example.com", "role": "global:member" }]))
        );
    }

    #[test]
    fn test_create_membership() {
        let attrs = AttributeRecord::new()
            .with("project_id", "proj-1")
            .with("user_id", "user-7")
            .with("role", "project:editor");
        let route = create_route(&PROJECT_USER, &attrs).unwrap();
        assert_eq!(route.path, "/projects/proj-1/users");
        assert_eq!(
            route.body,
            Some(json!({ "relations": [{ "userId": "user-7", "role": "project:editor" }] }))
        );
    }

    #[test]
    fn test_update_routes() {
        let changed = AttributeRecord::new().with("role", "global:admin");
        let route = update_route(&USER, "u1", &changed).unwrap();
        assert_eq!(route.to_string(), "PATCH /users/u1/role");
        assert_eq!(route.body, Some(json!({ "newRoleName": "global:admin" })));

        let changed = AttributeRecord::new().with("role", "project:viewer");
        let route = update_route(&PROJECT_USER, "proj-1/user-7", &changed).unwrap();
        assert_eq!(route.to_string(), "PATCH /projects/proj-1/users/user-7");

        let changed = AttributeRecord::new().with("name", "ops");
        let route = update_route(&TAG, "t1", &changed).unwrap();
        assert_eq!(route.to_string(), "PUT /tags/t1");
        assert_eq!(route.body, Some(json!({ "name": "ops" })));
    }

    #[test]
    fn test_delete_routes() {
        assert_eq!(delete_route(&VARIABLE, "v1").unwrap().path, "/variables/v1");
        assert_eq!(
            delete_route(&PROJECT_USER, "proj-1/user-7").unwrap().path,
            "/projects/proj-1/users/user-7"
        );
        assert!(delete_route(&PROJECT_USER, "proj-1").is_err());
    }

    #[test]
    fn test_ids_are_escaped_in_paths() {
        assert_eq!(
            delete_route(&TAG, "a b?c#d%").unwrap().path,
            "/tags/a%20b%3Fc%23d%25"
        );
        let changed = AttributeRecord::new().with("role", "global:admin");
        assert_eq!(
            update_route(&USER, "u/1", &changed).unwrap().path,
            "/users/u%2F1/role"
        );
        let changed = AttributeRecord::new().with("role", "project:viewer");
        assert_eq!(
            update_route(&PROJECT_USER, "p?1/u#2", &changed).unwrap().path,
            "/projects/p%3F1/users/u%232"
        );
    }

    #[test]
    fn test_body_skips_id_and_nulls() {
        let attrs = AttributeRecord::new()
            .with("id", "p1")
            .with("name", "Infra")
            .with("type", declarative::Value::Null);
        assert_eq!(body_from(&PROJECT, &attrs), json!({ "name": "Infra" }));
    }

    #[test]
    fn test_parse_page() {
        let page = parse_page(r#"{"data":[{"id":"1"},{"id":"2"}],"nextCursor":"abc"}"#).unwrap();
        assert_eq!(page.next(), Some("abc"));
        assert_eq!(page.entities().len(), 2);

        let last = parse_page(r#"{"data":[],"nextCursor":null}"#).unwrap();
        assert_eq!(last.next(), None);

        assert!(parse_page("not json").is_err());
    }

    #[test]
    fn test_parse_entity() {
        assert!(parse_entity("").is_none());
        assert!(parse_entity(r#"[{"user":{"id":"u1"}}]"#).is_none());
        let entity = parse_entity(r#"{"id":"t1","name":"ops"}"#).unwrap();
        assert_eq!(entity.get_str("name"), Some("ops"));
    }
}

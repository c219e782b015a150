//! Blocking n8n API client.
//!
//! [`N8nClient`] implements [`RemoteOperations`] over the public REST API.
//! Each request is bounded by the smaller of the configured timeout and the
//! time left on the caller's context.

use crate::error::{Error, Result};
use crate::retry::{LogCallback, with_retry};
use crate::routes::{self, Method, Route};
use crate::types::{API_KEY_HEADER, ClientConfig, PAGE_LIMIT};
use declarative::{
    AttributeRecord, ListScope, OperationContext, RemoteEntity, RemoteError, RemoteOperations,
    ResourceKind,
};
use std::time::Duration;

/// n8n public API client.
pub struct N8nClient {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    config: ClientConfig,
    api_root: String,
}

impl std::fmt::Debug for N8nClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("N8nClient")
            .field("api_root", &self.api_root)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl N8nClient {
    /// Create a client, validating the configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config("base_url is empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url '{base}' must start with http:// or https://"
            )));
        }
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("api_key is empty".into()));
        }

        // Non-2xx responses are turned into errors by send()
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .into();

        Ok(Self {
            agent,
            api_root: config.api_root(),
            config,
        })
    }

    /// Get the API root URL.
    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Time budget for the next request.
    fn request_timeout(&self, ctx: &OperationContext) -> Duration {
        ctx.remaining()
            .map_or(self.config.timeout, |r| r.min(self.config.timeout))
    }

    fn prepare<B>(
        &self,
        request: ureq::RequestBuilder<B>,
        route: &Route,
        timeout: Duration,
    ) -> ureq::RequestBuilder<B> {
        let mut request = request
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .header("Accept", "application/json");
        for (key, value) in &route.query {
            request = request.query(*key, value);
        }
        request.config().timeout_global(Some(timeout)).build()
    }

    /// Send one request and return the response body.
    fn send(&self, ctx: &OperationContext, route: &Route) -> Result<String> {
        ctx.checkpoint()?;
        let timeout = self.request_timeout(ctx);
        let url = format!("{}{}", self.api_root, route.path);
        log::debug!("{route}");

        let response = match route.method {
            Method::Get => self.prepare(self.agent.get(&url), route, timeout).call(),
            Method::Delete => self.prepare(self.agent.delete(&url), route, timeout).call(),
            Method::Post => self.send_body(self.agent.post(&url), route, timeout),
            Method::Put => self.send_body(self.agent.put(&url), route, timeout),
            Method::Patch => self.send_body(self.agent.patch(&url), route, timeout),
        };
        let mut response = response?;

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        if (200..300).contains(&status) {
            Ok(body)
        } else {
            log::debug!("{route} answered {status}");
            Err(Error::http(status, error_message(&body, status)))
        }
    }

    fn send_body(
        &self,
        request: ureq::RequestBuilder<ureq::typestate::WithBody>,
        route: &Route,
        timeout: Duration,
    ) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let request = self.prepare(request, route, timeout);
        match &route.body {
            Some(body) => request.send_json(body),
            None => request.send_empty(),
        }
    }

    /// Follow `nextCursor` until every page has been read.
    fn list_all(&self, ctx: &OperationContext, route: &Route) -> Result<Vec<RemoteEntity>> {
        let mut entities = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut page_route = route.clone().query("limit", PAGE_LIMIT.to_string());
            if let Some(cursor) = &cursor {
                page_route = page_route.query("cursor", cursor.as_str());
            }

            let body = with_retry(&self.config.retry, ctx, Some(&LogCallback), || {
                self.send(ctx, &page_route)
            })?;
            let page = routes::parse_page(&body)?;
            cursor = page.next().map(str::to_string);
            entities.extend(page.entities());

            if cursor.is_none() {
                break;
            }
        }

        log::debug!("{route}: {} entities", entities.len());
        Ok(entities)
    }

    fn list(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &ListScope,
    ) -> Result<Vec<RemoteEntity>> {
        let route = routes::list_route(kind, scope)?;
        self.list_all(ctx, &route)
    }

    fn create(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        attributes: &AttributeRecord,
    ) -> Result<Option<RemoteEntity>> {
        let route = routes::create_route(kind, attributes)?;
        let body = self.send(ctx, &route)?;
        Ok(routes::parse_entity(&body))
    }

    fn update(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
        changed: &AttributeRecord,
    ) -> Result<Option<RemoteEntity>> {
        let route = routes::update_route(kind, id, changed)?;
        let body = self.send(ctx, &route)?;
        Ok(routes::parse_entity(&body))
    }

    fn delete(&self, ctx: &OperationContext, kind: &ResourceKind, id: &str) -> Result<()> {
        let route = routes::delete_route(kind, id)?;
        let result = with_retry(&self.config.retry, ctx, Some(&LogCallback), || {
            self.send(ctx, &route)
        });
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                log::debug!("{route}: already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl RemoteOperations for N8nClient {
    fn list_entities(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        scope: &ListScope,
    ) -> std::result::Result<Vec<RemoteEntity>, RemoteError> {
        Ok(self.list(ctx, kind, scope)?)
    }

    fn write_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        attributes: &AttributeRecord,
    ) -> std::result::Result<Option<RemoteEntity>, RemoteError> {
        Ok(self.create(ctx, kind, attributes)?)
    }

    fn update_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
        changed: &AttributeRecord,
    ) -> std::result::Result<Option<RemoteEntity>, RemoteError> {
        Ok(self.update(ctx, kind, id, changed)?)
    }

    fn delete_entity(
        &self,
        ctx: &OperationContext,
        kind: &ResourceKind,
        id: &str,
    ) -> std::result::Result<(), RemoteError> {
        Ok(self.delete(ctx, kind, id)?)
    }
}

/// Pull the `message` field out of an error body, if there is one
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::PROJECT;
    use declarative::CancellationToken;

    fn client() -> N8nClient {
        N8nClient::new(ClientConfig::new("http://127.0.0.1:5678", "test-key")).unwrap()
    }

    #[test]
    fn test_new_validates_config() {
        assert!(matches!(
            N8nClient::new(ClientConfig::new("", "key")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            N8nClient::new(ClientConfig::new("n8n.example.com", "key")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            N8nClient::new(ClientConfig::new("https://n8n.example.com", " ")),
            Err(Error::Config(_))
        ));
        assert_eq!(client().api_root(), "http://127.0.0.1:5678/api/v1");
    }

    #[test]
    fn test_cancelled_context_sends_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OperationContext::with_token(token);

        let err = client()
            .list_entities(&ctx, &PROJECT, &ListScope::new())
            .unwrap_err();
        assert_eq!(err, RemoteError::Cancelled);
    }

    #[test]
    fn test_request_timeout_uses_context_deadline() {
        let client = client();
        assert_eq!(
            client.request_timeout(&OperationContext::new()),
            Duration::from_secs(30)
        );

        let ctx = OperationContext::new().timeout(Duration::from_secs(2));
        assert!(client.request_timeout(&ctx) <= Duration::from_secs(2));
    }

    #[test]
    fn test_unsupported_kind_is_rejected_before_sending() {
        static WORKFLOW: ResourceKind = ResourceKind {
            name: "workflow",
            description: "",
            attributes: &[],
            identity: declarative::Identity::Single {
                id: "id",
                lookup: "name",
            },
            scope: &[],
        };
        let err = client()
            .delete_entity(&OperationContext::new(), &WORKFLOW, "w1")
            .unwrap_err();
        assert_eq!(err, RemoteError::UnsupportedKind("workflow".into()));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message":"unauthorized"}"#, 401),
            "unauthorized"
        );
        assert_eq!(error_message("", 502), "HTTP 502");
        assert_eq!(error_message("Bad Gateway", 502), "Bad Gateway");
    }
}

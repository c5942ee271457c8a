//! Ordered request-handling pipeline of the dev server.
//!
//! Middlewares are kept in named groups. A group can be replaced as a whole
//! (mock reloads do this) or inserted in front of another group, so the
//! relative order never depends on index arithmetic.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Compiled assets from the in-memory cache.
pub const ASSETS: &str = "assets";
/// Reverse-proxy rules from `.cmpack`.
pub const PROXY: &str = "proxy";
/// Mock routes.
pub const MOCK: &str = "mock";
/// Rewrites navigation requests to the index document.
pub const HISTORY_FALLBACK: &str = "history-fallback";
/// Compiled assets again, for rewritten requests.
pub const SPA_ASSETS: &str = "spa-assets";
/// Static files from the public directory.
pub const PUBLIC: &str = "public";

/// What a middleware did with a request.
pub enum Flow {
    /// Not handled; pass the (possibly rewritten) request on.
    Next(Request<Body>),
    /// Handled.
    Respond(Response),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: Request<Body>) -> Flow;
}

#[derive(Clone)]
struct Group {
    name: &'static str,
    layers: Vec<Arc<dyn Middleware>>,
}

/// Named, ordered middleware groups. Cheap to clone.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    groups: Vec<Group>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group.
    pub fn with_group(mut self, name: &'static str, layers: Vec<Arc<dyn Middleware>>) -> Self {
        self.groups.push(Group { name, layers });
        self
    }

    /// Group names in request-handling order.
    pub fn names(&self) -> Vec<&'static str> {
        self.groups.iter().map(|g| g.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    /// Number of middlewares in the named group.
    pub fn group_len(&self, name: &str) -> usize {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map_or(0, |g| g.layers.len())
    }

    /// Replace the layers of group `name`. When the group does not exist yet
    /// it is inserted directly in front of `before`, or appended when
    /// `before` is missing too.
    pub fn replace_or_insert_before(
        &mut self,
        name: &'static str,
        before: &str,
        layers: Vec<Arc<dyn Middleware>>,
    ) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.name == name) {
            group.layers = layers;
            return;
        }
        let group = Group { name, layers };
        match self.groups.iter().position(|g| g.name == before) {
            Some(index) => self.groups.insert(index, group),
            None => self.groups.push(group),
        }
    }

    /// Run the request through every middleware until one responds.
    pub async fn dispatch(&self, mut req: Request<Body>) -> Response {
        for layer in self.groups.iter().flat_map(|g| g.layers.iter()) {
            match layer.handle(req).await {
                Flow::Next(next) => req = next,
                Flow::Respond(response) => return response,
            }
        }
        not_found(req.uri().path())
    }
}

/// Plain-text 404.
pub fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Cannot {path}"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, req: Request<Body>) -> Flow {
            if req.uri().path() == format!("/{}", self.0) {
                Flow::Respond(self.0.into_response())
            } else {
                Flow::Next(req)
            }
        }
    }

    /// Rewrites every request to `/rewritten`.
    struct Rewrite;

    #[async_trait]
    impl Middleware for Rewrite {
        async fn handle(&self, mut req: Request<Body>) -> Flow {
            *req.uri_mut() = "/rewritten".parse().unwrap();
            Flow::Next(req)
        }
    }

    fn layer(m: impl Middleware + 'static) -> Arc<dyn Middleware> {
        Arc::new(m)
    }

    fn base() -> MiddlewareStack {
        MiddlewareStack::new()
            .with_group(ASSETS, vec![layer(Tag("asset"))])
            .with_group(HISTORY_FALLBACK, vec![layer(Rewrite)])
            .with_group(SPA_ASSETS, vec![layer(Tag("rewritten"))])
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_mock_group_goes_before_fallback() {
        let mut stack = base();
        stack.replace_or_insert_before(MOCK, HISTORY_FALLBACK, vec![layer(Tag("a"))]);
        assert_eq!(
            stack.names(),
            vec![ASSETS, MOCK, HISTORY_FALLBACK, SPA_ASSETS]
        );
    }

    #[test]
    fn test_repeated_replace_does_not_duplicate() {
        let mut stack = base();
        for _ in 0..5 {
            stack.replace_or_insert_before(
                MOCK,
                HISTORY_FALLBACK,
                vec![layer(Tag("a")), layer(Tag("b"))],
            );
        }
        assert_eq!(stack.names().len(), 4);
        assert_eq!(stack.group_len(MOCK), 2);

        stack.replace_or_insert_before(MOCK, HISTORY_FALLBACK, Vec::new());
        assert_eq!(stack.group_len(MOCK), 0);
        assert!(stack.contains(MOCK));
    }

    #[test]
    fn test_missing_anchor_appends() {
        let mut stack = MiddlewareStack::new().with_group(ASSETS, Vec::new());
        stack.replace_or_insert_before(MOCK, HISTORY_FALLBACK, Vec::new());
        assert_eq!(stack.names(), vec![ASSETS, MOCK]);
    }

    #[tokio::test]
    async fn test_dispatch_order() {
        let mut stack = base();
        stack.replace_or_insert_before(MOCK, HISTORY_FALLBACK, vec![layer(Tag("api"))]);

        let req = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();
        assert_eq!(body_of(stack.dispatch(req("/asset")).await).await, "asset");
        assert_eq!(body_of(stack.dispatch(req("/api")).await).await, "api");
        // Unknown paths are rewritten by the fallback and served afterwards.
        assert_eq!(body_of(stack.dispatch(req("/users/1")).await).await, "rewritten");
    }

    #[tokio::test]
    async fn test_empty_stack_is_404() {
        let response = MiddlewareStack::new()
            .dispatch(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

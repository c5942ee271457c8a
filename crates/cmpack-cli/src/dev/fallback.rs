//! History API fallback for single-page apps.

use crate::dev::stack::{Flow, Middleware};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Uri};

/// Document navigation requests are rewritten to.
pub const INDEX: &str = "/index.html";

/// Rewrites navigation requests to [`INDEX`].
///
/// A request qualifies when it is a GET or HEAD whose `Accept` header
/// contains one of the accepted types and does not start with
/// `application/json`. Paths with dots are rewritten too.
#[derive(Debug, Clone)]
pub struct HistoryFallback {
    accept: Vec<&'static str>,
}

impl HistoryFallback {
    /// Projects that declare a `proxy` in package.json only get `text/html`
    /// requests rewritten, so API calls reach the proxy.
    pub fn new(manifest_has_proxy: bool) -> Self {
        let accept = if manifest_has_proxy {
            vec!["text/html"]
        } else {
            vec!["text/html", "*/*"]
        };
        Self { accept }
    }

    pub fn should_rewrite(&self, req: &Request<Body>) -> bool {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return false;
        }
        let Some(accept) = req
            .headers()
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        if accept.starts_with("application/json") {
            return false;
        }
        self.accept.iter().any(|kind| accept.contains(kind))
    }
}

#[async_trait]
impl Middleware for HistoryFallback {
    async fn handle(&self, mut req: Request<Body>) -> Flow {
        if self.should_rewrite(&req) {
            tracing::debug!(from = %req.uri(), "history fallback");
            *req.uri_mut() = Uri::from_static(INDEX);
        }
        Flow::Next(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str, accept: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_navigation_is_rewritten() {
        let fallback = HistoryFallback::new(false);
        assert!(fallback.should_rewrite(&request(
            Method::GET,
            "/users/1",
            Some("text/html,application/xhtml+xml")
        )));
        // dots do not stop the rewrite
        assert!(fallback.should_rewrite(&request(Method::GET, "/v1.2/page", Some("*/*"))));
    }

    #[test]
    fn test_non_navigation_passes() {
        let fallback = HistoryFallback::new(false);
        assert!(!fallback.should_rewrite(&request(Method::POST, "/form", Some("text/html"))));
        assert!(!fallback.should_rewrite(&request(Method::GET, "/x", None)));
        assert!(!fallback.should_rewrite(&request(
            Method::GET,
            "/api",
            Some("application/json, */*")
        )));
    }

    #[test]
    fn test_proxy_projects_only_rewrite_html() {
        let fallback = HistoryFallback::new(true);
        assert!(!fallback.should_rewrite(&request(Method::GET, "/api/x", Some("*/*"))));
        assert!(fallback.should_rewrite(&request(Method::GET, "/page", Some("text/html"))));
    }

    #[tokio::test]
    async fn test_rewrites_uri() {
        let fallback = HistoryFallback::new(false);
        match fallback
            .handle(request(Method::GET, "/deep/link?x=1", Some("text/html")))
            .await
        {
            Flow::Next(req) => assert_eq!(req.uri().path(), INDEX),
            Flow::Respond(_) => panic!("fallback never responds"),
        }
    }
}

//! HTTP forwarding for proxy rules and proxying mock routes.

use crate::config::ProxyRule;
use crate::dev::stack::{Flow, Middleware};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use indexmap::IndexMap;
use regex::Regex;
use std::time::Duration;

/// Largest request body forwarded upstream.
pub const MAX_FORWARD_BODY: usize = 50 * 1024 * 1024;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Shared HTTP client for upstream requests.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Send `req` to `url` and relay the upstream response.
    ///
    /// With `keep_host` the original `Host` header is forwarded; otherwise
    /// the upstream host is used. Connection failures become 502.
    pub async fn forward(&self, req: Request<Body>, url: &str, keep_host: bool) -> Response {
        let (parts, body) = req.into_parts();
        let body = match axum::body::to_bytes(body, MAX_FORWARD_BODY).await {
            Ok(body) => body,
            Err(e) => return bad_gateway(url, &e.to_string()),
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &parts.headers {
            if is_hop_by_hop(name) || (name == header::HOST && !keep_host) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        tracing::debug!(method = %parts.method, %url, "proxying");
        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        let upstream = match upstream {
            Ok(upstream) => upstream,
            Err(e) => return bad_gateway(url, &e.to_string()),
        };

        let status = upstream.status();
        let mut response_headers = HeaderMap::new();
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) && name != header::CONTENT_LENGTH {
                response_headers.append(name.clone(), value.clone());
            }
        }
        match upstream.bytes().await {
            Ok(bytes) => (status, response_headers, bytes).into_response(),
            Err(e) => bad_gateway(url, &e.to_string()),
        }
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

fn bad_gateway(url: &str, message: &str) -> Response {
    tracing::warn!(%url, "proxy error: {message}");
    (
        StatusCode::BAD_GATEWAY,
        format!("Proxy error: could not proxy request to {url}: {message}"),
    )
        .into_response()
}

/// One `.cmpack` proxy rule: requests under `context` go to `target`.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    context: String,
    target: String,
    change_origin: bool,
    rewrites: Vec<(Regex, String)>,
}

impl ProxyRoute {
    /// Invalid `pathRewrite` patterns are skipped with a warning.
    pub fn new(context: &str, rule: &ProxyRule) -> Self {
        let rewrites = rule
            .path_rewrite()
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
                        Ok(re) => Some((re, replacement.clone())),
                        Err(e) => {
                            tracing::warn!(%pattern, "ignoring invalid pathRewrite: {e}");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            context: context.to_string(),
            target: rule.target().trim_end_matches('/').to_string(),
            change_origin: rule.change_origin(),
            rewrites,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.context)
    }

    /// Upstream URL for a request path and query.
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        let mut path = path_and_query.to_string();
        for (re, replacement) in &self.rewrites {
            path = re.replace(&path, replacement.as_str()).into_owned();
        }
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        format!("{}{}", self.target, path)
    }
}

/// Applies the `.cmpack` proxy rules in declaration order.
pub struct ProxyMiddleware {
    routes: Vec<ProxyRoute>,
    forwarder: Forwarder,
}

impl ProxyMiddleware {
    pub fn new(rules: &IndexMap<String, ProxyRule>, forwarder: Forwarder) -> Self {
        Self {
            routes: rules
                .iter()
                .map(|(context, rule)| ProxyRoute::new(context, rule))
                .collect(),
            forwarder,
        }
    }
}

#[async_trait]
impl Middleware for ProxyMiddleware {
    async fn handle(&self, req: Request<Body>) -> Flow {
        let Some(route) = self.routes.iter().find(|r| r.matches(req.uri().path())) else {
            return Flow::Next(req);
        };
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let url = route.upstream_url(&path_and_query);
        Flow::Respond(
            self.forwarder
                .forward(req, &url, !route.change_origin)
                .await,
        )
    }
}

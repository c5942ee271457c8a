//! Mock routes for the dev server.
//!
//! Routes come from `.cmpack.mock.js` (evaluated through the script runtime),
//! else `.cmpack.mock.json`, plus any registered on
//! [`Extensions`](crate::extension::Extensions). Keys look like
//! `"POST /api/users"` or just `"/api/users"` (GET). Values are:
//!
//! - an object (or any JSON value except numbers and booleans): sent as JSON
//! - a string: a proxy target URL
//! - a function / [`MockHandler`]: called with the request
//!
//! String routes whose path contains a parenthesised group match the whole
//! path and forward only the captured part; other proxy routes forward the
//! full path.

use crate::config::parse_json_with_comments;
use crate::dev::proxy::Forwarder;
use crate::dev::stack::{Flow, Middleware};
use crate::error::MockLoadError;
use crate::extension::{ScriptRunner, HANDLER_MARKER};
use crate::paths::ProjectPaths;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Executable mock definitions.
pub const MOCK_SCRIPT: &str = ".cmpack.mock.js";

/// Static mock definitions (JSON with comments).
pub const MOCK_JSON: &str = ".cmpack.mock.json";

/// Directory conventionally holding files required by the mock script.
pub const MOCK_DIR: &str = "mock";

/// Largest JSON or form body parsed for a mock handler.
pub const BODY_LIMIT: usize = 5 * 1024 * 1024;

const METHODS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "all",
];

static GROUP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\(.+\)").ok());

/// Request as seen by a mock handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MockRequest {
    pub method: String,
    /// Path and query as received
    pub url: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Named `:params` of the route path
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON or form body; `null` when absent
    pub body: Value,
}

/// Response produced by a mock handler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MockResponse {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

fn default_status() -> u16 {
    200
}

impl MockResponse {
    /// 200 with a JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let has_type = self
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"));

        let (default_type, body) = match self.body {
            Value::Null => ("text/plain; charset=utf-8", Body::empty()),
            Value::String(text) => ("text/html; charset=utf-8", Body::from(text)),
            other => ("application/json", Body::from(other.to_string())),
        };

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        if !has_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(default_type));
        }
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// Code answering a mock route.
#[async_trait]
pub trait MockHandler: Send + Sync {
    async fn call(&self, req: MockRequest) -> MockResponse;
}

#[async_trait]
impl<F> MockHandler for F
where
    F: Fn(MockRequest) -> MockResponse + Send + Sync,
{
    async fn call(&self, req: MockRequest) -> MockResponse {
        self(req)
    }
}

/// Handler exported by `.cmpack.mock.js`, run through the script runtime.
struct ScriptHandler {
    runner: ScriptRunner,
    path: PathBuf,
    key: String,
}

#[async_trait]
impl MockHandler for ScriptHandler {
    async fn call(&self, req: MockRequest) -> MockResponse {
        let request = serde_json::to_value(&req).unwrap_or(Value::Null);
        let result = self
            .runner
            .invoke_handler(&self.path, &self.key, &request)
            .await
            .and_then(|value| {
                serde_json::from_value::<MockResponse>(value).map_err(|e| {
                    crate::error::ConfigError::Script {
                        path: self.path.clone(),
                        message: e.to_string(),
                    }
                })
            });

        match result {
            Ok(response) => response,
            Err(e) => {
                crate::ui::error(&format!("Mock handler for {} failed: {e}", self.key));
                MockResponse::json(Value::String(e.to_string())).with_status(500)
            }
        }
    }
}

/// Value of one mock route.
#[derive(Clone)]
pub enum MockValue {
    Json(Value),
    Proxy(String),
    Handler(Arc<dyn MockHandler>),
}

impl MockValue {
    pub fn handler(handler: impl MockHandler + 'static) -> Self {
        MockValue::Handler(Arc::new(handler))
    }
}

impl fmt::Debug for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
            MockValue::Proxy(target) => f.debug_tuple("Proxy").field(target).finish(),
            MockValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Split a route key into lowercase method and path.
pub fn parse_key(key: &str) -> (String, String) {
    let mut parts = key.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => (method.to_lowercase(), path.to_string()),
        (Some(path), None) => ("get".to_string(), path.to_string()),
        _ => ("get".to_string(), String::new()),
    }
}

/// Express-style route path to an anchored, case-insensitive regex.
///
/// `:name` captures one segment, `*` captures anything, a trailing slash is
/// optional and other regex syntax passes through.
pub fn route_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
    let mut pattern = String::from("(?i)^");
    let mut names = Vec::new();
    let mut chars = path.trim_end_matches('/').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek().map_or(false, |n| n.is_ascii_alphabetic() || *n == '_') => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                pattern.push_str(&format!("(?P<{name}>[^/]+?)"));
                names.push(name);
            }
            '*' => pattern.push_str("(.*)"),
            '.' => pattern.push_str(r"\."),
            other => pattern.push(other),
        }
    }
    pattern.push_str("/?$");
    Ok((Regex::new(&pattern)?, names))
}

/// Join a target URL's path with the forwarded path.
fn join_url_path(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    format!("{base}/{rest}")
}

#[derive(Debug, Clone)]
enum ProxyMatch {
    /// Mounted at a path prefix; the full URL is forwarded
    Prefix(String),
    /// `^path$`; the first capture is forwarded
    Pattern(Regex),
}

#[derive(Clone)]
enum RouteKind {
    Respond {
        pattern: Regex,
        params: Vec<String>,
        value: MockValue,
    },
    Proxy {
        matcher: ProxyMatch,
        target: String,
    },
}

#[derive(Clone)]
struct MockRoute {
    method: String,
    kind: RouteKind,
}

impl MockRoute {
    fn accepts(&self, method: &Method) -> bool {
        let method = method.as_str().to_lowercase();
        self.method == "all"
            || self.method == method
            || (self.method == "get" && method == "head" && matches!(self.kind, RouteKind::Respond { .. }))
    }
}

/// Parsed mock route table, in declaration order.
#[derive(Clone, Default)]
pub struct MockTable {
    routes: Vec<MockRoute>,
}

impl MockTable {
    /// Build the table, validating every key and value.
    pub fn from_entries(entries: Vec<(String, MockValue)>) -> Result<Self, MockLoadError> {
        let mut routes = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let (method, path) = parse_key(&key);
            if !METHODS.contains(&method.as_str()) {
                return Err(MockLoadError::InvalidMethod { key });
            }
            let invalid_path = |e: regex::Error| MockLoadError::InvalidPath {
                key: key.clone(),
                message: e.to_string(),
            };

            let kind = match value {
                MockValue::Proxy(target) => {
                    let is_pattern = GROUP.as_ref().map_or(false, |re| re.is_match(&path));
                    let matcher = if is_pattern {
                        ProxyMatch::Pattern(Regex::new(&format!("^{path}$")).map_err(invalid_path)?)
                    } else {
                        ProxyMatch::Prefix(path.trim_end_matches('/').to_string())
                    };
                    RouteKind::Proxy { matcher, target }
                }
                value => {
                    let (pattern, params) = route_regex(&path).map_err(invalid_path)?;
                    RouteKind::Respond {
                        pattern,
                        params,
                        value,
                    }
                }
            };
            routes.push(MockRoute { method, kind });
        }
        Ok(Self { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Upstream URL for a proxying mock route, or `None` when it does not match.
///
/// `url` is the request's path and query.
fn forward_url(matcher: &ProxyMatch, target: &str, path: &str, url: &str) -> Option<String> {
    let forwarded = match matcher {
        ProxyMatch::Prefix(prefix) => {
            let mounted = path == prefix
                || path.starts_with(&format!("{prefix}/"))
                || prefix.is_empty();
            if !mounted {
                return None;
            }
            url.to_string()
        }
        ProxyMatch::Pattern(re) => {
            if !re.is_match(path) {
                return None;
            }
            re.captures(url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| url.to_string())
        }
    };

    let target = url::Url::parse(target).ok()?;
    let origin = target.origin().ascii_serialization();
    Some(format!(
        "{origin}{}",
        join_url_path(target.path(), &forwarded)
    ))
}

fn js_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        _ => "object",
    }
}

fn is_handler_marker(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |o| o.len() == 1 && o.contains_key(HANDLER_MARKER))
}

/// Turn an evaluated mock module into route entries.
///
/// `script` is the module functions were exported from; it is `None` for
/// JSON definitions, where handler markers cannot occur.
fn entries_from_document(
    document: Value,
    runner: &ScriptRunner,
    script: Option<&PathBuf>,
) -> Result<Vec<(String, MockValue)>, MockLoadError> {
    let object: Map<String, Value> = match document {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        other => return Err(MockLoadError::NotAnObject(js_type(&other).to_string())),
    };

    object
        .into_iter()
        .map(|(key, value)| {
            let value = match (value, script) {
                (value, Some(path)) if is_handler_marker(&value) => {
                    MockValue::handler(ScriptHandler {
                        runner: runner.clone(),
                        path: path.clone(),
                        key: key.clone(),
                    })
                }
                (Value::String(target), _) => MockValue::Proxy(target),
                (value @ (Value::Bool(_) | Value::Number(_)), _) => {
                    return Err(MockLoadError::InvalidValue {
                        key,
                        kind: js_type(&value).to_string(),
                    })
                }
                (value, _) => MockValue::Json(value),
            };
            Ok((key, value))
        })
        .collect()
}

/// Mock definitions with the project files the mock script loaded.
#[derive(Debug, Default)]
pub struct LoadedMocks {
    pub entries: Vec<(String, MockValue)>,
    /// Project files (outside `node_modules`) required by `.cmpack.mock.js`
    pub dependencies: Vec<PathBuf>,
}

/// Read the project's mock definitions and append `extra` routes.
pub fn load_entries(
    paths: &ProjectPaths,
    runner: &ScriptRunner,
    extra: &[(String, MockValue)],
) -> Result<LoadedMocks, MockLoadError> {
    let script = paths.resolve_app(MOCK_SCRIPT);
    let json = paths.resolve_app(MOCK_JSON);

    let mut loaded = LoadedMocks::default();
    if script.is_file() {
        let (document, files) = runner.evaluate_module_tracked(&script)?;
        loaded.entries = entries_from_document(document, runner, Some(&script))?;
        loaded.dependencies = project_dependencies(paths, &script, files);
    } else if json.is_file() {
        let text = std::fs::read_to_string(&json)
            .map_err(|e| MockLoadError::Load(format!("Failed to read {}: {e}", json.display())))?;
        loaded.entries =
            entries_from_document(parse_json_with_comments(&json, &text)?, runner, None)?;
    }

    loaded.entries.extend(extra.iter().cloned());
    Ok(loaded)
}

fn project_dependencies(
    paths: &ProjectPaths,
    script: &Path,
    files: Vec<PathBuf>,
) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|file| {
            file.starts_with(&paths.app_directory)
                && !file.starts_with(&paths.app_node_modules)
                && file != script
        })
        .collect()
}

/// Files whose change re-applies the mocks. Files loaded by the mock script
/// are added after each load (see [`LoadedMocks::dependencies`]).
pub fn watched_files(paths: &ProjectPaths) -> Vec<PathBuf> {
    vec![
        paths.resolve_app(MOCK_SCRIPT),
        paths.resolve_app(MOCK_JSON),
        paths.resolve_app(MOCK_DIR),
    ]
}

fn parse_form(bytes: &[u8]) -> Value {
    Value::Object(
        url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect(),
    )
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

/// Build the handler's view of a request, reading at most [`BODY_LIMIT`]
/// bytes of body.
async fn mock_request(
    req: Request<Body>,
    params: BTreeMap<String, String>,
) -> Result<MockRequest, Response> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|_| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "request entity too large".to_string(),
            )
                .into_response()
        })?;

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let body = if bytes.is_empty() {
        Value::Null
    } else if content_type.starts_with("application/json") || content_type.ends_with("+json") {
        serde_json::from_slice(&bytes).map_err(|e| bad_request(format!("Invalid JSON body: {e}")))?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        parse_form(&bytes)
    } else {
        Value::Null
    };

    let query = parts
        .uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();

    Ok(MockRequest {
        method: parts.method.as_str().to_string(),
        url: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        path: parts.uri.path().to_string(),
        query,
        params,
        headers,
        body,
    })
}

/// Serves a [`MockTable`].
pub struct MockMiddleware {
    table: MockTable,
    forwarder: Forwarder,
}

impl MockMiddleware {
    pub fn new(table: MockTable, forwarder: Forwarder) -> Self {
        Self { table, forwarder }
    }
}

#[async_trait]
impl Middleware for MockMiddleware {
    async fn handle(&self, req: Request<Body>) -> Flow {
        let path = req.uri().path().to_string();
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| path.clone());

        for route in &self.table.routes {
            if !route.accepts(req.method()) {
                continue;
            }
            match &route.kind {
                RouteKind::Proxy { matcher, target } => {
                    if let Some(upstream) = forward_url(matcher, target, &path, &url) {
                        return Flow::Respond(self.forwarder.forward(req, &upstream, false).await);
                    }
                }
                RouteKind::Respond {
                    pattern,
                    params,
                    value,
                } => {
                    let Some(captures) = pattern.captures(&path) else {
                        continue;
                    };
                    let params = params
                        .iter()
                        .filter_map(|name| {
                            captures
                                .name(name)
                                .map(|m| (name.clone(), m.as_str().to_string()))
                        })
                        .collect();

                    return Flow::Respond(match value {
                        MockValue::Json(body) => MockResponse::json(body.clone()).into_response(),
                        MockValue::Handler(handler) => match mock_request(req, params).await {
                            Ok(request) => handler.call(request).await.into_response(),
                            Err(response) => response,
                        },
                        MockValue::Proxy(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                    });
                }
            }
        }
        Flow::Next(req)
    }
}

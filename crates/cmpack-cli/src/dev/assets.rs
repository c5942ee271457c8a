//! Static responses: compiled assets from memory and the public directory.

use crate::dev::stack::{Flow, Middleware};
use crate::dev::state::{content_type, SharedCache};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::{Component, Path, PathBuf};

fn is_read(req: &Request<Body>) -> bool {
    req.method() == Method::GET || req.method() == Method::HEAD
}

fn file_response(method: &Method, content: Vec<u8>, content_type: &'static str) -> Response {
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(content)
    };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Serves the bundler's development output from the in-memory cache.
pub struct AssetMiddleware {
    cache: SharedCache,
}

impl AssetMiddleware {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Middleware for AssetMiddleware {
    async fn handle(&self, req: Request<Body>) -> Flow {
        if !is_read(&req) {
            return Flow::Next(req);
        }
        let cached = self.cache.read().get(req.uri().path()).cloned();
        match cached {
            Some((content, kind)) => Flow::Respond(file_response(req.method(), content, kind)),
            None => Flow::Next(req),
        }
    }
}

/// Serves files from the project's `public` directory.
pub struct PublicMiddleware {
    root: PathBuf,
}

impl PublicMiddleware {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// File for a URL path; `None` for anything escaping the root.
    fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let rel = Path::new(url_path.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let path = self.root.join(rel);
        if path.is_dir() {
            Some(path.join("index.html"))
        } else {
            Some(path)
        }
    }
}

#[async_trait]
impl Middleware for PublicMiddleware {
    async fn handle(&self, req: Request<Body>) -> Flow {
        if !is_read(&req) {
            return Flow::Next(req);
        }
        let Some(path) = self.resolve(req.uri().path()) else {
            return Flow::Next(req);
        };
        match tokio::fs::read(&path).await {
            Ok(content) => {
                let kind = content_type(&path.to_string_lossy());
                Flow::Respond(file_response(req.method(), content, kind))
            }
            Err(_) => Flow::Next(req),
        }
    }
}

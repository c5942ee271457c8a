//! Shared state for the development server.
//!
//! Holds the compiled assets, connected reload clients, the current
//! middleware stack and the last mock error, behind parking_lot locks.

use crate::dev::stack::{Middleware, MiddlewareStack};
use crate::error::MockLoadError;
use crate::ui;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Message pushed to the reload client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DevEvent {
    /// Sources changed; a compile started
    Compiling,
    /// The compile failed
    Errors { errors: Vec<String> },
    /// A compile succeeded; reload the page
    Reload,
}

/// In-memory copy of the bundler's development output.
///
/// Keys are URL paths (public path plus file name).
#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    files: HashMap<String, (Vec<u8>, &'static str)>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file below `dir`, served under `public_path`.
    ///
    /// A missing directory gives an empty cache.
    pub fn load(dir: &Path, public_path: &str) -> std::io::Result<Self> {
        let mut cache = Self::new();
        if !dir.is_dir() {
            return Ok(cache);
        }

        let prefix = format!("/{}", public_path.trim_matches('/'));
        let prefix = prefix.trim_end_matches('/');
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            let url = format!("{prefix}/{rel}");
            let content = std::fs::read(entry.path())?;
            cache.insert(url.clone(), content, content_type(&url));
        }
        Ok(cache)
    }

    pub fn insert(&mut self, path: String, content: Vec<u8>, content_type: &'static str) {
        self.files.insert(path, (content, content_type));
    }

    pub fn get(&self, path: &str) -> Option<&(Vec<u8>, &'static str)> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Content type from the file extension.
pub fn content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "wasm" => "application/wasm",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

/// Asset cache shared between the state and the asset middlewares.
pub type SharedCache = Arc<RwLock<AssetCache>>;

/// Connected reload clients.
pub type ClientRegistry = RwLock<HashMap<usize, mpsc::Sender<String>>>;

/// Shared development server state.
pub struct DevServerState {
    cache: SharedCache,
    clients: ClientRegistry,
    next_client_id: RwLock<usize>,
    stack: RwLock<Arc<MiddlewareStack>>,
    mock_error: RwLock<Option<MockLoadError>>,
}

impl DevServerState {
    pub fn new(stack: MiddlewareStack) -> Self {
        Self {
            cache: Arc::new(RwLock::new(AssetCache::new())),
            clients: RwLock::new(HashMap::new()),
            next_client_id: RwLock::new(0),
            stack: RwLock::new(Arc::new(stack)),
            mock_error: RwLock::new(None),
        }
    }

    pub fn update_cache(&self, cache: AssetCache) {
        *self.cache.write() = cache;
    }

    pub fn cached_file(&self, path: &str) -> Option<(Vec<u8>, &'static str)> {
        self.cache.read().get(path).cloned()
    }

    /// Handle for middlewares serving the cache.
    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }

    /// Current middleware stack. Requests in flight keep the stack they
    /// started with.
    pub fn stack(&self) -> Arc<MiddlewareStack> {
        Arc::clone(&*self.stack.read())
    }

    pub fn set_stack(&self, stack: MiddlewareStack) {
        *self.stack.write() = Arc::new(stack);
    }

    /// Swap in a new layer list for group `name` (see
    /// [`MiddlewareStack::replace_or_insert_before`]).
    pub fn replace_group(
        &self,
        name: &'static str,
        before: &str,
        layers: Vec<Arc<dyn Middleware>>,
    ) {
        let mut guard = self.stack.write();
        let mut stack = MiddlewareStack::clone(&guard);
        stack.replace_or_insert_before(name, before, layers);
        *guard = Arc::new(stack);
    }

    pub fn set_mock_error(&self, error: Option<MockLoadError>) {
        *self.mock_error.write() = error;
    }

    pub fn mock_error(&self) -> Option<MockLoadError> {
        self.mock_error.read().clone()
    }

    /// Print the last mock error, if any.
    pub fn output_mock_error(&self) {
        if let Some(error) = self.mock_error() {
            ui::warning("Failed to parse mock config.");
            ui::error(&error.to_string());
        }
    }

    /// Register a new SSE client.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = {
            let mut next_id = self.next_client_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (tx, rx) = mpsc::channel(16);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    /// Send an event to every connected client, dropping the ones that left.
    pub async fn broadcast(&self, event: &DevEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("cannot encode reload event: {e}");
                return;
            }
        };

        let clients: Vec<_> = self
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut failed_ids = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                failed_ids.push(id);
            }
        }
        for id in failed_ids {
            self.unregister_client(id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

/// Shared state handle.
pub type SharedState = Arc<DevServerState>;

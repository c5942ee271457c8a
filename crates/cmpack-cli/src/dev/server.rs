//! HTTP server for `cmpack server`.
//!
//! One SSE route for the reload client; every other request goes through the
//! current [`MiddlewareStack`](crate::dev::stack::MiddlewareStack).

use crate::dev::state::SharedState;
use crate::error::{CliError, Result};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{
        sse::{Event, KeepAlive},
        Response, Sse,
    },
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::convert::Infallible;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

/// SSE endpoint the reload client connects to.
pub const RELOAD_PATH: &str = "/__cmpack_reload__";

const RELOAD_CLIENT: &str = include_str!("../../assets/reload-client.js");

/// Write the reload client where development entries expect it.
pub fn write_reload_client(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, RELOAD_CLIENT)
}

/// Router with the reload endpoint, compression and permissive CORS.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(handle_sse))
        .fallback(handle_request)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn handle_request(State(state): State<SharedState>, req: Request<Body>) -> Response {
    state.stack().dispatch(req).await
}

async fn handle_sse(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = state.register_client();
    tracing::debug!(id, "reload client connected");

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Self-signed certificate for `localhost` as (cert PEM, key PEM).
pub fn self_signed_pem() -> Result<(Vec<u8>, Vec<u8>)> {
    let certified = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .map_err(|e| CliError::Server(format!("cannot generate certificate: {e}")))?;
    Ok((
        certified.cert.pem().into_bytes(),
        certified.key_pair.serialize_pem().into_bytes(),
    ))
}

/// Serve `router` on an already bound listener until `handle` shuts it down.
///
/// With `https` a fresh self-signed certificate is used.
pub async fn serve(listener: TcpListener, router: Router, https: bool, handle: Handle) -> Result<()> {
    let service = router.into_make_service();
    let served = if https {
        // Errors when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let (cert, key) = self_signed_pem()?;
        let config = RustlsConfig::from_pem(cert, key)
            .await
            .map_err(|e| CliError::Server(format!("invalid TLS config: {e}")))?;
        axum_server::from_tcp_rustls(listener, config)
            .handle(handle)
            .serve(service)
            .await
    } else {
        axum_server::from_tcp(listener)
            .handle(handle)
            .serve(service)
            .await
    };
    served.map_err(|e| CliError::Server(format!("Server error: {e}")))
}

/// Open `url` in the default browser; failures are only logged.
pub fn open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let result = std::process::Command::new("open").arg(url).spawn();

    #[cfg(target_os = "windows")]
    let result = std::process::Command::new("cmd")
        .args(["/C", "start", url])
        .spawn();

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let result = std::process::Command::new("xdg-open").arg(url).spawn();

    if let Err(e) = result {
        tracing::debug!("could not open browser: {e}");
    }
}

//! Port selection for the dev server.

use std::net::TcpListener;

/// Ports tried after the preferred one.
pub const PORT_ATTEMPTS: u16 = 10;

/// Bind the first free port of `preferred..=preferred + PORT_ATTEMPTS`.
///
/// Returns the bound, non-blocking listener so the port cannot be taken
/// between the check and the server start. `None` when every port is busy.
pub fn choose_port(host: &str, preferred: u16) -> Option<TcpListener> {
    let last = preferred.saturating_add(PORT_ATTEMPTS);
    for port in preferred..=last {
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                if port != preferred {
                    tracing::debug!(preferred, port, "preferred port busy");
                }
                if listener.set_nonblocking(true).is_ok() {
                    return Some(listener);
                }
            }
            Err(e) => tracing::debug!(port, "cannot bind: {e}"),
        }
    }
    None
}

//! Development server.
//!
//! Requests run through an ordered [`MiddlewareStack`]: compiled assets,
//! configured proxies, mock routes, the history fallback, then the public
//! directory. The reload client listens on an SSE route and reloads the page
//! after each successful compile.

pub mod assets;
pub mod fallback;
pub mod mock;
pub mod port;
pub mod proxy;
pub mod server;
pub mod stack;
pub mod state;

pub use assets::{AssetMiddleware, PublicMiddleware};
pub use fallback::HistoryFallback;
pub use mock::{MockHandler, MockMiddleware, MockRequest, MockResponse, MockTable, MockValue};
pub use port::choose_port;
pub use proxy::{Forwarder, ProxyMiddleware};
pub use server::{router, serve, RELOAD_PATH};
pub use stack::{Flow, Middleware, MiddlewareStack};
pub use state::{AssetCache, DevEvent, DevServerState, SharedState};

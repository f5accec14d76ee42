//! # tmws-server
//!
//! The session and tool router: framed JSON protocol, per-session
//! current-agent context, a static tool dispatch table, and three
//! transports (stdio, WebSocket, REST).

pub mod bootstrap;
pub mod protocol;
pub mod session;
pub mod state;
pub mod tools;
pub mod transport;

pub use state::AppState;

//! WebSocket Session Management
//!
//! - `protocol`: the tag-prefixed text frames and binary audio frames sent to the client.
//! - `registry`: the set of connected sessions, keyed by session id.
//! - `session`: the connection lifecycle, from upgrade to teardown.

pub mod protocol;
pub mod registry;
pub mod session;

pub use session::ws_handler;

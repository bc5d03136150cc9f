//! Voice Relay API Library Crate
//!
//! Application state, conversation logging, REST handlers, the WebSocket
//! connection handler and routing. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;

//! plugbot - an extensible chat-bot host
//!
//! Plugins contribute event handlers, admin routes and dashboard tabs
//! through a shared context. The binary in `main.rs` wires the built-in
//! collaborators together.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::BotError;
pub use application::services::BotHost;
pub use infrastructure::config::Config;

//! Collaborator adapters - platform transport and admin route surface

pub mod console;
pub mod http;

pub use console::ConsoleTransport;
pub use http::RouteTable;

//! Domain traits - Abstractions for infrastructure implementations

pub mod routes;
pub mod store;
pub mod transport;

pub use routes::{route_fn, Method, RouteHandler, RouteRegistrar, RouteRequest, RouteResponse};
pub use store::Store;
pub use transport::{listener_fn, OutgoingMessage, Transport, TransportListener};

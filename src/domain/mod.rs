//! Domain layer - Core types with no knowledge of concrete backends
//! 
//! This layer contains:
//! - Entities: Events, dashboard tabs, plugin lifecycle states
//! - Traits: Abstractions for infrastructure (Store, Transport, RouteRegistrar)

pub mod entities;
pub mod traits;

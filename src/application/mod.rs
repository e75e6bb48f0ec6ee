//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Errors: Domain-specific errors
//! - Events: Internal publish/subscribe
//! - Dashboard: Admin tab registry
//! - Services: Host orchestration and task supervision

pub mod dashboard;
pub mod errors;
pub mod events;
pub mod services;

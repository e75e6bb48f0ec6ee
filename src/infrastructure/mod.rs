//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Data persistence
//! - Adapters: Chat transport and admin routes

pub mod adapters;
pub mod config;
pub mod storage;

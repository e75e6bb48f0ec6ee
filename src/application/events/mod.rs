//! Internal events - publish/subscribe between plugins

pub mod router;

pub use router::{DispatchReport, EventHandler, EventRouter, SubscriptionId};

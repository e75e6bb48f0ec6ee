//! Application services - Host wiring and task supervision

pub mod host;
pub mod supervisor;

pub use host::BotHost;
pub use supervisor::{ShutdownSignal, TaskSupervisor};

use serde::Serialize;
use std::fmt;

/// Lifecycle stages that run plugin hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStage {
    Register,
    RoutesBound,
    Started,
    Stopped,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleStage::Register => "register",
            LifecycleStage::RoutesBound => "routes-bound",
            LifecycleStage::Started => "started",
            LifecycleStage::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a plugin unit currently sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "stage")]
pub enum PluginState {
    Discovered,
    Registered,
    RoutesBound,
    Started,
    Stopped,
    /// Excluded from every later stage
    Failed(LifecycleStage),
}

impl PluginState {
    fn rank(&self) -> Option<u8> {
        match self {
            PluginState::Discovered => Some(0),
            PluginState::Registered => Some(1),
            PluginState::RoutesBound => Some(2),
            PluginState::Started => Some(3),
            PluginState::Stopped => Some(4),
            PluginState::Failed(_) => None,
        }
    }

    /// Transitions only move one step forward, or into `Failed` from a live state
    pub fn can_advance_to(&self, next: PluginState) -> bool {
        match (self.rank(), next.rank()) {
            (None, _) => false,
            (Some(4), _) => false,
            (Some(_), None) => true,
            (Some(current), Some(target)) => target == current + 1,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PluginState::Failed(_))
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Discovered => f.write_str("discovered"),
            PluginState::Registered => f.write_str("registered"),
            PluginState::RoutesBound => f.write_str("routes-bound"),
            PluginState::Started => f.write_str("started"),
            PluginState::Stopped => f.write_str("stopped"),
            PluginState::Failed(stage) => write!(f, "failed ({})", stage),
        }
    }
}

/// Plugin information for listing
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub key: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub source: String,
    pub state: PluginState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_only() {
        assert!(PluginState::Discovered.can_advance_to(PluginState::Registered));
        assert!(PluginState::Registered.can_advance_to(PluginState::RoutesBound));
        assert!(PluginState::Started.can_advance_to(PluginState::Stopped));
        assert!(!PluginState::Registered.can_advance_to(PluginState::Discovered));
        assert!(!PluginState::Discovered.can_advance_to(PluginState::Started));
        assert!(!PluginState::Stopped.can_advance_to(PluginState::Failed(LifecycleStage::Stopped)));
    }

    #[test]
    fn test_failed_is_terminal() {
        let failed = PluginState::Failed(LifecycleStage::Register);
        assert!(PluginState::Discovered.can_advance_to(failed));
        assert!(!failed.can_advance_to(PluginState::RoutesBound));
        assert!(failed.is_failed());
        assert_eq!(failed.to_string(), "failed (register)");
    }
}

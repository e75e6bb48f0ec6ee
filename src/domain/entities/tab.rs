use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default ordering weight for tabs that do not set one
pub const DEFAULT_TAB_ORDER: i32 = 100;

/// Metadata describing a navigable admin surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMetadata {
    pub label: String,
    pub template: String,
    pub description: String,
    pub icon: Option<String>,
    pub order: i32,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TabMetadata {
    pub fn new(label: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            template: template.into(),
            description: String::new(),
            icon: None,
            order: DEFAULT_TAB_ORDER,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A tab as stored in the dashboard registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardTab {
    pub namespace: String,
    pub tab_id: String,
    pub owner: String,
    pub metadata: TabMetadata,
}

impl DashboardTab {
    /// Path used by the admin surface, e.g. `hello/settings`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.namespace, self.tab_id)
    }
}

/// Result of resolving `namespace/tab_id` for the rendering collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTab {
    pub tab: DashboardTab,
    pub template_root: Option<PathBuf>,
}

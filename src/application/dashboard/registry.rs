//! Dashboard tab registry
//!
//! Plugins claim a namespace, attach a template root and declare tabs. The
//! registry renders nothing; the admin surface asks it to resolve
//! `namespace/tab_id`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::application::errors::{ConfigError, DashboardError};
use crate::domain::entities::{DashboardTab, ResolvedTab, TabMetadata};

#[derive(Default)]
struct Inner {
    owners: HashMap<String, String>,
    template_dirs: HashMap<String, PathBuf>,
    tabs: Vec<DashboardTab>,
    collisions: Vec<(String, String, String)>,
}

impl Inner {
    fn claim(&mut self, owner: &str, namespace: &str) -> Result<(), DashboardError> {
        match self.owners.get(namespace) {
            Some(existing) if existing != owner => {
                warn!(
                    "Dashboard namespace '{}' owned by '{}', rejected claim from '{}'",
                    namespace, existing, owner
                );
                let existing = existing.clone();
                self.collisions
                    .push((namespace.to_string(), existing.clone(), owner.to_string()));
                Err(DashboardError::NamespaceCollision {
                    namespace: namespace.to_string(),
                    owner: existing,
                })
            }
            Some(_) => Ok(()),
            None => {
                self.owners.insert(namespace.to_string(), owner.to_string());
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub struct DashboardRegistry {
    inner: RwLock<Inner>,
}

impl DashboardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration handle bound to one owner
    pub fn for_owner<'a>(&'a self, owner: &'a str) -> DashboardRegistrar<'a> {
        DashboardRegistrar {
            registry: self,
            owner,
        }
    }

    /// Associate a template root with a namespace. Repeating it is a no-op.
    pub fn add_template_dir(
        &self,
        owner: &str,
        namespace: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), DashboardError> {
        let path = path.as_ref();
        let resolved = std::fs::canonicalize(path)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| DashboardError::TemplateDirMissing(path.display().to_string()))?;

        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        inner.claim(owner, namespace)?;
        if inner.template_dirs.contains_key(namespace) {
            return Ok(());
        }
        debug!("Template root for '{}': {}", namespace, resolved.display());
        inner.template_dirs.insert(namespace.to_string(), resolved);
        Ok(())
    }

    /// Declare a navigable admin tab under `namespace`
    pub fn register_tab(
        &self,
        owner: &str,
        namespace: &str,
        tab_id: &str,
        metadata: TabMetadata,
    ) -> Result<(), DashboardError> {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        inner.claim(owner, namespace)?;

        if inner
            .tabs
            .iter()
            .any(|t| t.namespace == namespace && t.tab_id == tab_id)
        {
            return Err(DashboardError::DuplicateTab {
                namespace: namespace.to_string(),
                tab_id: tab_id.to_string(),
            });
        }

        inner.tabs.push(DashboardTab {
            namespace: namespace.to_string(),
            tab_id: tab_id.to_string(),
            owner: owner.to_string(),
            metadata,
        });
        inner
            .tabs
            .sort_by_cached_key(|t| (t.metadata.order, t.metadata.label.to_lowercase()));
        debug!("Registered dashboard tab {}/{} for '{}'", namespace, tab_id, owner);
        Ok(())
    }

    /// Fails with the first namespace collision seen during registration
    pub fn check_collisions(&self) -> Result<(), ConfigError> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
        match inner.collisions.first() {
            Some((namespace, owner, intruder)) => Err(ConfigError::NamespaceCollision {
                namespace: namespace.clone(),
                owner: owner.clone(),
                intruder: intruder.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn resolve_tab(&self, namespace: &str, tab_id: &str) -> Option<ResolvedTab> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
        let tab = inner
            .tabs
            .iter()
            .find(|t| t.namespace == namespace && t.tab_id == tab_id)?
            .clone();
        Some(ResolvedTab {
            template_root: inner.template_dirs.get(namespace).cloned(),
            tab,
        })
    }

    /// Resolve a `namespace/tab_id` slug; a bare namespace means its first tab
    pub fn resolve(&self, slug: &str) -> Option<ResolvedTab> {
        match slug.split_once('/') {
            Some((namespace, tab_id)) => self.resolve_tab(namespace, tab_id),
            None => {
                let tab_id = self
                    .tabs()
                    .into_iter()
                    .find(|t| t.namespace == slug)?
                    .tab_id;
                self.resolve_tab(slug, &tab_id)
            }
        }
    }

    /// Tabs ordered by weight, then label
    pub fn tabs(&self) -> Vec<DashboardTab> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
        inner.tabs.clone()
    }

    /// The tab the admin index opens on
    pub fn first_tab(&self) -> Option<DashboardTab> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
        inner.tabs.first().cloned()
    }
}

/// Dashboard access handed to one plugin
pub struct DashboardRegistrar<'a> {
    registry: &'a DashboardRegistry,
    owner: &'a str,
}

impl DashboardRegistrar<'_> {
    pub fn add_template_dir(
        &self,
        namespace: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), DashboardError> {
        self.registry.add_template_dir(self.owner, namespace, path)
    }

    pub fn register_tab(
        &self,
        namespace: &str,
        tab_id: &str,
        metadata: TabMetadata,
    ) -> Result<(), DashboardError> {
        self.registry.register_tab(self.owner, namespace, tab_id, metadata)
    }
}

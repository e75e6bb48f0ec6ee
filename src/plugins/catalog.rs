//! Plugin catalog - the compile-time replacement for scanning packages
//!
//! Each source is a named discovery root holding named units. A unit is a
//! factory producing the plugin instance.

use regex_lite::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::trait_def::Plugin;
use crate::application::errors::ConfigError;
use crate::application::services::host::HOST_OWNER;

/// Builds one plugin instance
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// A plugin produced by discovery, not yet registered
pub struct DiscoveredPlugin {
    pub source: String,
    pub unit: String,
    pub plugin: Box<dyn Plugin>,
}

impl DiscoveredPlugin {
    pub fn key(&self) -> &str {
        self.plugin.key()
    }

    /// `source/unit`, used in log lines and errors
    pub fn origin(&self) -> String {
        format!("{}/{}", self.source, self.unit)
    }
}

impl fmt::Debug for DiscoveredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveredPlugin")
            .field("origin", &self.origin())
            .field("key", &self.key())
            .finish()
    }
}

#[derive(Default, Clone)]
pub struct PluginCatalog {
    sources: BTreeMap<String, BTreeMap<String, PluginFactory>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the plugins shipped with the binary
    pub fn builtin() -> Self {
        Self::new().with("plugins", "hello", || {
            Box::new(super::hello::HelloPlugin::new()) as Box<dyn Plugin>
        })
    }

    /// Add a unit under `source`; a unit with the same name is replaced
    pub fn with<F>(mut self, source: &str, unit: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.add(source, unit, factory);
        self
    }

    pub fn add<F>(&mut self, source: &str, unit: &str, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.sources
            .entry(source.to_string())
            .or_default()
            .insert(unit.to_string(), Arc::new(factory));
    }

    /// Instantiate every valid unit of `sources`.
    ///
    /// Sources are visited in the given order, units within a source in
    /// lexical order, so the result is the same on every run.
    pub fn discover(&self, sources: &[String]) -> Result<Vec<DiscoveredPlugin>, ConfigError> {
        let key_pattern = Regex::new(r"^[a-z0-9][a-z0-9_-]*$")
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        let mut discovered: Vec<DiscoveredPlugin> = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for source in sources {
            let units = self
                .sources
                .get(source)
                .ok_or_else(|| ConfigError::UnknownSource(source.clone()))?;

            for (unit, factory) in units {
                if unit.starts_with('_') {
                    debug!("Skipping private unit {}/{}", source, unit);
                    continue;
                }

                let candidate = DiscoveredPlugin {
                    source: source.clone(),
                    unit: unit.clone(),
                    plugin: factory(),
                };
                let key = candidate.key().to_string();

                if !key_pattern.is_match(&key) {
                    warn!(
                        "Unit {} does not expose a valid plugin key ('{}'); skipping",
                        candidate.origin(),
                        key
                    );
                    continue;
                }

                if key == HOST_OWNER {
                    return Err(ConfigError::ReservedKey {
                        key,
                        origin: candidate.origin(),
                    });
                }

                if let Some(first) = seen.get(&key) {
                    return Err(ConfigError::DuplicatePlugin {
                        key,
                        first: first.clone(),
                        second: candidate.origin(),
                    });
                }

                seen.insert(key, candidate.origin());
                discovered.push(candidate);
            }
        }

        Ok(discovered)
    }
}

/// Apply the allow-list, or each plugin's own default when it is empty
pub fn filter_enabled(
    discovered: Vec<DiscoveredPlugin>,
    enabled: &[String],
) -> Result<Vec<DiscoveredPlugin>, ConfigError> {
    if enabled.is_empty() {
        return Ok(discovered
            .into_iter()
            .filter(|p| {
                let keep = p.plugin.enabled_by_default();
                if !keep {
                    info!("Plugin {} disabled by default", p.key());
                }
                keep
            })
            .collect());
    }

    if let Some(missing) = enabled
        .iter()
        .find(|key| !discovered.iter().any(|p| p.key() == key.as_str()))
    {
        return Err(ConfigError::UnknownPlugin(missing.clone()));
    }

    Ok(discovered
        .into_iter()
        .filter(|p| {
            let keep = enabled.iter().any(|key| key == p.key());
            if !keep {
                info!("Plugin {} disabled via configuration", p.key());
            }
            keep
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        key: &'static str,
        default_on: bool,
    }

    impl Plugin for Stub {
        fn key(&self) -> &str {
            self.key
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn enabled_by_default(&self) -> bool {
            self.default_on
        }
    }

    fn stub(key: &'static str, default_on: bool) -> impl Fn() -> Box<dyn Plugin> + Send + Sync {
        move || Box::new(Stub { key, default_on }) as Box<dyn Plugin>
    }

    fn keys(plugins: &[DiscoveredPlugin]) -> Vec<&str> {
        plugins.iter().map(|p| p.key()).collect()
    }

    fn catalog() -> PluginCatalog {
        PluginCatalog::new()
            .with("plugins", "c", stub("c", true))
            .with("plugins", "a", stub("a", true))
            .with("plugins", "b", stub("b", false))
            .with("plugins", "_scratch", stub("scratch", true))
            .with("contrib", "a_zeta", stub("zeta", true))
            .with("contrib", "broken", stub("Not A Key", true))
    }

    #[test]
    fn test_discovery_order_is_deterministic() {
        let sources = vec!["contrib".to_string(), "plugins".to_string()];
        let found = catalog().discover(&sources).unwrap();
        assert_eq!(keys(&found), vec!["zeta", "a", "b", "c"]);
        assert_eq!(found[1].origin(), "plugins/a");
    }

    #[test]
    fn test_unknown_source_is_config_error() {
        let result = catalog().discover(&["nowhere".to_string()]);
        assert!(matches!(result, Err(ConfigError::UnknownSource(s)) if s == "nowhere"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let catalog = catalog().with("contrib", "again", stub("a", true));
        let result = catalog.discover(&["plugins".to_string(), "contrib".to_string()]);
        assert!(matches!(result, Err(ConfigError::DuplicatePlugin { key, .. }) if key == "a"));
    }

    #[test]
    fn test_host_key_is_reserved() {
        let catalog = catalog().with("contrib", "impostor", stub("host", true));
        let result = catalog.discover(&["contrib".to_string()]);
        assert!(matches!(
            result,
            Err(ConfigError::ReservedKey { key, origin }) if key == "host" && origin == "contrib/impostor"
        ));
    }

    #[test]
    fn test_allow_list_filters_in_discovery_order() {
        let found = catalog().discover(&["plugins".to_string()]).unwrap();
        let enabled = vec!["c".to_string(), "a".to_string()];
        let kept = filter_enabled(found, &enabled).unwrap();
        assert_eq!(keys(&kept), vec!["a", "c"]);
    }

    #[test]
    fn test_allow_list_enables_default_off_plugins() {
        let found = catalog().discover(&["plugins".to_string()]).unwrap();
        let kept = filter_enabled(found, &["b".to_string()]).unwrap();
        assert_eq!(keys(&kept), vec!["b"]);
    }

    #[test]
    fn test_unknown_allow_list_key_is_config_error() {
        let found = catalog().discover(&["plugins".to_string()]).unwrap();
        let result = filter_enabled(found, &["z".to_string()]);
        assert!(matches!(result, Err(ConfigError::UnknownPlugin(k)) if k == "z"));
    }

    #[test]
    fn test_empty_allow_list_uses_defaults() {
        let found = catalog().discover(&["plugins".to_string()]).unwrap();
        let kept = filter_enabled(found, &[]).unwrap();
        assert_eq!(keys(&kept), vec!["a", "c"]);
    }
}

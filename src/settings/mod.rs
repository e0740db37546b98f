//! Process-wide group configuration store.
//!
//! The store is loaded once from a TOML file and shared read-only between
//! requests. Each `[thumbers.<key>]` table defines one group; an optional
//! `[defaults]` table is merged underneath every group so common settings are
//! written once:
//!
//! ```toml
//! [defaults]
//! max_width = 2000
//! max_height = 2000
//! quality = 100
//!
//! [thumbers.d]
//! source_path = '/srv/upload'
//! thumb_cache_path = '/srv/thumb'
//! cache = true
//!
//! [thumbers.e]
//! source_path = '/srv/upload'
//! allow_sizes = ['100*100', '200*100']
//! ```

mod group;
mod tree;

pub use group::{
    DebugLevel, GroupConfig, PngOptimizeConfig, Position, TextWatermark, WatermarkConfig,
    DEFAULT_FILE_ENCODING, DEFAULT_QUALITY,
};
pub use tree::{ConfigTree, ConfigValue};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigError;

/// Failure presentation used before a request has been matched to a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackPolicy {
    pub debug: DebugLevel,
    pub error_url: Option<PathBuf>,
}

/// All configured groups, keyed by group key.
#[derive(Debug, Clone)]
pub struct Settings {
    groups: BTreeMap<String, Arc<GroupConfig>>,
    fallback: FallbackPolicy,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::from_tree(&ConfigTree::from_toml_str(source)?)
    }

    /// Build settings from an already parsed tree.
    pub fn from_tree(root: &ConfigTree) -> Result<Self, ConfigError> {
        let defaults = root.get_group("defaults")?.cloned().unwrap_or_default();
        let thumbers = root
            .get_group("thumbers")?
            .ok_or_else(|| ConfigError::Missing("thumbers".to_string()))?;

        let mut groups = BTreeMap::new();
        for (key, value) in thumbers.iter() {
            let ConfigValue::Tree(overrides) = value else {
                return Err(ConfigError::Type {
                    key: format!("thumbers.{}", key),
                    expected: "a table",
                });
            };
            let merged = defaults.merged_with(overrides);
            let group = GroupConfig::from_tree(key, &merged)?;
            groups.insert(key.to_string(), Arc::new(group));
        }

        if groups.is_empty() {
            return Err(ConfigError::Invalid {
                key: "thumbers".to_string(),
                message: "at least one group must be configured".to_string(),
            });
        }

        let fallback = FallbackPolicy {
            debug: DebugLevel::from_tree(&defaults, "defaults.debug")?,
            error_url: defaults
                .get_str("error_url")?
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };

        Ok(Self { groups, fallback })
    }

    /// Look up a group by key.
    pub fn group(&self, key: &str) -> Option<Arc<GroupConfig>> {
        self.groups.get(key).cloned()
    }

    /// Iterate over all groups in key order.
    pub fn groups(&self) -> impl Iterator<Item = &Arc<GroupConfig>> {
        self.groups.values()
    }

    /// Failure presentation for requests that never matched a group.
    pub fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [defaults]
        debug = 1
        max_width = 2000
        max_height = 2000
        error_url = '/srv/error.png'

        [thumbers.d]
        source_path = '/srv/upload'

        [thumbers.e]
        source_path = '/srv/other'
        max_width = 640
        debug = 2
    "#;

    #[test]
    fn test_defaults_merge_into_groups() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();

        let d = settings.group("d").unwrap();
        assert_eq!(d.max_width, Some(2000));
        assert_eq!(d.debug, DebugLevel::Header);
        assert_eq!(d.error_url, Some(PathBuf::from("/srv/error.png")));

        let e = settings.group("e").unwrap();
        assert_eq!(e.max_width, Some(640));
        assert_eq!(e.max_height, Some(2000));
        assert_eq!(e.debug, DebugLevel::Raise);
    }

    #[test]
    fn test_unknown_group() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert!(settings.group("zzz").is_none());
        assert_eq!(settings.groups().count(), 2);
    }

    #[test]
    fn test_fallback_policy_from_defaults() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.fallback().debug, DebugLevel::Header);
        assert_eq!(
            settings.fallback().error_url,
            Some(PathBuf::from("/srv/error.png"))
        );
    }

    #[test]
    fn test_invalid_default_debug_rejected() {
        // The group overrides debug, so only the fallback policy sees the bad value
        let toml = "[defaults]\ndebug = 5\n\n[thumbers.d]\nsource_path = '/srv'\ndebug = 0\n";
        match Settings::from_toml_str(toml) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "defaults.debug"),
            other => panic!("expected invalid defaults.debug, got {:?}", other),
        }
    }

    #[test]
    fn test_default_debug_defaults_to_silent() {
        let toml = "[thumbers.d]\nsource_path = '/srv'\n";
        let settings = Settings::from_toml_str(toml).unwrap();
        assert_eq!(settings.fallback().debug, DebugLevel::Silent);
    }

    #[test]
    fn test_missing_thumbers() {
        assert!(matches!(
            Settings::from_toml_str("[defaults]\nquality = 90"),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_group_must_be_table() {
        assert!(matches!(
            Settings::from_toml_str("[thumbers]\nd = 1"),
            Err(ConfigError::Type { .. })
        ));
    }

    #[test]
    fn test_empty_thumbers() {
        assert!(Settings::from_toml_str("[thumbers]").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Settings::load("/definitely/not/here.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}

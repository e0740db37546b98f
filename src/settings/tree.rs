//! Immutable configuration tree.
//!
//! A [`ConfigTree`] maps string keys to scalars, lists, or nested trees. It is
//! built once from a TOML document and never mutated afterwards. Lookups accept
//! dotted paths (`"watermark.font_size"`) and every typed accessor returns
//! `Ok(None)` for a missing key and `Err` for a key of the wrong type, so
//! callers decide explicitly what absence means.

use std::collections::BTreeMap;

use crate::error::ConfigError;

// =============================================================================
// Values
// =============================================================================

/// A single value in the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    Tree(ConfigTree),
}

impl ConfigValue {
    fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Str(_) => "a string",
            ConfigValue::Int(_) => "an integer",
            ConfigValue::Float(_) => "a float",
            ConfigValue::Bool(_) => "a boolean",
            ConfigValue::List(_) => "a list",
            ConfigValue::Tree(_) => "a table",
        }
    }
}

impl From<toml::Value> for ConfigValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::Str(s),
            toml::Value::Integer(i) => ConfigValue::Int(i),
            toml::Value::Float(f) => ConfigValue::Float(f),
            toml::Value::Boolean(b) => ConfigValue::Bool(b),
            toml::Value::Datetime(d) => ConfigValue::Str(d.to_string()),
            toml::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from).collect())
            }
            toml::Value::Table(table) => ConfigValue::Tree(ConfigTree::from(table)),
        }
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Read-only keyed configuration tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    entries: BTreeMap<String, ConfigValue>,
}

impl From<toml::Table> for ConfigTree {
    fn from(table: toml::Table) -> Self {
        Self {
            entries: table
                .into_iter()
                .map(|(k, v)| (k, ConfigValue::from(v)))
                .collect(),
        }
    }
}

impl ConfigTree {
    /// Parse a TOML document into a tree.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = source
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        Ok(Self::from(table))
    }

    /// Returns true if the tree has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the top-level keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a value by dotted path.
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        let mut parts = path.split('.');
        let mut current = self.entries.get(parts.next()?)?;
        for part in parts {
            match current {
                ConfigValue::Tree(tree) => current = tree.entries.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Returns a copy of `self` with `overrides` layered on top.
    ///
    /// Nested tables are merged key by key; any other value in `overrides`
    /// replaces the base value outright.
    pub fn merged_with(&self, overrides: &ConfigTree) -> ConfigTree {
        let mut entries = self.entries.clone();
        for (key, value) in &overrides.entries {
            let merged = match (entries.get(key), value) {
                (Some(ConfigValue::Tree(base)), ConfigValue::Tree(over)) => {
                    ConfigValue::Tree(base.merged_with(over))
                }
                _ => value.clone(),
            };
            entries.insert(key.clone(), merged);
        }
        ConfigTree { entries }
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    /// Get a string value. Numbers are not coerced.
    pub fn get_str(&self, path: &str) -> Result<Option<&str>, ConfigError> {
        match self.get(path) {
            None => Ok(None),
            Some(ConfigValue::Str(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_error(path, "a string", other)),
        }
    }

    /// Get an integer value. Integral floats are accepted.
    pub fn get_int(&self, path: &str) -> Result<Option<i64>, ConfigError> {
        match self.get(path) {
            None => Ok(None),
            Some(ConfigValue::Int(i)) => Ok(Some(*i)),
            Some(ConfigValue::Float(f)) if f.fract() == 0.0 => Ok(Some(*f as i64)),
            Some(other) => Err(type_error(path, "an integer", other)),
        }
    }

    /// Get a float value. Integers are widened.
    pub fn get_float(&self, path: &str) -> Result<Option<f64>, ConfigError> {
        match self.get(path) {
            None => Ok(None),
            Some(ConfigValue::Float(f)) => Ok(Some(*f)),
            Some(ConfigValue::Int(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(type_error(path, "a number", other)),
        }
    }

    /// Get a boolean value. The integers 0 and 1 are accepted as flags.
    pub fn get_bool(&self, path: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(path) {
            None => Ok(None),
            Some(ConfigValue::Bool(b)) => Ok(Some(*b)),
            Some(ConfigValue::Int(0)) => Ok(Some(false)),
            Some(ConfigValue::Int(1)) => Ok(Some(true)),
            Some(other) => Err(type_error(path, "a boolean", other)),
        }
    }

    /// Get a nested tree.
    pub fn get_group(&self, path: &str) -> Result<Option<&ConfigTree>, ConfigError> {
        match self.get(path) {
            None => Ok(None),
            Some(ConfigValue::Tree(tree)) => Ok(Some(tree)),
            Some(other) => Err(type_error(path, "a table", other)),
        }
    }

    /// Get a list of strings.
    pub fn get_str_list(&self, path: &str) -> Result<Option<Vec<String>>, ConfigError> {
        match self.get(path) {
            None => Ok(None),
            Some(ConfigValue::List(items)) => items
                .iter()
                .map(|item| match item {
                    ConfigValue::Str(s) => Ok(s.clone()),
                    other => Err(type_error(path, "a list of strings", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(type_error(path, "a list of strings", other)),
        }
    }
}

fn type_error(path: &str, expected: &'static str, found: &ConfigValue) -> ConfigError {
    tracing::debug!(key = path, found = found.type_name(), "Config type mismatch");
    ConfigError::Type {
        key: path.to_string(),
        expected,
    }
}

// =============================================================================
// Tests
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Prefix of the environment variables read by [`ContainerConfig::from_env`]
pub const ENV_PREFIX: &str = "CHIMERA_DI_";

/// How a `Scoped` service is treated when resolved without an active scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopedResolutionPolicy {
    /// Fail with [`CoreError::ScopeRequired`]
    #[default]
    Reject,
    /// Cache the instance on the container, exactly like a singleton
    Singleton,
}

/// How concurrent first-time singleton resolutions are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SingletonConstruction {
    /// Racing threads may each build an instance; only the first one stored
    /// is kept and the others are dropped.
    #[default]
    Optimistic,
    /// Construction of each singleton descriptor is serialized with a lock,
    /// for services whose constructors have side effects.
    Serialized,
}

/// Runtime settings of a [`Container`](crate::container::Container)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Maximum depth of nested resolutions before giving up
    pub max_resolution_depth: usize,
    pub scoped_resolution: ScopedResolutionPolicy,
    pub singleton_construction: SingletonConstruction,
    /// Whether top-level resolutions are counted and timed
    pub track_performance: bool,
    /// Number of recent resolutions averaged by the latency statistic
    pub stats_window: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 64,
            scoped_resolution: ScopedResolutionPolicy::Reject,
            singleton_construction: SingletonConstruction::Optimistic,
            track_performance: true,
            stats_window: 128,
        }
    }
}

impl ContainerConfig {
    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(source: &str) -> Result<Self, CoreError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing keys keep their defaults
    pub fn from_json_str(source: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from `CHIMERA_DI_*` environment variables
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Keys are the upper-case field names prefixed with [`ENV_PREFIX`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("MAX_RESOLUTION_DEPTH") {
            config.max_resolution_depth = parse_number("MAX_RESOLUTION_DEPTH", &value)?;
        }
        if let Some(value) = var("SCOPED_RESOLUTION") {
            config.scoped_resolution = match value.trim().to_lowercase().as_str() {
                "reject" => ScopedResolutionPolicy::Reject,
                "singleton" => ScopedResolutionPolicy::Singleton,
                other => {
                    return Err(CoreError::configuration(format!(
                        "{}SCOPED_RESOLUTION must be 'reject' or 'singleton', got '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(value) = var("SINGLETON_CONSTRUCTION") {
            config.singleton_construction = match value.trim().to_lowercase().as_str() {
                "optimistic" => SingletonConstruction::Optimistic,
                "serialized" => SingletonConstruction::Serialized,
                other => {
                    return Err(CoreError::configuration(format!(
                        "{}SINGLETON_CONSTRUCTION must be 'optimistic' or 'serialized', got '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(value) = var("TRACK_PERFORMANCE") {
            config.track_performance = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(CoreError::configuration(format!(
                        "{}TRACK_PERFORMANCE is not a boolean: '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(value) = var("STATS_WINDOW") {
            config.stats_window = parse_number("STATS_WINDOW", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the container cannot operate with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_resolution_depth == 0 {
            return Err(CoreError::configuration(
                "max_resolution_depth must be greater than zero",
            ));
        }
        if self.track_performance && self.stats_window == 0 {
            return Err(CoreError::configuration(
                "stats_window must be greater than zero when performance tracking is enabled",
            ));
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, CoreError> {
    value.trim().parse().map_err(|_| {
        CoreError::configuration(format!(
            "{}{} is not a valid number: '{}'",
            ENV_PREFIX, name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_yaml_overrides_keep_defaults() {
        let config = ContainerConfig::from_yaml_str(
            "max_resolution_depth: 16\nscoped_resolution: singleton\n",
        )
        .unwrap();

        assert_eq!(config.max_resolution_depth, 16);
        assert_eq!(config.scoped_resolution, ScopedResolutionPolicy::Singleton);
        assert_eq!(config.singleton_construction, SingletonConstruction::Optimistic);
        assert!(config.track_performance);
    }

    #[test]
    fn test_json_config() {
        let config = ContainerConfig::from_json_str(
            r#"{"singleton_construction": "serialized", "track_performance": false}"#,
        )
        .unwrap();

        assert_eq!(config.singleton_construction, SingletonConstruction::Serialized);
        assert!(!config.track_performance);
        assert_eq!(config.max_resolution_depth, 64);
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let error = ContainerConfig::from_yaml_str("max_resolution_depth: 0").unwrap_err();
        assert!(matches!(error, CoreError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let error = ContainerConfig::from_yaml_str("scoped_resolution: sometimes").unwrap_err();
        assert!(matches!(error, CoreError::Yaml(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<String, String> = [
            ("CHIMERA_DI_MAX_RESOLUTION_DEPTH", "8"),
            ("CHIMERA_DI_SCOPED_RESOLUTION", "Singleton"),
            ("CHIMERA_DI_TRACK_PERFORMANCE", "off"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ContainerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.max_resolution_depth, 8);
        assert_eq!(config.scoped_resolution, ScopedResolutionPolicy::Singleton);
        assert!(!config.track_performance);
        assert_eq!(config.stats_window, 128);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let error = ContainerConfig::from_lookup(|key| {
            (key == "CHIMERA_DI_STATS_WINDOW").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(error.to_string().contains("CHIMERA_DI_STATS_WINDOW"));
    }
}

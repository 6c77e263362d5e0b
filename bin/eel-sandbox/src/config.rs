use std::path::Path;

use eel::DeniedCallPolicy;
use figment::{
    error::Kind,
    providers::{Env, Format as _, Yaml},
    Figment,
};
use serde::Deserialize;
use snafu::Snafu;

/// Prefix for environment variables that override configuration, e.g. `EEL_CACHE_CAPACITY`.
const ENV_PREFIX: &str = "EEL_";

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// A field held a value of the wrong type.
    #[snafu(display("Expected value for field '{}' to be '{}', got '{}' instead.", field, expected_ty, actual_ty))]
    InvalidFieldType {
        /// Period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Any other failure to load configuration.
    #[snafu(display("Failed to load configuration."))]
    Generic {
        /// Error source.
        source: figment::Error,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e },
        }
    }
}

/// Which evaluator runs expressions.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Walk the syntax tree on every evaluation.
    #[default]
    Interpret,

    /// Compile once through the expression cache, then invoke.
    Compile,
}

/// Sandbox configuration.
///
/// Loaded from built-in defaults, then an optional YAML file, then `EEL_`-prefixed environment variables, with later
/// sources taking precedence.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Default log filter, used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Maximum number of compiled expressions kept by the cache.
    pub cache_capacity: usize,

    /// What happens when a protected context rejects a method call.
    pub denied_calls: DeniedCallPolicy,

    /// Default evaluator.
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_capacity: 1024,
            denied_calls: DeniedCallPolicy::default(),
            mode: Mode::default(),
        }
    }
}

impl Config {
    /// Loads the configuration, reading `path` as YAML if given.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or parsed, or a value has the wrong type, an error is returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigurationError> {
        figment.extract().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> Result<Config, ConfigurationError> {
        Config::from_figment(Figment::new().merge(Yaml::string(yaml)))
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        assert_eq!(Config::from_figment(Figment::new()).unwrap(), Config::default());

        let config = from_yaml("cache_capacity: 16\nmode: compile").unwrap();
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.mode, Mode::Compile);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.denied_calls, DeniedCallPolicy::Error);
    }

    #[test]
    fn denied_call_policy() {
        let config = from_yaml("denied_calls: null_value").unwrap_err();
        assert!(matches!(config, ConfigurationError::Generic { .. }));

        let config = from_yaml("denied_calls: \"null\"").unwrap();
        assert_eq!(config.denied_calls, DeniedCallPolicy::Null);
    }

    #[test]
    fn invalid_types_name_the_field() {
        let err = from_yaml("cache_capacity: lots").unwrap_err();
        match err {
            ConfigurationError::InvalidFieldType { field, .. } => assert_eq!(field, "cache_capacity"),
            other => panic!("unexpected error: {}", other),
        }
    }
}

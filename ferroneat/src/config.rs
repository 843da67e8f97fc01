//! Key-based hyperparameter lookup.
//!
//! Hyperparameters are read from a flat TOML document whose
//! top-level keys name each parameter, e.g.
//!
//! ```toml
//! amountOfMutationRolls = 3
//! mutationSpeed = 0.5
//! ```
//!
//! Lookups never fail: a missing or malformed key is logged
//! and read as zero, empty or `false`.
use log::warn;
use toml::{Table, Value};

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Errors raised while reading a configuration source.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A parsed set of named hyperparameters.
#[derive(Clone, Debug, Default)]
pub struct ConfigLoader {
    values: Table,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Returns a loader with no keys. Every lookup
    /// yields its default.
    pub fn empty() -> ConfigLoader {
        ConfigLoader::default()
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or
    /// is not valid TOML.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<ConfigLoader> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut loader: ConfigLoader = content.parse()?;
        loader.source = Some(path.to_path_buf());
        Ok(loader)
    }

    /// Returns the file this loader was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Looks up an integer. Numeric strings are parsed.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::config::ConfigLoader;
    ///
    /// let loader: ConfigLoader = "amountOfMutationRolls = 3".parse().unwrap();
    /// assert_eq!(loader.get_int("amountOfMutationRolls"), 3);
    /// assert_eq!(loader.get_int("missing"), 0);
    /// ```
    pub fn get_int(&self, key: &str) -> i64 {
        match self.lookup(key) {
            Some(Value::Integer(i)) => *i,
            Some(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| malformed(key, s, 0)),
            Some(other) => malformed(key, other, 0),
            None => 0,
        }
    }

    /// Looks up a real number. Integers and numeric
    /// strings are accepted.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::config::ConfigLoader;
    ///
    /// let loader: ConfigLoader = "mutationSpeed = 1\ndeltaThreshold = \"0.25\"".parse().unwrap();
    /// assert_eq!(loader.get_double("mutationSpeed"), 1.0);
    /// assert_eq!(loader.get_double("deltaThreshold"), 0.25);
    /// ```
    pub fn get_double(&self, key: &str) -> f64 {
        match self.lookup(key) {
            Some(Value::Float(f)) => *f,
            Some(Value::Integer(i)) => *i as f64,
            Some(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| malformed(key, s, 0.0)),
            Some(other) => malformed(key, other, 0.0),
            None => 0.0,
        }
    }

    /// Looks up a string. Non-string values are
    /// returned in their TOML representation.
    pub fn get_string(&self, key: &str) -> String {
        match self.lookup(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Looks up a boolean. The strings `"true"` and
    /// `"false"` are accepted.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.lookup(key) {
            Some(Value::Boolean(b)) => *b,
            Some(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| malformed(key, s, false)),
            Some(other) => malformed(key, other, false),
            None => false,
        }
    }

    /// Looks up a non-negative integer. Negative
    /// values are logged and read as zero.
    pub(crate) fn get_count(&self, key: &str) -> usize {
        let value = self.get_int(key);
        usize::try_from(value).unwrap_or_else(|_| malformed(key, value, 0))
    }

    /// Looks up a strictly positive integer. There is
    /// no sensible default for these keys, so a bad
    /// value is an error.
    pub(crate) fn get_non_zero(&self, key: &str) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.get_count(key)).ok_or_else(|| ConfigError::Invalid {
            key: key.to_owned(),
            reason: "expected a positive integer".to_owned(),
        })
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let value = self.values.get(key);
        if value.is_none() {
            warn!("config key {key:?} is missing, using default");
        }
        value
    }
}

impl FromStr for ConfigLoader {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<ConfigLoader> {
        Ok(ConfigLoader {
            values: s.parse::<Table>()?,
            source: None,
        })
    }
}

fn malformed<V: std::fmt::Display, T>(key: &str, value: V, default: T) -> T {
    warn!("config key {key:?} has malformed value {value}, using default");
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn malformed_values_default_to_zero() {
        let loader: ConfigLoader = r#"
            rolls = "three"
            speed = true
            name = "xor"
            negative = -4
        "#
        .parse()
        .unwrap();
        assert_eq!(loader.get_int("rolls"), 0);
        assert_eq!(loader.get_double("speed"), 0.0);
        assert_eq!(loader.get_int("name"), 0);
        assert_eq!(loader.get_string("name"), "xor");
        assert_eq!(loader.get_count("negative"), 0);
        assert_eq!(loader.get_int("negative"), -4);
    }

    #[test]
    fn missing_keys_read_as_defaults() {
        let loader = ConfigLoader::empty();
        assert_eq!(loader.get_int("anything"), 0);
        assert_eq!(loader.get_double("anything"), 0.0);
        assert_eq!(loader.get_string("anything"), "");
        assert!(!loader.get_bool("anything"));
        assert!(loader.get_non_zero("anything").is_err());
    }

    #[test]
    fn strings_are_parsed_as_numbers() {
        let loader: ConfigLoader = "a = \" 12 \"\nb = \"0.5\"\nc = \"true\"".parse().unwrap();
        assert_eq!(loader.get_int("a"), 12);
        assert_eq!(loader.get_double("b"), 0.5);
        assert!(loader.get_bool("c"));
    }

    #[test]
    fn from_file_records_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "populationSize = 150").unwrap();
        let loader = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(loader.get_int("populationSize"), 150);
        assert_eq!(loader.source(), Some(file.path()));
    }

    #[test]
    fn from_file_reports_syntax_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "populationSize = = 150").unwrap();
        assert!(matches!(
            ConfigLoader::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}

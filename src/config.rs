use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

pub const DEFAULT_STATE_PATH: &str = "refledger-state.json";

/// Settings read from the optional `--config` TOML file. Flags given on the
/// command line win over these.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub state_path: PathBuf,
    /// `tracing-subscriber` filter directive, e.g. `info` or
    /// `referral_ledger=debug`.
    pub log_level: String,
    /// Keep only the newest this many events in the state file. Unset keeps
    /// the whole history.
    pub max_events: Option<usize>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            log_level: "info".to_string(),
            max_events: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let raw = r#"state_path = "data/points.json""#;
        let config: CliConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.state_path, PathBuf::from("data/points.json"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_events, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<CliConfig>("state = \"x\"").is_err());
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refledger.toml");
        let raw = "log_level = \"debug\"\nmax_events = 100\n";
        fs::write(&path, raw).unwrap();
        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_events, Some(100));
        assert_eq!(config.state_path, PathBuf::from(DEFAULT_STATE_PATH));

        let missing = dir.path().join("missing.toml");
        let err = CliConfig::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

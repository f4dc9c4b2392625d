//! CLI configuration (`~/.fieldbook/config.toml`)

use std::path::{Path, PathBuf};

use anyhow::Context;
use fieldbook_core::ProjectLimits;
use fieldbook_ingest::IngestConfig;
use fieldbook_server::config::DEFAULT_ADDR;
use fieldbook_server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fieldbook")
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the database lives; `~/.fieldbook` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    pub server_addr: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_token: Option<String>,

    /// Pause after each successful upload
    pub throttle_ms: u64,

    pub limits: ProjectLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            server_addr: DEFAULT_ADDR.to_string(),
            import_token: None,
            throttle_ms: IngestConfig::default().throttle_ms,
            limits: ProjectLimits::default(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Keys accepted by `config get` and `config set`
    pub fn keys() -> &'static [&'static str] {
        &[
            "data_dir",
            "server_addr",
            "import_token",
            "throttle_ms",
            "limits.forms",
            "limits.inputs",
            "limits.titles",
            "limits.search_inputs",
            "limits.possible_answers",
            "limits.search_possible_answers",
        ]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "data_dir" => self.data_dir.as_ref().map(|p| p.display().to_string()),
            "server_addr" => Some(self.server_addr.clone()),
            "import_token" => self.import_token.clone(),
            "throttle_ms" => Some(self.throttle_ms.to_string()),
            "limits.forms" => Some(self.limits.forms.to_string()),
            "limits.inputs" => Some(self.limits.inputs.to_string()),
            "limits.titles" => Some(self.limits.titles.to_string()),
            "limits.search_inputs" => Some(self.limits.search_inputs.to_string()),
            "limits.possible_answers" => Some(self.limits.possible_answers.to_string()),
            "limits.search_possible_answers" => Some(self.limits.search_possible_answers.to_string()),
            _ => return None,
        };
        Some(value.unwrap_or_default())
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let number = || {
            value
                .parse::<usize>()
                .with_context(|| format!("{} expects a number, got '{}'", key, value))
        };
        match key {
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            "server_addr" => self.server_addr = value.to_string(),
            "import_token" => self.import_token = (!value.is_empty()).then(|| value.to_string()),
            "throttle_ms" => self.throttle_ms = number()? as u64,
            "limits.forms" => self.limits.forms = number()?,
            "limits.inputs" => self.limits.inputs = number()?,
            "limits.titles" => self.limits.titles = number()?,
            "limits.search_inputs" => self.limits.search_inputs = number()?,
            "limits.possible_answers" => self.limits.possible_answers = number()?,
            "limits.search_possible_answers" => self.limits.search_possible_answers = number()?,
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            throttle_ms: self.throttle_ms,
        }
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            addr: self.server_addr.clone(),
            import_token: self.import_token.clone(),
            ingest: self.ingest(),
            ..ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_set_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("limits.inputs", "10").unwrap();
        config.set("import_token", "s3cret").unwrap();
        config.set("throttle_ms", "0").unwrap();
        assert!(config.set("limits.inputs", "many").is_err());
        assert!(config.set("colour", "blue").is_err());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.limits.inputs, 10);
        assert_eq!(loaded.get("import_token").as_deref(), Some("s3cret"));
        assert_eq!(loaded.server().ingest.throttle(), None);
    }

    #[test]
    fn test_every_key_is_readable() {
        let config = Config::default();
        for key in Config::keys() {
            assert!(config.get(key).is_some(), "{}", key);
        }
    }
}

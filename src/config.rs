//! Server configuration, read from a JSON file with environment overrides.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::kv::{KeyValueStore, DEFAULT_SEPARATOR};
use crate::slack::{AccessProvider, AccessRule, StaticAccess, StoreAccess};

const APP_NAME: &str = "slashkv";
const CONFIG_FILE: &str = "config.json";

/// Access entry as written in the config file: `true` for any team, or a team id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessSetting {
    AnyTeam(bool),
    Team(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind: String,
    pub port: u16,
    /// SQLite database file. Defaults to the platform data directory.
    pub database: Option<PathBuf>,
    /// Separator between namespace levels for store commands.
    pub hierarchy_separator: String,
    /// Static access rules, token -> `true` | team id.
    pub access: HashMap<String, AccessSetting>,
    /// When set, access rules are read from this store namespace instead of `access`.
    pub access_namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            database: None,
            hierarchy_separator: DEFAULT_SEPARATOR.to_string(),
            access: HashMap::new(),
            access_namespace: None,
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path, or one named by `SLASHKV_CONFIG`, must exist. Otherwise
    /// the file in the user's config directory is used if present, and the
    /// defaults if not. `SLASHKV_DATABASE` and `SLASHKV_PORT` override the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SLASHKV_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(database) = lookup("SLASHKV_DATABASE") {
            self.database = Some(PathBuf::from(database));
        }
        if let Some(port) = lookup("SLASHKV_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid SLASHKV_PORT: {}", port))?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => crate::db::default_path(),
        }
    }

    /// Static rules from the `access` table. `false` entries grant nothing.
    pub fn access_rules(&self) -> HashMap<String, AccessRule> {
        self.access
            .iter()
            .filter_map(|(token, setting)| {
                let rule = match setting {
                    AccessSetting::AnyTeam(true) => AccessRule::AnyTeam,
                    AccessSetting::AnyTeam(false) => return None,
                    AccessSetting::Team(team) => AccessRule::Team(team.clone()),
                };
                Some((token.clone(), rule))
            })
            .collect()
    }

    pub fn access_provider(&self, store: &KeyValueStore) -> Arc<dyn AccessProvider> {
        match &self.access_namespace {
            Some(namespace) => Arc::new(StoreAccess::new(store.clone(), namespace.clone())),
            None => Arc::new(StaticAccess::new(self.access_rules())),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

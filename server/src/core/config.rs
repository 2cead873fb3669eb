use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_DATABASE_PATH, DEFAULT_HOST, DEFAULT_MAX_PAGE_LIMIT,
    DEFAULT_MAX_RULES_JSON_BYTES, DEFAULT_PAGE_LIMIT, DEFAULT_PORT, SQLITE_MAX_CONNECTIONS,
    SQLITE_MEMORY_PATH,
};

// =============================================================================
// File Configuration (JSON)
// =============================================================================

/// Server configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: Option<String>,
    pub max_connections: Option<u32>,
}

/// Search configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchFileConfig {
    pub max_page_limit: Option<u32>,
    pub default_limit: Option<u32>,
    pub max_rules_json_bytes: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub search: Option<SearchFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Resolved Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: SQLITE_MAX_CONNECTIONS,
        }
    }
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.path == SQLITE_MEMORY_PATH
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub max_page_limit: u32,
    pub default_limit: u32,
    pub max_rules_json_bytes: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
            default_limit: DEFAULT_PAGE_LIMIT,
            max_rules_json_bytes: DEFAULT_MAX_RULES_JSON_BYTES,
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let path = match &cli.config {
            Some(path) => {
                let expanded = expand_path(&path.to_string_lossy());
                if !expanded.exists() {
                    anyhow::bail!("Config file not found: {}", expanded.display());
                }
                Some(expanded)
            }
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() { Some(local) } else { None }
            }
        };

        let file_config = match path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        Self::resolve(cli, file_config)
    }

    /// Layer defaults, file values and CLI/env overrides
    fn resolve(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_search = file_config.search.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let defaults = DatabaseConfig::default();
        let database_path = cli
            .database_path
            .clone()
            .or(file_database.path)
            .unwrap_or(defaults.path);
        let database = DatabaseConfig {
            path: if database_path == SQLITE_MEMORY_PATH {
                database_path
            } else {
                expand_path(&database_path).to_string_lossy().into_owned()
            },
            max_connections: cli
                .database_max_connections
                .or(file_database.max_connections)
                .unwrap_or(defaults.max_connections),
        };
        if database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        let defaults = SearchConfig::default();
        let search = SearchConfig {
            max_page_limit: cli
                .search_max_page_limit
                .or(file_search.max_page_limit)
                .unwrap_or(defaults.max_page_limit),
            default_limit: file_search.default_limit.unwrap_or(defaults.default_limit),
            max_rules_json_bytes: file_search
                .max_rules_json_bytes
                .unwrap_or(defaults.max_rules_json_bytes),
        };
        if search.max_page_limit == 0 || search.default_limit > search.max_page_limit {
            anyhow::bail!(
                "search.default_limit ({}) must be between 1 and search.max_page_limit ({})",
                search.default_limit,
                search.max_page_limit
            );
        }

        let config = Self {
            server,
            database,
            search,
        };
        tracing::debug!(config = ?config, "Configuration resolved");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::resolve(&CliConfig::default(), FileConfig::default()).unwrap();

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.database.path.ends_with(DEFAULT_DATABASE_PATH));
        assert_eq!(config.search, SearchConfig::default());
    }

    #[test]
    fn test_file_config_parse_partial() {
        let json = r#"{ "server": { "port": 9000 } }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert!(config.server.as_ref().unwrap().host.is_none());
        assert_eq!(config.server.as_ref().unwrap().port, Some(9000));
        assert!(config.database.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "search": { "max_page_limit": 100 }, "serach": {} }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.search.as_ref().unwrap().max_page_limit, Some(100));
        assert!(config.extra.get("serach").is_some());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "server": { "host": "0.0.0.0", "port": 9000 },
                "database": { "path": ":memory:", "max_connections": 2 },
                "search": { "max_page_limit": 200, "default_limit": 20 }
            }"#,
        )
        .unwrap();
        let cli = CliConfig {
            port: Some(9100),
            search_max_page_limit: Some(300),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, file).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert!(config.database.is_memory());
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.search.max_page_limit, 300);
        assert_eq!(config.search.default_limit, 20);
    }

    #[test]
    fn test_default_limit_above_max_is_rejected() {
        let file: FileConfig =
            serde_json::from_str(r#"{ "search": { "max_page_limit": 10, "default_limit": 50 } }"#)
                .unwrap();
        assert!(AppConfig::resolve(&CliConfig::default(), file).is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "server": {{ "port": 7000 }} }}"#).unwrap();

        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliConfig {
            config: Some(dir.path().join("absent.json")),
            ..Default::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }
}

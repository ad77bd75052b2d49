use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{AnswerPolicy, Environment, TableName};
use crate::error::EtlError;
use crate::fetch::{DEFAULT_DATA_URL, DEFAULT_TIMEOUT_SECS};
use crate::secrets::{FileSecretStore, SecretStore};
use crate::store::DataStore;

pub const DEFAULT_CONFIG_FILE: &str = "crossword-etl.json";
pub const DEFAULT_SECRET_NAME: &str = "crossword-app-db-creds";

/// Contents of `crossword-etl.json`. Every field is optional; environment
/// variables win over the file, the file wins over defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub data_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub database: DatabaseEntry,
    #[serde(default)]
    pub answer_policy: Option<AnswerPolicy>,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DatabaseEntry {
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub secrets_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: Utf8PathBuf,
    pub table: TableName,
}

/// Where the database location comes from once resolution is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    Direct(DatabaseConfig),
    Secret {
        name: String,
        dir: Utf8PathBuf,
        table: TableName,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    pub data_url: String,
    pub request_timeout: Duration,
    pub data_dir: Utf8PathBuf,
    pub database: DatabaseSource,
    pub answer_policy: AnswerPolicy,
    pub log_level: String,
}

impl PipelineConfig {
    /// Local configuration rooted at `data_dir`, with the default database inside it.
    pub fn local(data_dir: impl Into<Utf8PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let store = DataStore::new(data_dir.clone());
        Self {
            environment: Environment::Local,
            data_url: DEFAULT_DATA_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            database: DatabaseSource::Direct(DatabaseConfig {
                path: store.default_db_path(),
                table: TableName::default(),
            }),
            data_dir,
            answer_policy: AnswerPolicy::default(),
            log_level: "info".to_string(),
        }
    }

    pub fn store(&self) -> DataStore {
        DataStore::new(self.data_dir.clone())
    }

    pub fn database(&self) -> Result<DatabaseConfig, EtlError> {
        match &self.database {
            DatabaseSource::Direct(config) => Ok(config.clone()),
            DatabaseSource::Secret { dir, .. } => {
                self.resolve_database(&FileSecretStore::new(dir.clone()))
            }
        }
    }

    pub fn resolve_database(&self, secrets: &dyn SecretStore) -> Result<DatabaseConfig, EtlError> {
        match &self.database {
            DatabaseSource::Direct(config) => Ok(config.clone()),
            DatabaseSource::Secret { name, table, .. } => {
                let secret = secrets.database_secret(name)?;
                let table = match secret.table {
                    Some(value) => value.parse()?,
                    None => table.clone(),
                };
                Ok(DatabaseConfig {
                    path: Utf8PathBuf::from(secret.dbname),
                    table,
                })
            }
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<PipelineConfig, EtlError> {
        let config = Self::read_file(path)?;
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Reads the config file. An explicit path must exist; the default file is optional.
    pub fn read_file(path: Option<&str>) -> Result<Config, EtlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| EtlError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| EtlError::ConfigParse(err.to_string()))
    }

    pub fn resolve_with<F>(config: Config, lookup: F) -> Result<PipelineConfig, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let environment = match var("ENV") {
            Some(value) => value.parse()?,
            None => config.environment.unwrap_or(Environment::Development),
        };

        let data_url = var("DATA_URL")
            .or(config.data_url)
            .unwrap_or_else(|| DEFAULT_DATA_URL.to_string());

        let timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(value) => value.parse::<u64>().map_err(|_| {
                EtlError::InvalidConfig(format!("invalid REQUEST_TIMEOUT_SECS value {value:?}"))
            })?,
            None => config.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(EtlError::InvalidConfig(
                "request timeout must be at least one second".to_string(),
            ));
        }

        let data_dir = var("DATA_DIR")
            .map(Utf8PathBuf::from)
            .or(config.data_dir)
            .unwrap_or_else(|| Utf8PathBuf::from("data"));

        let table: TableName = match var("DB_TABLE").or(config.database.table) {
            Some(value) => value.parse()?,
            None => TableName::default(),
        };

        let explicit_path = var("DB_PATH")
            .map(Utf8PathBuf::from)
            .or(config.database.path);

        let database = match explicit_path {
            Some(path) => DatabaseSource::Direct(DatabaseConfig { path, table }),
            None if environment.uses_secrets() => DatabaseSource::Secret {
                name: var("DB_SECRET_NAME")
                    .or(config.database.secret_name)
                    .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string()),
                dir: var("SECRETS_DIR")
                    .map(Utf8PathBuf::from)
                    .or(config.database.secrets_dir)
                    .unwrap_or_else(default_secrets_dir),
                table,
            },
            None => DatabaseSource::Direct(DatabaseConfig {
                path: DataStore::new(data_dir.clone()).default_db_path(),
                table,
            }),
        };

        let answer_policy = match var("ANSWER_POLICY") {
            Some(value) => value.parse()?,
            None => config.answer_policy.unwrap_or_default(),
        };

        let log_level = var("LOG_LEVEL")
            .or(config.log_level)
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase();

        Ok(PipelineConfig {
            environment,
            data_url,
            request_timeout: Duration::from_secs(timeout_secs),
            data_dir,
            database,
            answer_policy,
            log_level,
        })
    }
}

pub fn default_secrets_dir() -> Utf8PathBuf {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.config_dir().join("crossword-etl").join("secrets"))
                .ok()
        })
        .unwrap_or_else(|| Utf8PathBuf::from(".secrets"))
}

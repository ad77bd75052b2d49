use std::fs;
use std::io::ErrorKind;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::EtlError;

/// Database location stored under a secret name. `dbname` is the SQLite file path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSecret {
    pub dbname: String,
    #[serde(default)]
    pub table: Option<String>,
}

pub trait SecretStore {
    fn database_secret(&self, name: &str) -> Result<DatabaseSecret, EtlError>;
}

/// Reads `<dir>/<name>.json` documents.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: Utf8PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn secret_path(&self, name: &str) -> Result<Utf8PathBuf, EtlError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(EtlError::Secret(format!("invalid secret name {name:?}")));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl SecretStore for FileSecretStore {
    fn database_secret(&self, name: &str) -> Result<DatabaseSecret, EtlError> {
        let path = self.secret_path(name)?;
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                EtlError::Secret(format!(
                    "secret {name} not found at {path}; set ENV=local or DB_PATH to bypass"
                ))
            } else {
                EtlError::Secret(format!("read {path}: {err}"))
            }
        })?;
        let secret: DatabaseSecret = serde_json::from_str(&content)
            .map_err(|err| EtlError::Secret(format!("parse {path}: {err}")))?;
        if secret.dbname.trim().is_empty() {
            return Err(EtlError::Secret(format!("secret {name} has an empty dbname")));
        }
        Ok(secret)
    }
}

use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use crossword_etl::config::{
    Config, ConfigLoader, DEFAULT_SECRET_NAME, DatabaseConfig, DatabaseEntry, DatabaseSource,
};
use crossword_etl::domain::{AnswerPolicy, Environment, TableName};
use crossword_etl::error::EtlError;
use crossword_etl::fetch::DEFAULT_DATA_URL;
use crossword_etl::secrets::{DatabaseSecret, SecretStore};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

struct StaticSecrets;

impl SecretStore for StaticSecrets {
    fn database_secret(&self, name: &str) -> Result<DatabaseSecret, EtlError> {
        if name == "prod-creds" {
            Ok(DatabaseSecret {
                dbname: "/srv/crossword/clues.db".to_string(),
                table: Some("PROD_CLUES".to_string()),
            })
        } else {
            Err(EtlError::Secret(format!("unknown secret {name}")))
        }
    }
}

#[test]
fn defaults_without_file_or_env() {
    let resolved = ConfigLoader::resolve_with(Config::default(), env(&[])).unwrap();
    assert_eq!(resolved.environment, Environment::Development);
    assert_eq!(resolved.data_url, DEFAULT_DATA_URL);
    assert_eq!(resolved.request_timeout, Duration::from_secs(20));
    assert_eq!(resolved.data_dir, Utf8PathBuf::from("data"));
    assert_eq!(resolved.answer_policy, AnswerPolicy::Lenient);
    assert_eq!(resolved.log_level, "info");
    assert_matches!(
        resolved.database,
        DatabaseSource::Secret { ref name, .. } if name == DEFAULT_SECRET_NAME
    );
}

#[test]
fn environment_overrides_file() {
    let file: Config = serde_json::from_str(
        r#"{
            "environment": "local",
            "data_url": "http://file.example/clues.json",
            "request_timeout_secs": 5,
            "data_dir": "/var/lib/etl",
            "database": { "table": "FILE_TABLE" },
            "answer_policy": "strict",
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve_with(
        file,
        env(&[
            ("DATA_URL", "http://env.example/clues.json"),
            ("DB_TABLE", "ENV_TABLE"),
            ("LOG_LEVEL", "WARN"),
        ]),
    )
    .unwrap();

    assert_eq!(resolved.environment, Environment::Local);
    assert_eq!(resolved.data_url, "http://env.example/clues.json");
    assert_eq!(resolved.request_timeout, Duration::from_secs(5));
    assert_eq!(resolved.answer_policy, AnswerPolicy::Strict);
    assert_eq!(resolved.log_level, "warn");
    assert_eq!(
        resolved.database,
        DatabaseSource::Direct(DatabaseConfig {
            path: Utf8PathBuf::from("/var/lib/etl/processed/cryptics.db"),
            table: "ENV_TABLE".parse::<TableName>().unwrap(),
        })
    );
}

#[test]
fn blank_environment_values_are_ignored() {
    let resolved =
        ConfigLoader::resolve_with(Config::default(), env(&[("ENV", "  "), ("DATA_URL", "")]))
            .unwrap();
    assert_eq!(resolved.environment, Environment::Development);
    assert_eq!(resolved.data_url, DEFAULT_DATA_URL);
}

#[test]
fn explicit_db_path_bypasses_secrets() {
    let resolved = ConfigLoader::resolve_with(
        Config::default(),
        env(&[("ENV", "PRODUCTION"), ("DB_PATH", "/tmp/clues.db")]),
    )
    .unwrap();
    assert_eq!(resolved.environment, Environment::Production);
    let database = resolved.database().unwrap();
    assert_eq!(database.path, Utf8PathBuf::from("/tmp/clues.db"));
    assert_eq!(database.table, TableName::default());
}

#[test]
fn secret_supplies_database_location() {
    let file = Config {
        database: DatabaseEntry {
            secret_name: Some("prod-creds".to_string()),
            ..DatabaseEntry::default()
        },
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_with(file, env(&[("ENV", "production")])).unwrap();

    let database = resolved.resolve_database(&StaticSecrets).unwrap();
    assert_eq!(database.path, Utf8PathBuf::from("/srv/crossword/clues.db"));
    assert_eq!(database.table.as_str(), "PROD_CLUES");
}

#[test]
fn secret_file_is_read_from_secrets_dir() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().to_str().unwrap().to_string();
    std::fs::write(
        temp.path().join("crossword-app-db-creds.json"),
        r#"{"dbname": "/data/clues.db"}"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve_with(Config::default(), env(&[("SECRETS_DIR", dir.as_str())]))
            .unwrap();
    let database = resolved.database().unwrap();
    assert_eq!(database.path, Utf8PathBuf::from("/data/clues.db"));
}

#[test]
fn missing_secret_is_reported_lazily() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().to_str().unwrap().to_string();
    let resolved =
        ConfigLoader::resolve_with(Config::default(), env(&[("SECRETS_DIR", dir.as_str())]))
            .unwrap();
    assert_matches!(resolved.database(), Err(EtlError::Secret(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let err = ConfigLoader::resolve_with(Config::default(), env(&[("ENV", "staging")]))
        .unwrap_err();
    assert_matches!(err, EtlError::InvalidConfig(_));

    let err =
        ConfigLoader::resolve_with(Config::default(), env(&[("REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
    assert_matches!(err, EtlError::InvalidConfig(_));

    let err = ConfigLoader::resolve_with(Config::default(), env(&[("REQUEST_TIMEOUT_SECS", "0")]))
        .unwrap_err();
    assert_matches!(err, EtlError::InvalidConfig(_));

    let err = ConfigLoader::resolve_with(Config::default(), env(&[("ANSWER_POLICY", "fuzzy")]))
        .unwrap_err();
    assert_matches!(err, EtlError::InvalidConfig(_));

    let err = ConfigLoader::resolve_with(
        Config::default(),
        env(&[("ENV", "local"), ("DB_TABLE", "x; DROP TABLE y")]),
    )
    .unwrap_err();
    assert_matches!(err, EtlError::InvalidConfig(_));
}

#[test]
fn explicit_config_path_must_exist() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("absent.json");
    let err = ConfigLoader::read_file(missing.to_str()).unwrap_err();
    assert_matches!(err, EtlError::ConfigRead(_));

    let broken = temp.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    let err = ConfigLoader::read_file(broken.to_str()).unwrap_err();
    assert_matches!(err, EtlError::ConfigParse(_));
}

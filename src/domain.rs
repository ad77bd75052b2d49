use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
    Local,
}

impl Environment {
    /// Whether database settings come from a secret document rather than plain config.
    pub fn uses_secrets(&self) -> bool {
        !matches!(self, Environment::Local)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
            Environment::Local => write!(f, "local"),
        }
    }
}

impl FromStr for Environment {
    type Err = EtlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "development" => Ok(Environment::Development),
            "local" => Ok(Environment::Local),
            _ => Err(EtlError::InvalidConfig(format!(
                "invalid ENV value {value:?}; expected production, development or local"
            ))),
        }
    }
}

/// How the cleaner judges answers.
///
/// `Lenient` keeps any answer of two or more characters and lets normalization
/// strip punctuation. `Strict` also drops records whose normalized answer is
/// not purely alphabetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnswerPolicy {
    #[default]
    Lenient,
    Strict,
}

impl fmt::Display for AnswerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerPolicy::Lenient => write!(f, "lenient"),
            AnswerPolicy::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for AnswerPolicy {
    type Err = EtlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(AnswerPolicy::Lenient),
            "strict" => Ok(AnswerPolicy::Strict),
            _ => Err(EtlError::InvalidConfig(format!(
                "invalid answer policy {value:?}; expected lenient or strict"
            ))),
        }
    }
}

/// SQL table name. Restricted to plain identifiers since it is spliced into statements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self("CROSSWORD_CLUES".to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = EtlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !IDENTIFIER.is_match(trimmed) {
            return Err(EtlError::InvalidConfig(format!(
                "invalid table name {value:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// One record of the downloaded dataset, projected to the fields the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClueRecord {
    pub rowid: i64,
    pub clue: Option<String>,
    pub answer: Option<String>,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CleanClueRecord {
    pub rowid: i64,
    pub clue: String,
    pub answer: String,
    pub definition: String,
}

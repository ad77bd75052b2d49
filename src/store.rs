use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::CleanClueRecord;
use crate::error::EtlError;

pub const RAW_FILE_NAME: &str = "cryptics_raw.json";
pub const CLEAN_FILE_NAME: &str = "cryptics_clean.jsonl";
pub const DB_FILE_NAME: &str = "cryptics.db";

/// On-disk layout of one pipeline workspace:
///
/// ```text
/// <root>/raw/cryptics_raw.json       verbatim download
/// <root>/clean/cryptics_clean.jsonl  cleaned records, one JSON object per line
/// <root>/processed/cryptics.db       default SQLite database
/// ```
#[derive(Debug, Clone)]
pub struct DataStore {
    root: Utf8PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_dir(&self) -> Utf8PathBuf {
        self.root.join("raw")
    }

    pub fn clean_dir(&self) -> Utf8PathBuf {
        self.root.join("clean")
    }

    pub fn processed_dir(&self) -> Utf8PathBuf {
        self.root.join("processed")
    }

    pub fn raw_path(&self) -> Utf8PathBuf {
        self.raw_dir().join(RAW_FILE_NAME)
    }

    pub fn clean_path(&self) -> Utf8PathBuf {
        self.clean_dir().join(CLEAN_FILE_NAME)
    }

    pub fn default_db_path(&self) -> Utf8PathBuf {
        self.processed_dir().join(DB_FILE_NAME)
    }

    pub fn ensure_layout(&self) -> Result<(), EtlError> {
        for dir in [self.raw_dir(), self.clean_dir(), self.processed_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| EtlError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }

    pub fn write_raw(&self, content: &[u8]) -> Result<(), EtlError> {
        Self::write_bytes_atomic(&self.raw_path(), content)
    }

    pub fn read_raw(&self) -> Result<Vec<u8>, EtlError> {
        let path = self.raw_path();
        fs::read(path.as_std_path()).map_err(|err| read_error(&path, err))
    }

    /// Replaces the clean file with `records`, one JSON object per line.
    pub fn write_clean(&self, records: &[CleanClueRecord]) -> Result<(), EtlError> {
        let mut content = Vec::new();
        for record in records {
            serde_json::to_writer(&mut content, record)
                .map_err(|err| EtlError::Filesystem(err.to_string()))?;
            content.push(b'\n');
        }
        Self::write_bytes_atomic(&self.clean_path(), &content)
    }

    pub fn read_clean(&self) -> Result<Vec<CleanClueRecord>, EtlError> {
        let path = self.clean_path();
        let file = fs::File::open(path.as_std_path()).map_err(|err| read_error(&path, err))?;
        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| EtlError::Filesystem(format!("read {path}: {err}")))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CleanClueRecord = serde_json::from_str(&line).map_err(|err| {
                EtlError::Filesystem(format!("{path} line {}: {err}", number + 1))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), EtlError> {
        let parent = path
            .parent()
            .ok_or_else(|| EtlError::Filesystem(format!("invalid destination path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| EtlError::Filesystem(format!("create {parent}: {err}")))?;
        let mut temp = Builder::new()
            .prefix(".crossword-etl")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| EtlError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| EtlError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| EtlError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn read_error(path: &Utf8Path, err: std::io::Error) -> EtlError {
    if err.kind() == ErrorKind::NotFound {
        EtlError::MissingInput(path.as_std_path().to_path_buf())
    } else {
        EtlError::Filesystem(format!("read {path}: {err}"))
    }
}

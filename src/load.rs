use std::fs;

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::DatabaseConfig;
use crate::domain::{CleanClueRecord, TableName};
use crate::error::EtlError;

pub const MAX_ANSWER_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub submitted: usize,
    pub inserted: usize,
    pub skipped: usize,
}

fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            clue TEXT NOT NULL,
            answer VARCHAR({MAX_ANSWER_LEN}) NOT NULL CHECK (length(answer) <= {MAX_ANSWER_LEN}),
            definition TEXT NOT NULL,
            UNIQUE (answer, clue)
        )"
    )
}

fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO \"{table}\" (clue, answer, definition) VALUES (?1, ?2, ?3)
         ON CONFLICT (answer, clue) DO NOTHING"
    )
}

/// Writes cleaned records into one SQLite table. Each call owns its connection
/// for the duration of the call only.
#[derive(Debug, Clone)]
pub struct Loader {
    database: DatabaseConfig,
}

impl Loader {
    pub fn new(database: DatabaseConfig) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.database
    }

    /// Creates the database file and table without inserting anything.
    pub fn initialize(&self) -> Result<(), EtlError> {
        let conn = self.open()?;
        self.ensure_schema(&conn)?;
        info!(
            path = %self.database.path,
            table = %self.database.table,
            "database initialized"
        );
        Ok(())
    }

    pub fn load(&self, records: &[CleanClueRecord]) -> Result<LoadReport, EtlError> {
        if records.is_empty() {
            return Err(EtlError::EmptyDataset);
        }
        let _span = info_span!("load", table = %self.database.table).entered();

        let mut conn = self.open()?;
        self.ensure_schema(&conn)?;

        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut statement = tx.prepare(&insert_sql(&self.database.table))?;
            for record in records {
                inserted += statement
                    .execute(params![record.clue, record.answer, record.definition])
                    .map_err(|err| {
                        EtlError::Storage(format!("insert rowid {}: {err}", record.rowid))
                    })?;
            }
        }
        tx.commit()?;

        let report = LoadReport {
            submitted: records.len(),
            inserted,
            skipped: records.len() - inserted,
        };
        info!(inserted = report.inserted, "inserted rows");
        if report.skipped > 0 {
            warn!(skipped = report.skipped, "skipped rows already present");
        }
        Ok(report)
    }

    pub fn count(&self) -> Result<usize, EtlError> {
        let conn = self.open()?;
        self.ensure_schema(&conn)?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", self.database.table);
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn open(&self) -> Result<Connection, EtlError> {
        let path = &self.database.path;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| EtlError::Storage(format!("create {parent}: {err}")))?;
        }
        Connection::open(path.as_std_path())
            .map_err(|err| EtlError::Storage(format!("open {path}: {err}")))
    }

    fn ensure_schema(&self, conn: &Connection) -> Result<(), EtlError> {
        conn.execute_batch(&create_table_sql(&self.database.table))
            .map_err(|err| EtlError::Storage(format!("create table {}: {err}", self.database.table)))
    }
}

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info_span};

use crate::clean::{Cleaner, parse_raw};
use crate::config::PipelineConfig;
use crate::error::EtlError;
use crate::fetch::{Fetcher, SourceClient};
use crate::load::{LoadReport, Loader};
use crate::store::DataStore;

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub url: String,
    pub bytes: usize,
    pub raw_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanResult {
    pub raw_records: usize,
    pub filtered_records: usize,
    pub clean_records: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub answer_policy: String,
    pub clean_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub database: String,
    pub table: String,
    #[serde(flatten)]
    pub report: LoadReport,
    /// Rows stored in the table after this load.
    pub total_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub database: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub environment: String,
    pub fetch: FetchResult,
    pub clean: CleanResult,
    pub load: LoadResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Runs the fetch, clean and load stages against one configuration.
pub struct Pipeline<C: SourceClient> {
    config: PipelineConfig,
    store: DataStore,
    fetcher: Fetcher<C>,
    cleaner: Cleaner,
}

impl<C: SourceClient> Pipeline<C> {
    pub fn new(config: PipelineConfig, client: C) -> Self {
        let store = config.store();
        let fetcher = Fetcher::new(client, store.clone());
        let cleaner = Cleaner::new(config.answer_policy);
        Self {
            config,
            store,
            fetcher,
            cleaner,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn fetch(&self, sink: &dyn ProgressSink) -> Result<FetchResult, EtlError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            stage: "fetch",
            message: format!("downloading {}", self.config.data_url),
            elapsed: None,
        });
        let bytes = logged("fetch", self.fetcher.fetch(&self.config.data_url))?;
        sink.event(ProgressEvent {
            stage: "fetch",
            message: format!("saved {} bytes", bytes.len()),
            elapsed: Some(started.elapsed()),
        });
        Ok(FetchResult {
            url: self.config.data_url.clone(),
            bytes: bytes.len(),
            raw_path: self.store.raw_path().to_string(),
        })
    }

    pub fn clean(&self, sink: &dyn ProgressSink) -> Result<CleanResult, EtlError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            stage: "clean",
            message: format!("reading {}", self.store.raw_path()),
            elapsed: None,
        });
        let outcome = logged("clean", self.clean_stage())?;
        sink.event(ProgressEvent {
            stage: "clean",
            message: format!(
                "kept {} of {} records",
                outcome.clean_records, outcome.raw_records
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(outcome)
    }

    fn clean_stage(&self) -> Result<CleanResult, EtlError> {
        let _span = info_span!("clean").entered();
        let raw = parse_raw(&self.store.read_raw()?)?;
        let outcome = self.cleaner.clean(&raw)?;
        self.store.write_clean(&outcome.records)?;
        Ok(CleanResult {
            raw_records: outcome.raw_count,
            filtered_records: outcome.filtered_count,
            clean_records: outcome.records.len(),
            dropped: outcome.dropped,
            duplicates: outcome.duplicates,
            answer_policy: self.cleaner.policy().to_string(),
            clean_path: self.store.clean_path().to_string(),
        })
    }

    pub fn load(&self, sink: &dyn ProgressSink) -> Result<LoadResult, EtlError> {
        let started = Instant::now();
        let result = logged("load", self.load_stage(sink))?;
        sink.event(ProgressEvent {
            stage: "load",
            message: format!(
                "inserted {} rows, skipped {}",
                result.report.inserted, result.report.skipped
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(result)
    }

    fn load_stage(&self, sink: &dyn ProgressSink) -> Result<LoadResult, EtlError> {
        let records = self.store.read_clean()?;
        let database = self.config.database()?;
        sink.event(ProgressEvent {
            stage: "load",
            message: format!("loading {} records into {}", records.len(), database.path),
            elapsed: None,
        });
        let loader = Loader::new(database);
        let report = loader.load(&records)?;
        let total_rows = loader.count()?;
        Ok(LoadResult {
            database: loader.database().path.to_string(),
            table: loader.database().table.to_string(),
            report,
            total_rows,
        })
    }

    pub fn init_db(&self, sink: &dyn ProgressSink) -> Result<InitResult, EtlError> {
        let result = logged(
            "init-db",
            self.config.database().and_then(|database| {
                let loader = Loader::new(database);
                loader.initialize()?;
                Ok(InitResult {
                    database: loader.database().path.to_string(),
                    table: loader.database().table.to_string(),
                })
            }),
        )?;
        sink.event(ProgressEvent {
            stage: "init-db",
            message: format!("table {} ready in {}", result.table, result.database),
            elapsed: None,
        });
        Ok(result)
    }

    /// Fetch, clean and load in sequence; the first failure aborts the rest.
    pub fn run(&self, sink: &dyn ProgressSink) -> Result<RunSummary, EtlError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        logged("setup", self.store.ensure_layout())?;
        let fetch = self.fetch(sink)?;
        let clean = self.clean(sink)?;
        let load = self.load(sink)?;
        Ok(RunSummary {
            started_at,
            environment: self.config.environment.to_string(),
            fetch,
            clean,
            load,
        })
    }
}

fn logged<T>(stage: &'static str, result: Result<T, EtlError>) -> Result<T, EtlError> {
    result.inspect_err(|err| {
        error!(stage, kind = err.stage(), error = %err, "stage failed");
    })
}

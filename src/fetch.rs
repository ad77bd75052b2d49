use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{info, info_span};

use crate::error::EtlError;
use crate::store::DataStore;

pub const DEFAULT_DATA_URL: &str = "https://cryptics.georgeho.org/data/clues.json?_shape=array";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

pub trait SourceClient: Send + Sync {
    /// Issues one GET and returns the body bytes untouched.
    fn get(&self, url: &str) -> Result<Vec<u8>, EtlError>;
}

#[derive(Clone)]
pub struct HttpSourceClient {
    client: Client,
}

impl HttpSourceClient {
    pub fn new(timeout: Duration) -> Result<Self, EtlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("crossword-etl/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| EtlError::InvalidConfig(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| EtlError::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

impl SourceClient for HttpSourceClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, EtlError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| EtlError::Network(describe_error(&err)))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "request failed".to_string());
            return Err(EtlError::HttpStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| EtlError::Network(describe_error(&err)))?;
        Ok(bytes.to_vec())
    }
}

fn describe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

/// Downloads the dataset and persists it verbatim to the raw store.
pub struct Fetcher<C: SourceClient> {
    client: C,
    store: DataStore,
}

impl<C: SourceClient> Fetcher<C> {
    pub fn new(client: C, store: DataStore) -> Self {
        Self { client, store }
    }

    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, EtlError> {
        let _span = info_span!("fetch", url).entered();
        let bytes = self.client.get(url)?;
        self.store.write_raw(&bytes)?;
        info!(bytes = bytes.len(), path = %self.store.raw_path(), "saved raw dataset");
        Ok(bytes)
    }
}

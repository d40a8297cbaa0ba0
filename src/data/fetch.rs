//! Dataset retrieval from local files or HTTP(S) URLs.
//!
//! The registries publish their CSVs at dated URLs that change between
//! releases, so sources are configured per run (CLI flag, or `.env` /
//! environment fallback) rather than baked in.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::info;

use crate::domain::DatasetSource;
use crate::error::AppError;
use crate::io::ingest::{Dataset, load_csv_file, parse_csv_bytes};

/// Environment variable naming the primary (location) dataset source.
pub const PRIMARY_SOURCE_ENV: &str = "ATLAS_PRIMARY_SOURCE";
/// Environment variable naming the secondary (outcome) dataset source.
pub const SECONDARY_SOURCE_ENV: &str = "ATLAS_SECONDARY_SOURCE";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Read a dataset source from the environment (after `.env` has been loaded).
pub fn source_from_env(var: &str) -> Option<DatasetSource> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| DatasetSource::parse(&v))
}

pub struct DatasetFetcher {
    client: Client,
}

impl DatasetFetcher {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("school-atlas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Load and parse one dataset.
    pub fn load(&self, source: &DatasetSource) -> Result<Dataset, AppError> {
        let dataset = match source {
            DatasetSource::File(path) => load_csv_file(path)?,
            DatasetSource::Url(url) => {
                let bytes = self.fetch_bytes(url)?;
                parse_csv_bytes(&bytes, url.clone())?
            }
        };

        info!(
            source = %source,
            rows = dataset.len(),
            columns = dataset.headers.len(),
            unreadable_rows = dataset.unreadable_rows,
            "dataset loaded"
        );
        Ok(dataset)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| AppError::new(4, format!("Request to '{url}' failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::new(4, format!("Request to '{url}' returned HTTP {status}.")));
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| AppError::new(4, format!("Failed to read response body from '{url}': {e}")))
    }
}

//! Retrieval of raw archive files.
//!
//! The store only needs "GET this URL into that file"; [`Fetcher`] is that seam, and
//! [`HttpFetcher`] is the reqwest-backed implementation used outside of tests.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The archive answered, and it does not have the file.
    #[error("No file at {url} (404 Not Found)")]
    NotFound { url: String },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("I/O error while saving download to '{0}'")]
    Io(PathBuf, #[source] io::Error),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    /// A permanent answer from the archive. Everything else may succeed on retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Downloads a URL to a local file.
///
/// Implementations must only create `destination` once the whole body has been
/// written, so that a present file always means a complete download.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client })
    }

    async fn stream_to_file(
        response: reqwest::Response,
        partial: &Path,
    ) -> Result<u64, io::Error> {
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);
        let mut file = fs::File::create(partial).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        info!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.to_string(), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            warn!("HTTP error for {}: {}", url, status);
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let partial = partial_path(destination);
        match Self::stream_to_file(response, &partial).await {
            Ok(written) => {
                fs::rename(&partial, destination)
                    .await
                    .map_err(|e| FetchError::Io(destination.to_path_buf(), e))?;
                debug!("Saved {} bytes to {:?}", written, destination);
                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(FetchError::Io(partial, e))
            }
        }
    }
}

/// Sibling path downloads are written to before being renamed into place.
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_keeps_directory() {
        let dest = Path::new("/data/2017/08/01/GaugeCorr_QPE_01H_00.00_20170801-050000.grib2.gz");
        assert_eq!(
            partial_path(dest),
            PathBuf::from("/data/2017/08/01/GaugeCorr_QPE_01H_00.00_20170801-050000.grib2.gz.part")
        );
    }

    #[test]
    fn test_only_not_found_is_permanent() {
        let not_found = FetchError::NotFound {
            url: "u".to_string(),
        };
        let unavailable = FetchError::HttpStatus {
            url: "u".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(not_found.is_permanent());
        assert!(!unavailable.is_permanent());
    }
}
